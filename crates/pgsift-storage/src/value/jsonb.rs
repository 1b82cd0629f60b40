//! Binary JSON decoding.
//!
//! The on-disk binary form is a tree of containers. A container starts with
//! a 4-byte header: the low 28 bits count the elements (or key/value pairs),
//! the top bits say object, array or single scalar. Then come 4-byte entry
//! headers (one per element, keys before values for objects) carrying a
//! length and a type tag, then the payloads in the same order. Numeric and
//! nested-container payloads are 4-byte aligned.
//!
//! Parsing is defensive throughout: anything inconsistent yields
//! [`Value::Null`], never a panic, because these bytes frequently come from
//! torn or partially vacuumed pages.

use std::collections::BTreeMap;

use super::{numeric, Value};
use crate::bytes;

const COUNT_MASK: u32 = 0x0FFF_FFFF;
const FLAG_SCALAR: u32 = 0x1000_0000;
const FLAG_OBJECT: u32 = 0x2000_0000;
const FLAG_ARRAY: u32 = 0x4000_0000;

const ENTRY_LEN_MASK: u32 = 0x0FFF_FFFF;
const ENTRY_TYPE_MASK: u32 = 0x7000_0000;
const ENTRY_STRING: u32 = 0x0000_0000;
const ENTRY_NUMERIC: u32 = 0x1000_0000;
const ENTRY_BOOL_FALSE: u32 = 0x2000_0000;
const ENTRY_BOOL_TRUE: u32 = 0x3000_0000;
const ENTRY_NULL: u32 = 0x4000_0000;
const ENTRY_CONTAINER: u32 = 0x5000_0000;

/// Upper bound on entries per container; keeps corrupt counts from
/// ballooning allocation.
const MAX_ENTRIES: usize = 1 << 20;

/// Parses a binary-JSON payload. Malformed input yields [`Value::Null`].
#[must_use]
pub fn parse(data: &[u8]) -> Value {
    parse_container(data, 0)
}

fn parse_container(data: &[u8], depth: usize) -> Value {
    // Containers nest without bound in valid data, but corrupt offsets can
    // loop; cap recursion instead of chasing them.
    if depth > 64 || data.len() < 4 {
        return Value::Null;
    }

    let header = bytes::u32(data, 0);
    let count = (header & COUNT_MASK) as usize;
    if count > MAX_ENTRIES {
        return Value::Null;
    }

    if header & FLAG_OBJECT != 0 {
        let Some(entries) = parse_entries(data, count * 2, depth) else {
            return Value::Null;
        };
        let mut map = BTreeMap::new();
        for i in 0..count {
            match &entries[i] {
                Value::Text(key) => {
                    map.insert(key.clone(), entries[count + i].clone());
                }
                _ => return Value::Null,
            }
        }
        Value::Map(map)
    } else if header & FLAG_ARRAY != 0 {
        match parse_entries(data, count, depth) {
            Some(entries) if header & FLAG_SCALAR != 0 && count == 1 => entries[0].clone(),
            Some(entries) => Value::Array(entries),
            None => Value::Null,
        }
    } else {
        Value::Null
    }
}

/// Decodes `n` entry headers plus their payloads. Returns `None` on any
/// inconsistency.
fn parse_entries(data: &[u8], n: usize, depth: usize) -> Option<Vec<Value>> {
    if n > MAX_ENTRIES {
        return None;
    }
    let entries_end = 4 + n * 4;
    if entries_end > data.len() {
        return None;
    }

    let mut values = Vec::with_capacity(n);
    let mut payload_off = entries_end;

    for i in 0..n {
        let entry = bytes::u32(data, 4 + i * 4);
        let len = (entry & ENTRY_LEN_MASK) as usize;
        let kind = entry & ENTRY_TYPE_MASK;

        // Numerics and nested containers sit on 4-byte boundaries
        if matches!(kind, ENTRY_NUMERIC | ENTRY_CONTAINER) {
            payload_off = bytes::align(payload_off, 4);
        }

        let value = match kind {
            ENTRY_NULL => Value::Null,
            ENTRY_BOOL_TRUE => Value::Bool(true),
            ENTRY_BOOL_FALSE => Value::Bool(false),
            ENTRY_STRING => {
                let payload = data.get(payload_off..payload_off + len)?;
                Value::Text(String::from_utf8_lossy(payload).into_owned())
            }
            ENTRY_NUMERIC => {
                let payload = data.get(payload_off..payload_off + len)?;
                Value::Text(numeric::decode_numeric(strip_varlena(payload)))
            }
            ENTRY_CONTAINER => {
                let payload = data.get(payload_off..payload_off + len)?;
                parse_container(payload, depth + 1)
            }
            _ => return None,
        };

        // Null and boolean entries occupy no payload bytes
        if !matches!(kind, ENTRY_NULL | ENTRY_BOOL_TRUE | ENTRY_BOOL_FALSE) {
            payload_off += len;
        }
        values.push(value);
    }

    Some(values)
}

/// Numeric payloads inside containers keep their datum header; drop it.
/// The header is only stripped when its encoded length matches the payload,
/// so a bare numeric body passes through untouched.
fn strip_varlena(payload: &[u8]) -> &[u8] {
    if let Some(&b0) = payload.first() {
        if b0 & 0x01 == 0x01 && b0 != 0x01 {
            if (b0 >> 1) as usize == payload.len() {
                return &payload[1..];
            }
        } else if payload.len() >= 4 && b0 & 0x03 == 0 {
            let total = ((bytes::u32(payload, 0) >> 2) & 0x3FFF_FFFF) as usize;
            if total == payload.len() {
                return &payload[4..];
            }
        }
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fixture builder mirroring the on-disk container layout.
    struct Builder {
        entries: Vec<u32>,
        payloads: Vec<Vec<u8>>,
    }

    impl Builder {
        fn new() -> Self {
            Self {
                entries: Vec::new(),
                payloads: Vec::new(),
            }
        }

        fn string(&mut self, s: &str) -> &mut Self {
            self.entries.push(ENTRY_STRING | s.len() as u32);
            self.payloads.push(s.as_bytes().to_vec());
            self
        }

        fn numeric_int(&mut self, v: u16) -> &mut Self {
            // Numeric datum with its short varlena header, as stored:
            // long-form body of sign/dscale 0, weight 0, one digit
            let mut body = vec![0, 0, 0, 0];
            body.extend_from_slice(&v.to_le_bytes());
            let payload = crate::value::varlena::build_varlena(&body);
            self.entries.push(ENTRY_NUMERIC | payload.len() as u32);
            self.payloads.push(payload);
            self
        }

        fn boolean(&mut self, v: bool) -> &mut Self {
            self.entries
                .push(if v { ENTRY_BOOL_TRUE } else { ENTRY_BOOL_FALSE });
            self.payloads.push(Vec::new());
            self
        }

        fn null(&mut self) -> &mut Self {
            self.entries.push(ENTRY_NULL);
            self.payloads.push(Vec::new());
            self
        }

        fn container(&mut self, inner: Vec<u8>) -> &mut Self {
            self.entries.push(ENTRY_CONTAINER | inner.len() as u32);
            self.payloads.push(inner);
            self
        }

        fn finish(&self, flags: u32, count: usize) -> Vec<u8> {
            let mut out = (flags | count as u32).to_le_bytes().to_vec();
            for e in &self.entries {
                out.extend_from_slice(&e.to_le_bytes());
            }
            for (e, p) in self.entries.iter().zip(&self.payloads) {
                if matches!(e & ENTRY_TYPE_MASK, ENTRY_NUMERIC | ENTRY_CONTAINER) {
                    while out.len() % 4 != 0 {
                        out.push(0);
                    }
                }
                out.extend_from_slice(p);
            }
            out
        }
    }

    #[test]
    fn test_simple_object() {
        let mut b = Builder::new();
        b.string("a").numeric_int(1);
        let data = b.finish(FLAG_OBJECT, 1);

        let Value::Map(map) = parse(&data) else {
            panic!("expected object");
        };
        assert_eq!(map.get("a"), Some(&Value::Text("1".into())));
    }

    #[test]
    fn test_array_of_scalars() {
        let mut b = Builder::new();
        b.string("x").boolean(true).null().numeric_int(42);
        let data = b.finish(FLAG_ARRAY, 4);

        assert_eq!(
            parse(&data),
            Value::Array(vec![
                Value::Text("x".into()),
                Value::Bool(true),
                Value::Null,
                Value::Text("42".into()),
            ])
        );
    }

    #[test]
    fn test_scalar_container() {
        let mut b = Builder::new();
        b.string("lone");
        let data = b.finish(FLAG_ARRAY | FLAG_SCALAR, 1);
        assert_eq!(parse(&data), Value::Text("lone".into()));
    }

    #[test]
    fn test_nested_object() {
        let mut inner = Builder::new();
        inner.string("deep").boolean(false);
        let inner_data = inner.finish(FLAG_OBJECT, 1);

        let mut outer = Builder::new();
        outer.string("nested").container(inner_data);
        let data = outer.finish(FLAG_OBJECT, 1);

        let Value::Map(map) = parse(&data) else {
            panic!("expected object");
        };
        let Some(Value::Map(inner_map)) = map.get("nested") else {
            panic!("expected nested object");
        };
        assert_eq!(inner_map.get("deep"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_consecutive_strings_are_packed() {
        let mut b = Builder::new();
        b.string("ab").string("c");
        let data = b.finish(FLAG_ARRAY, 2);
        assert_eq!(
            parse(&data),
            Value::Array(vec![Value::Text("ab".into()), Value::Text("c".into())])
        );
    }

    #[test]
    fn test_malformed_yields_null() {
        assert_eq!(parse(&[]), Value::Null);
        assert_eq!(parse(&[0x01, 0x00]), Value::Null);
        // Count says 100 entries, buffer holds none
        assert_eq!(parse(&(FLAG_OBJECT | 100).to_le_bytes()), Value::Null);
        // Entry length overruns the buffer
        let mut data = (FLAG_ARRAY | 1).to_le_bytes().to_vec();
        data.extend_from_slice(&(ENTRY_STRING | 1000).to_le_bytes());
        assert_eq!(parse(&data), Value::Null);
        // Scalar header with neither object nor array flag
        assert_eq!(parse(&FLAG_SCALAR.to_le_bytes()), Value::Null);
    }
}
