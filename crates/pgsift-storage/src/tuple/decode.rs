//! Schema-driven tuple decoding.
//!
//! Walks the columns of a schema in order, maintaining a payload offset:
//! align, check the null bitmap, consume the column's bytes, hand them to
//! the type decoder. The one wrinkle is the short-varlena exception: a
//! 1-byte varlena header is stored unaligned, so when the next unconsumed
//! byte looks like one, the column's alignment drops to 1.

use std::collections::BTreeMap;

use super::HeapTuple;
use crate::bytes;
use crate::value::decode::{decode_type, type_alignment};
use crate::value::{read_varlena, varlena, Value};

/// A decoded row: column name to value.
pub type Row = BTreeMap<String, Value>;

/// One column of a relation schema, as needed for decoding.
#[derive(Debug, Clone)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Type OID.
    pub type_id: u32,
    /// Storage width: positive fixed width, `-1` varlena, `0` null-terminated.
    pub length: i32,
    /// 1-based attribute number; 0 means "use schema position".
    pub attnum: i32,
    /// Alignment code (`c`/`s`/`i`/`d`), 0 when unknown.
    pub align: u8,
}

impl Column {
    /// Creates a column with no attribute number or alignment hint.
    #[must_use]
    pub fn new(name: impl Into<String>, type_id: u32, length: i32) -> Self {
        Self {
            name: name.into(),
            type_id,
            length,
            attnum: 0,
            align: 0,
        }
    }

    /// Sets the alignment code.
    #[must_use]
    pub fn with_align(mut self, align: u8) -> Self {
        self.align = align;
        self
    }

    /// Sets the attribute number.
    #[must_use]
    pub fn with_attnum(mut self, attnum: i32) -> Self {
        self.attnum = attnum;
        self
    }
}

/// Converts a catalog alignment code to bytes; 0 for unknown codes.
fn align_from_code(code: u8) -> usize {
    match code {
        b'c' => 1,
        b's' => 2,
        b'i' => 4,
        b'd' => 8,
        _ => 0,
    }
}

/// Decodes a tuple's payload against an ordered column schema.
///
/// A tuple with an empty payload yields an empty row. Columns that run past
/// the payload decode as null; decoding never fails.
#[must_use]
pub fn decode_tuple(tuple: &HeapTuple, columns: &[Column]) -> Row {
    let mut row = Row::new();
    if tuple.data.is_empty() {
        return row;
    }

    let mut offset = 0usize;

    for (idx, col) in columns.iter().enumerate() {
        let attnum = if col.attnum > 0 {
            col.attnum as usize
        } else {
            idx + 1
        };

        let mut alignment = align_from_code(col.align);
        if alignment == 0 {
            alignment = type_alignment(col.type_id, col.length);
        }

        // Short-varlena exception: a 1-byte header is stored unaligned
        if col.length == -1 && varlena::is_short(&tuple.data[offset.min(tuple.data.len())..]) {
            alignment = 1;
        }

        offset = bytes::align(offset, alignment);

        if tuple.is_null(attnum) {
            tracing::trace!(column = %col.name, attnum, "null column");
            row.insert(col.name.clone(), Value::Null);
            continue;
        }

        let (value, consumed) = read_value(&tuple.data, offset, col.type_id, col.length);
        tracing::trace!(
            column = %col.name,
            attnum,
            offset,
            alignment,
            consumed,
            "decoded column"
        );
        row.insert(col.name.clone(), value);
        offset += consumed;
    }

    row
}

/// Consumes one column's bytes at `offset` and decodes them.
fn read_value(data: &[u8], offset: usize, type_id: u32, length: i32) -> (Value, usize) {
    if offset >= data.len() {
        return (Value::Null, 0);
    }
    let remaining = &data[offset..];

    if length > 0 {
        let length = length as usize;
        if remaining.len() < length {
            return (Value::Null, 0);
        }
        return (decode_type(&remaining[..length], type_id), length);
    }

    if length == -1 {
        return match read_varlena(remaining) {
            Some((payload, consumed)) => (decode_type(&payload, type_id), consumed),
            None => (Value::Null, 1),
        };
    }

    // Null-terminated storage
    match remaining.iter().position(|&b| b == 0) {
        Some(end) => (
            Value::Text(String::from_utf8_lossy(&remaining[..end]).into_owned()),
            end + 1,
        ),
        None => (
            Value::Text(String::from_utf8_lossy(remaining).into_owned()),
            remaining.len(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{build_tuple, infomask};
    use crate::value::decode::oids;

    fn schema_int4_text_int4() -> Vec<Column> {
        vec![
            Column::new("c1", oids::INT4, 4).with_align(b'i'),
            Column::new("c2", oids::TEXT, -1).with_align(b'i'),
            Column::new("c3", oids::INT4, 4).with_align(b'i'),
        ]
    }

    #[test]
    fn test_null_middle_column() {
        // A null column stores nothing, so the payload is the two int4
        // values back to back; bitmap 0b101 marks the middle column null
        let payload = [0x39, 0x05, 0x00, 0x00, 0xD2, 0x04, 0x00, 0x00];
        let raw = build_tuple(1, 0, infomask::XMAX_INVALID, 3, &[0b101], &payload);
        let tuple = HeapTuple::parse(&raw).unwrap();

        let row = decode_tuple(&tuple, &schema_int4_text_int4());
        assert_eq!(row["c1"], Value::Int32(1337));
        assert_eq!(row["c2"], Value::Null);
        assert_eq!(row["c3"], Value::Int32(1234));
    }

    #[test]
    fn test_short_varlena_after_int() {
        // int4, then a short-header text right at offset 4
        let mut payload = vec![0x2A, 0x00, 0x00, 0x00];
        payload.push((6u8 << 1) | 1); // total 6: "hello"
        payload.extend_from_slice(b"hello");
        let raw = build_tuple(1, 0, infomask::XMAX_INVALID, 2, &[], &payload);
        let tuple = HeapTuple::parse(&raw).unwrap();

        let schema = vec![
            Column::new("id", oids::INT4, 4).with_align(b'i'),
            Column::new("t", oids::TEXT, -1).with_align(b'i'),
        ];
        let row = decode_tuple(&tuple, &schema);
        assert_eq!(row["id"], Value::Int32(42));
        assert_eq!(row["t"], Value::Text("hello".into()));
    }

    #[test]
    fn test_alignment_respected_for_four_byte_varlena() {
        // int2, pad to 4, then a 4-byte-header text
        let mut payload = vec![0x07, 0x00, 0x00, 0x00];
        let body = b"padded string payload here";
        payload.extend_from_slice(&(((body.len() + 4) as u32) << 2).to_le_bytes());
        payload.extend_from_slice(body);
        let raw = build_tuple(1, 0, infomask::XMAX_INVALID, 2, &[], &payload);
        let tuple = HeapTuple::parse(&raw).unwrap();

        let schema = vec![
            Column::new("n", oids::INT2, 2).with_align(b's'),
            Column::new("t", oids::TEXT, -1).with_align(b'i'),
        ];
        let row = decode_tuple(&tuple, &schema);
        assert_eq!(row["n"], Value::Int16(7));
        assert_eq!(
            row["t"],
            Value::Text("padded string payload here".into())
        );
    }

    #[test]
    fn test_eight_byte_alignment() {
        // bool at 0, int8 aligned to 8
        let mut payload = vec![1u8, 0, 0, 0, 0, 0, 0, 0];
        payload.extend_from_slice(&(-5i64).to_le_bytes());
        let raw = build_tuple(1, 0, infomask::XMAX_INVALID, 2, &[], &payload);
        let tuple = HeapTuple::parse(&raw).unwrap();

        let schema = vec![
            Column::new("b", oids::BOOL, 1).with_align(b'c'),
            Column::new("big", oids::INT8, 8).with_align(b'd'),
        ];
        let row = decode_tuple(&tuple, &schema);
        assert_eq!(row["b"], Value::Bool(true));
        assert_eq!(row["big"], Value::Int64(-5));
    }

    #[test]
    fn test_empty_payload_yields_empty_row() {
        let raw = build_tuple(1, 0, infomask::XMAX_INVALID, 0, &[], &[]);
        let tuple = HeapTuple::parse(&raw).unwrap();
        let row = decode_tuple(&tuple, &schema_int4_text_int4());
        assert!(row.is_empty());
    }

    #[test]
    fn test_payload_underrun_decodes_null() {
        let raw = build_tuple(1, 0, infomask::XMAX_INVALID, 1, &[], &[0x01, 0x02]);
        let tuple = HeapTuple::parse(&raw).unwrap();
        let schema = vec![Column::new("n", oids::INT4, 4).with_align(b'i')];
        let row = decode_tuple(&tuple, &schema);
        assert_eq!(row["n"], Value::Null);
    }

    #[test]
    fn test_explicit_attnum_overrides_position() {
        // Single decoded column whose attnum is 2; bitmap marks column 2 null
        let raw = build_tuple(1, 0, infomask::XMAX_INVALID, 2, &[0b01], &[0xAA, 0, 0, 0]);
        let tuple = HeapTuple::parse(&raw).unwrap();
        let schema = vec![Column::new("x", oids::INT4, 4)
            .with_align(b'i')
            .with_attnum(2)];
        let row = decode_tuple(&tuple, &schema);
        assert_eq!(row["x"], Value::Null);
    }

    #[test]
    fn test_unknown_alignment_falls_back_to_type() {
        let mut payload = vec![1u8, 0, 0, 0, 0, 0, 0, 0];
        payload.extend_from_slice(&9i64.to_le_bytes());
        let raw = build_tuple(1, 0, infomask::XMAX_INVALID, 2, &[], &payload);
        let tuple = HeapTuple::parse(&raw).unwrap();
        // No alignment codes: int8 derives 8-byte alignment from its type
        let schema = vec![
            Column::new("b", oids::BOOL, 1),
            Column::new("big", oids::INT8, 8),
        ];
        let row = decode_tuple(&tuple, &schema);
        assert_eq!(row["big"], Value::Int64(9));
    }
}
