//! Typed value decoding.
//!
//! [`decode_type`] interprets a byte slice as a value of a given type OID.
//! Unknown type identifiers return the raw bytes unchanged; the decoder is
//! best-effort by design and never fails.

use super::{datetime, jsonb, numeric, varlena, Value};
use crate::bytes;

/// Well-known type OIDs.
#[allow(missing_docs)]
pub mod oids {
    pub const BOOL: u32 = 16;
    pub const BYTEA: u32 = 17;
    pub const CHAR: u32 = 18;
    pub const NAME: u32 = 19;
    pub const INT8: u32 = 20;
    pub const INT2: u32 = 21;
    pub const INT4: u32 = 23;
    pub const REGPROC: u32 = 24;
    pub const TEXT: u32 = 25;
    pub const OID: u32 = 26;
    pub const TID: u32 = 27;
    pub const XID: u32 = 28;
    pub const CID: u32 = 29;
    pub const JSON: u32 = 114;
    pub const XML: u32 = 142;
    pub const POINT: u32 = 600;
    pub const LSEG: u32 = 601;
    pub const PATH: u32 = 602;
    pub const BOX: u32 = 603;
    pub const POLYGON: u32 = 604;
    pub const LINE: u32 = 628;
    pub const CIDR: u32 = 650;
    pub const FLOAT4: u32 = 700;
    pub const FLOAT8: u32 = 701;
    pub const UNKNOWN: u32 = 705;
    pub const CIRCLE: u32 = 718;
    pub const MACADDR8: u32 = 774;
    pub const MONEY: u32 = 790;
    pub const MACADDR: u32 = 829;
    pub const INET: u32 = 869;
    pub const BPCHAR: u32 = 1042;
    pub const VARCHAR: u32 = 1043;
    pub const DATE: u32 = 1082;
    pub const TIME: u32 = 1083;
    pub const TIMESTAMP: u32 = 1114;
    pub const TIMESTAMPTZ: u32 = 1184;
    pub const INTERVAL: u32 = 1186;
    pub const TIMETZ: u32 = 1266;
    pub const BIT: u32 = 1560;
    pub const VARBIT: u32 = 1562;
    pub const NUMERIC: u32 = 1700;
    pub const UUID: u32 = 2950;
    pub const PG_LSN: u32 = 3220;
    pub const TSVECTOR: u32 = 3614;
    pub const TSQUERY: u32 = 3615;
    pub const JSONB: u32 = 3802;
    pub const JSONPATH: u32 = 4072;

    // Array types
    pub const BOOL_ARRAY: u32 = 1000;
    pub const BYTEA_ARRAY: u32 = 1001;
    pub const NAME_ARRAY: u32 = 1003;
    pub const INT2_ARRAY: u32 = 1005;
    pub const INT4_ARRAY: u32 = 1007;
    pub const TEXT_ARRAY: u32 = 1009;
    pub const OID_ARRAY: u32 = 1028;
    pub const BPCHAR_ARRAY: u32 = 1014;
    pub const VARCHAR_ARRAY: u32 = 1015;
    pub const INT8_ARRAY: u32 = 1016;
    pub const FLOAT4_ARRAY: u32 = 1021;
    pub const FLOAT8_ARRAY: u32 = 1022;
    pub const TIMESTAMP_ARRAY: u32 = 1115;
    pub const DATE_ARRAY: u32 = 1182;
    pub const TIMESTAMPTZ_ARRAY: u32 = 1185;
    pub const NUMERIC_ARRAY: u32 = 1231;
    pub const UUID_ARRAY: u32 = 2951;
    pub const JSONB_ARRAY: u32 = 3807;
}

use oids::*;

/// Returns the SQL name of a type OID, or `"unknown"`.
#[must_use]
pub fn type_name(type_id: u32) -> &'static str {
    match type_id {
        BOOL => "bool",
        BYTEA => "bytea",
        CHAR => "char",
        NAME => "name",
        INT8 => "int8",
        INT2 => "int2",
        INT4 => "int4",
        REGPROC => "regproc",
        TEXT => "text",
        OID => "oid",
        TID => "tid",
        XID => "xid",
        CID => "cid",
        JSON => "json",
        XML => "xml",
        CIDR => "cidr",
        FLOAT4 => "float4",
        FLOAT8 => "float8",
        MACADDR8 => "macaddr8",
        MONEY => "money",
        MACADDR => "macaddr",
        INET => "inet",
        BPCHAR => "bpchar",
        VARCHAR => "varchar",
        DATE => "date",
        TIME => "time",
        TIMESTAMP => "timestamp",
        TIMESTAMPTZ => "timestamptz",
        INTERVAL => "interval",
        TIMETZ => "timetz",
        BIT => "bit",
        VARBIT => "varbit",
        NUMERIC => "numeric",
        UUID => "uuid",
        PG_LSN => "pg_lsn",
        TSVECTOR => "tsvector",
        TSQUERY => "tsquery",
        JSONB => "jsonb",
        JSONPATH => "jsonpath",
        BOOL_ARRAY => "bool[]",
        INT2_ARRAY => "int2[]",
        INT4_ARRAY => "int4[]",
        INT8_ARRAY => "int8[]",
        TEXT_ARRAY => "text[]",
        VARCHAR_ARRAY => "varchar[]",
        FLOAT4_ARRAY => "float4[]",
        FLOAT8_ARRAY => "float8[]",
        NUMERIC_ARRAY => "numeric[]",
        UUID_ARRAY => "uuid[]",
        _ => "unknown",
    }
}

/// Returns the element type of an array type OID, if known.
#[must_use]
pub fn array_element_type(type_id: u32) -> Option<u32> {
    Some(match type_id {
        BOOL_ARRAY => BOOL,
        BYTEA_ARRAY => BYTEA,
        NAME_ARRAY => NAME,
        INT2_ARRAY => INT2,
        INT4_ARRAY => INT4,
        TEXT_ARRAY => TEXT,
        OID_ARRAY => OID,
        BPCHAR_ARRAY => BPCHAR,
        VARCHAR_ARRAY => VARCHAR,
        INT8_ARRAY => INT8,
        FLOAT4_ARRAY => FLOAT4,
        FLOAT8_ARRAY => FLOAT8,
        TIMESTAMP_ARRAY => TIMESTAMP,
        DATE_ARRAY => DATE,
        TIMESTAMPTZ_ARRAY => TIMESTAMPTZ,
        NUMERIC_ARRAY => NUMERIC,
        UUID_ARRAY => UUID,
        JSONB_ARRAY => JSONB,
        _ => return None,
    })
}

/// Returns the storage width of a type: a positive byte count for fixed
/// types, `-1` for varlena.
#[must_use]
pub fn type_len(type_id: u32) -> i32 {
    match type_id {
        BOOL | CHAR => 1,
        INT2 => 2,
        INT4 | OID | XID | CID | REGPROC | FLOAT4 | DATE => 4,
        INT8 | FLOAT8 | MONEY | TIME | TIMESTAMP | TIMESTAMPTZ | PG_LSN => 8,
        TID => 6,
        MACADDR => 6,
        MACADDR8 => 8,
        TIMETZ => 12,
        INTERVAL => 16,
        UUID => 16,
        NAME => 64,
        _ => -1,
    }
}

/// Returns the alignment in bytes for a type, falling back to a
/// width-derived guess for unknown identifiers.
#[must_use]
pub fn type_alignment(type_id: u32, length: i32) -> usize {
    match type_id {
        // Double alignment
        INT8 | FLOAT8 | TIMESTAMP | TIMESTAMPTZ | TIME | MONEY | PG_LSN | INTERVAL | TIMETZ
        | POINT | LSEG | BOX | LINE | CIRCLE => 8,

        // Int alignment; varlena headers are int-aligned
        INT4 | OID | REGPROC | FLOAT4 | DATE | XID | CID | TEXT | VARCHAR | BPCHAR | BYTEA
        | JSON | JSONB | XML | NUMERIC | INET | CIDR | PATH | POLYGON | BIT | VARBIT
        | TSVECTOR | TSQUERY | JSONPATH => 4,

        // Short alignment
        INT2 | TID => 2,

        // Byte alignment
        BOOL | CHAR | NAME | UUID | MACADDR | MACADDR8 => 1,

        _ => {
            if length == -1 {
                4 // varlena default
            } else if length >= 8 {
                8
            } else if length >= 4 {
                4
            } else if length >= 2 {
                2
            } else {
                1
            }
        }
    }
}

/// Interprets `data` as a value of type `type_id`.
///
/// Unresolved external pointers and unknown types come back as raw bytes.
#[must_use]
pub fn decode_type(data: &[u8], type_id: u32) -> Value {
    if data.is_empty() {
        return Value::Null;
    }

    // External pointers pass through for the TOAST layer to resolve. A
    // stripped pointer record is exactly 17 bytes, which keeps inline
    // payloads that merely start with a tag-like byte out of this branch.
    if type_len(type_id) == -1 && data.len() == 17 && varlena::is_external(data) {
        return Value::Bytes(data.to_vec());
    }

    match type_id {
        BOOL => Value::Bool(data[0] != 0),
        INT2 => Value::Int16(bytes::i16(data, 0)),
        INT4 => Value::Int32(bytes::i32(data, 0)),
        INT8 => Value::Int64(bytes::i64(data, 0)),
        FLOAT4 => Value::Float32(bytes::f32(data, 0)),
        FLOAT8 => Value::Float64(bytes::f64(data, 0)),
        OID | XID | CID | REGPROC => Value::Int64(i64::from(bytes::u32(data, 0))),

        CHAR => Value::Text(String::from_utf8_lossy(&data[..1]).into_owned()),
        NAME => Value::Text(bytes::cstring(data, 64)),
        TEXT | VARCHAR | BPCHAR | JSON | XML | UNKNOWN => {
            Value::Text(String::from_utf8_lossy(data).into_owned())
        }
        BYTEA => Value::Bytes(data.to_vec()),

        NUMERIC => Value::Text(numeric::decode_numeric(data)),
        MONEY => Value::Text(format_money(bytes::i64(data, 0))),

        DATE => Value::Text(datetime::format_date(bytes::i32(data, 0))),
        TIME => Value::Text(datetime::format_time(bytes::i64(data, 0))),
        TIMETZ => Value::Text(datetime::format_timetz(
            bytes::i64(data, 0),
            bytes::i32(data, 8),
        )),
        TIMESTAMP => Value::Text(datetime::format_timestamp(bytes::i64(data, 0), false)),
        TIMESTAMPTZ => Value::Text(datetime::format_timestamp(bytes::i64(data, 0), true)),
        INTERVAL => {
            let usecs = bytes::i64(data, 0);
            let days = bytes::i32(data, 8);
            let months = if data.len() >= 16 { bytes::i32(data, 12) } else { 0 };
            Value::Text(datetime::format_interval(usecs, days, months))
        }

        UUID => Value::Text(format_uuid(data)),
        INET | CIDR => Value::Text(format_inet(data, type_id == CIDR)),
        MACADDR => Value::Text(format_mac(data, 6)),
        MACADDR8 => Value::Text(format_mac(data, 8)),

        TID => Value::Text(format!("({},{})", bytes::u32(data, 0), bytes::u16(data, 4))),
        PG_LSN => Value::Text(pgsift_common::Lsn::new(bytes::u64(data, 0)).to_string()),

        JSONB => jsonb::parse(data),

        _ => match array_element_type(type_id) {
            Some(elem) => decode_array(data, elem),
            None => Value::Bytes(data.to_vec()),
        },
    }
}

fn format_money(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}${}.{:02}", abs / 100, abs % 100)
}

fn format_uuid(data: &[u8]) -> String {
    if data.len() < 16 {
        return hex_string(data);
    }
    format!(
        "{}-{}-{}-{}-{}",
        hex_string(&data[0..4]),
        hex_string(&data[4..6]),
        hex_string(&data[6..8]),
        hex_string(&data[8..10]),
        hex_string(&data[10..16]),
    )
}

fn hex_string(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

/// Network address payload: family byte, prefix bits, flag, address length,
/// then the address bytes.
fn format_inet(data: &[u8], always_prefix: bool) -> String {
    if data.len() < 4 {
        return hex_string(data);
    }
    let family = data[0];
    let prefix = data[1];
    let addr = &data[4..];

    let formatted = match family {
        2 if addr.len() >= 4 => {
            format!("{}.{}.{}.{}", addr[0], addr[1], addr[2], addr[3])
        }
        3 if addr.len() >= 16 => {
            let groups: Vec<String> = (0..8)
                .map(|i| format!("{:x}", bytes::u16(addr, i * 2).swap_bytes()))
                .collect();
            groups.join(":")
        }
        _ => return hex_string(data),
    };

    let full = if family == 2 { 32 } else { 128 };
    if always_prefix || u32::from(prefix) != full {
        format!("{formatted}/{prefix}")
    } else {
        formatted
    }
}

fn format_mac(data: &[u8], len: usize) -> String {
    data.iter()
        .take(len)
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Decodes an array payload: a dimension header, optional null bitmap, then
/// an element stream aligned per the element type.
fn decode_array(data: &[u8], elem_type: u32) -> Value {
    if data.len() < 12 {
        return Value::Bytes(data.to_vec());
    }

    let ndim = bytes::i32(data, 0);
    let data_offset = bytes::i32(data, 4);

    if ndim < 0 || ndim > 6 {
        return Value::Bytes(data.to_vec());
    }
    if ndim == 0 {
        return Value::Array(Vec::new());
    }
    let ndim = ndim as usize;

    let mut nitems: usize = 1;
    for d in 0..ndim {
        let dim = bytes::i32(data, 12 + d * 8);
        if dim < 0 || dim > 1_000_000 {
            return Value::Bytes(data.to_vec());
        }
        nitems = nitems.saturating_mul(dim as usize);
    }
    if nitems > 1_000_000 {
        return Value::Bytes(data.to_vec());
    }

    let dims_end = 12 + ndim * 8;

    // Element offsets are aligned relative to the datum start, which sits
    // four bytes (the stripped length word) before this payload.
    let bias = 4usize;

    let (bitmap, mut offset) = if data_offset != 0 {
        let bitmap_len = (nitems + 7) / 8;
        if dims_end + bitmap_len > data.len() {
            return Value::Bytes(data.to_vec());
        }
        let bitmap = data[dims_end..dims_end + bitmap_len].to_vec();
        let start = (data_offset as usize).saturating_sub(bias);
        (Some(bitmap), start)
    } else {
        (None, bytes::align(dims_end + bias, 8) - bias)
    };

    let elem_len = type_len(elem_type);
    let elem_align = type_alignment(elem_type, elem_len);

    let mut items = Vec::with_capacity(nitems);
    for i in 0..nitems {
        if let Some(ref bm) = bitmap {
            let is_null = !bm
                .get(i / 8)
                .map_or(false, |byte| byte & (1 << (i % 8)) != 0);
            if is_null {
                items.push(Value::Null);
                continue;
            }
        }

        // Short varlena elements skip alignment, same as in tuples
        let skip_align = elem_len == -1
            && data
                .get(offset)
                .is_some_and(|&b| b & 0x01 == 0x01 && b != 0x01);
        if !skip_align {
            offset = bytes::align(offset + bias, elem_align) - bias;
        }

        if offset >= data.len() {
            break;
        }

        if elem_len > 0 {
            let end = offset + elem_len as usize;
            if end > data.len() {
                break;
            }
            items.push(decode_type(&data[offset..end], elem_type));
            offset = end;
        } else {
            match varlena::read_varlena(&data[offset..]) {
                Some((payload, consumed)) => {
                    items.push(decode_type(&payload, elem_type));
                    offset += consumed;
                }
                None => break,
            }
        }
    }

    Value::Array(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_integers() {
        assert_eq!(decode_type(&[1], BOOL), Value::Bool(true));
        assert_eq!(decode_type(&[0], BOOL), Value::Bool(false));
        assert_eq!(decode_type(&[0x39, 0x05], INT2), Value::Int16(1337));
        assert_eq!(decode_type(&[0xD2, 0x04, 0x00, 0x00], INT4), Value::Int32(1234));
        assert_eq!(
            decode_type(&[0x15, 0xCD, 0x5B, 0x07, 0, 0, 0, 0], INT8),
            Value::Int64(123_456_789)
        );
    }

    #[test]
    fn test_floats() {
        assert_eq!(
            decode_type(&1.5f32.to_le_bytes(), FLOAT4),
            Value::Float32(1.5)
        );
        assert_eq!(
            decode_type(&(-2.25f64).to_le_bytes(), FLOAT8),
            Value::Float64(-2.25)
        );
    }

    #[test]
    fn test_text_kinds() {
        assert_eq!(decode_type(b"hello", TEXT), Value::Text("hello".into()));
        let mut name = [0u8; 64];
        name[..4].copy_from_slice(b"attr");
        assert_eq!(decode_type(&name, NAME), Value::Text("attr".into()));
        assert_eq!(decode_type(&[b'x'], CHAR), Value::Text("x".into()));
        assert_eq!(decode_type(b"raw", BYTEA), Value::Bytes(b"raw".to_vec()));
    }

    #[test]
    fn test_oid_kinds() {
        assert_eq!(
            decode_type(&1262u32.to_le_bytes(), OID),
            Value::Int64(1262)
        );
        assert_eq!(decode_type(&7u32.to_le_bytes(), XID), Value::Int64(7));
    }

    #[test]
    fn test_unknown_type_returns_raw() {
        let raw = [0xAB, 0xCD];
        assert_eq!(decode_type(&raw, 99_999), Value::Bytes(raw.to_vec()));
    }

    #[test]
    fn test_uuid() {
        let mut data = [0u8; 16];
        for (i, b) in data.iter_mut().enumerate() {
            *b = i as u8;
        }
        assert_eq!(
            decode_type(&data, UUID),
            Value::Text("00010203-0405-0607-0809-0a0b0c0d0e0f".into())
        );
    }

    #[test]
    fn test_money() {
        assert_eq!(
            decode_type(&12_345i64.to_le_bytes(), MONEY),
            Value::Text("$123.45".into())
        );
        assert_eq!(
            decode_type(&(-50i64).to_le_bytes(), MONEY),
            Value::Text("-$0.50".into())
        );
    }

    #[test]
    fn test_inet() {
        // family 2 (v4), /32, flag, 4 addr bytes
        let data = [2, 32, 0, 4, 192, 168, 0, 1];
        assert_eq!(decode_type(&data, INET), Value::Text("192.168.0.1".into()));
        let data = [2, 24, 1, 4, 10, 0, 0, 0];
        assert_eq!(decode_type(&data, CIDR), Value::Text("10.0.0.0/24".into()));
    }

    #[test]
    fn test_tid_and_lsn() {
        let mut tid = Vec::new();
        tid.extend_from_slice(&3u32.to_le_bytes());
        tid.extend_from_slice(&7u16.to_le_bytes());
        assert_eq!(decode_type(&tid, TID), Value::Text("(3,7)".into()));

        assert_eq!(
            decode_type(&0x1_0000_ABCDu64.to_le_bytes(), PG_LSN),
            Value::Text("1/ABCD".into())
        );
    }

    #[test]
    fn test_date_and_timestamp() {
        assert_eq!(
            decode_type(&0i32.to_le_bytes(), DATE),
            Value::Text("2000-01-01".into())
        );
        assert_eq!(
            decode_type(&0i64.to_le_bytes(), TIMESTAMPTZ),
            Value::Text("2000-01-01 00:00:00+00".into())
        );
    }

    #[test]
    fn test_external_pointer_passthrough() {
        let mut record = vec![0x12];
        record.extend_from_slice(&[0u8; 16]);
        assert_eq!(decode_type(&record, TEXT), Value::Bytes(record.clone()));
        // Fixed-width types never route through the pointer check
        assert_eq!(decode_type(&[0x01], BOOL), Value::Bool(true));
    }

    /// Builds a 1-D int4 array payload with no nulls.
    fn int4_array(values: &[i32]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&1i32.to_le_bytes()); // ndim
        out.extend_from_slice(&0i32.to_le_bytes()); // dataoffset (no nulls)
        out.extend_from_slice(&INT4.to_le_bytes()); // element type
        out.extend_from_slice(&(values.len() as i32).to_le_bytes());
        out.extend_from_slice(&1i32.to_le_bytes()); // lower bound
        for v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_int4_array() {
        let data = int4_array(&[10, -20, 30]);
        assert_eq!(
            decode_type(&data, INT4_ARRAY),
            Value::Array(vec![Value::Int32(10), Value::Int32(-20), Value::Int32(30)])
        );
    }

    #[test]
    fn test_text_array_with_nulls() {
        // ndim 1, dataoffset set, 3 items, bitmap 0b101 (middle null)
        let mut out = Vec::new();
        out.extend_from_slice(&1i32.to_le_bytes());
        let dims_end = 20usize;
        let bitmap_len = 1usize;
        // dataoffset counts from the datum start (payload + 4), maxaligned
        let data_offset = ((dims_end + bitmap_len + 4 + 7) & !7) as i32;
        out.extend_from_slice(&data_offset.to_le_bytes());
        out.extend_from_slice(&TEXT.to_le_bytes());
        out.extend_from_slice(&3i32.to_le_bytes());
        out.extend_from_slice(&1i32.to_le_bytes());
        out.push(0b101);
        while out.len() < (data_offset as usize) - 4 {
            out.push(0);
        }
        out.extend_from_slice(&varlena::build_varlena(b"one"));
        out.extend_from_slice(&varlena::build_varlena(b"three"));

        assert_eq!(
            decode_type(&out, TEXT_ARRAY),
            Value::Array(vec![
                Value::Text("one".into()),
                Value::Null,
                Value::Text("three".into()),
            ])
        );
    }

    #[test]
    fn test_malformed_array_returns_raw() {
        let data = [9u8; 12];
        assert_eq!(
            decode_type(&data, INT4_ARRAY),
            Value::Bytes(data.to_vec())
        );
    }

    #[test]
    fn test_type_metadata() {
        assert_eq!(type_name(BOOL), "bool");
        assert_eq!(type_name(3802), "jsonb");
        assert_eq!(type_name(424_242), "unknown");
        assert_eq!(type_len(INT8), 8);
        assert_eq!(type_len(TEXT), -1);
        assert_eq!(type_alignment(INT8, 8), 8);
        assert_eq!(type_alignment(TEXT, -1), 4);
        assert_eq!(type_alignment(BOOL, 1), 1);
        assert_eq!(type_alignment(424_242, -1), 4);
        assert_eq!(type_alignment(424_242, 2), 2);
    }
}
