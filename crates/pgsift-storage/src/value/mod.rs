//! Dynamically typed column values.
//!
//! Rows decoded from heap files map column names to [`Value`]s. The variant
//! set is deliberately small: unknown or unsupported types carry their raw
//! bytes, and binary-JSON containers reuse the same variants recursively.

mod datetime;
mod numeric;

pub mod decode;
pub mod jsonb;
pub mod varlena;

pub use decode::{decode_type, type_name};
pub use varlena::read_varlena;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A decoded column value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL null (or an unparseable defensive fallback).
    Null,
    /// Boolean.
    Bool(bool),
    /// 2-byte integer.
    Int16(i16),
    /// 4-byte integer.
    Int32(i32),
    /// 8-byte integer; also carries object identifiers.
    Int64(i64),
    /// 4-byte float.
    Float32(f32),
    /// 8-byte float.
    Float64(f64),
    /// Text; also carries formatted temporal, numeric and network values.
    Text(String),
    /// Raw bytes: byte arrays, unknown types, unresolved external pointers.
    Bytes(Vec<u8>),
    /// Array elements in storage order.
    Array(Vec<Value>),
    /// Binary-JSON object.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns true for [`Value::Null`].
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the contained text, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value widened to `i64` for any integer variant.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int16(v) => Some(i64::from(*v)),
            Self::Int32(v) => Some(i64::from(*v)),
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
            Self::Bytes(v) => {
                write!(f, "\\x")?;
                for b in v {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            Self::Array(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "}}")
            }
            Self::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k:?}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Int16(7).as_i64(), Some(7));
        assert_eq!(Value::Int64(-1).as_i64(), Some(-1));
        assert_eq!(Value::Text("x".into()).as_str(), Some("x"));
        assert_eq!(Value::Bool(true).as_i64(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Bytes(vec![0xDE, 0xAD]).to_string(), "\\xdead");
        let arr = Value::Array(vec![Value::Int32(1), Value::Int32(2)]);
        assert_eq!(arr.to_string(), "{1,2}");
    }

    #[test]
    fn test_serialize_shape() {
        let v = serde_json::to_value(Value::Array(vec![
            Value::Null,
            Value::Bool(false),
            Value::Text("t".into()),
        ]))
        .unwrap();
        assert_eq!(v, serde_json::json!([null, false, "t"]));
    }
}
