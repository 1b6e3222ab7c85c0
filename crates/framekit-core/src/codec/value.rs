//! Typed field values used for encoding.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::EncodeError;
use super::hex_pairs;
use crate::{FieldType, ProtocolField};

/// Value supplied for one field when building a frame.
///
/// Serialized untagged so a JSON object such as
/// `{"speed": 1200, "name": "PUMP", "temp": -12.5}` maps directly onto
/// [`FieldValues`]. Byte-oriented fields take hex text or a JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

/// Field name to value, ordered by name.
pub type FieldValues = BTreeMap<String, FieldValue>;

impl FieldValue {
    /// Short kind label used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Unsigned(_) => "unsigned",
            FieldValue::Signed(_) => "signed",
            FieldValue::Float(_) => "float",
            FieldValue::Text(_) => "text",
            FieldValue::Bytes(_) => "bytes",
        }
    }

    /// Parse command-line text according to the field type.
    ///
    /// Integers accept decimal or `0x` hex; `bytes`/`hex` fields accept hex
    /// digits with optional whitespace.
    ///
    /// # Examples
    /// ```
    /// use framekit_core::{FieldType, FieldValue, ProtocolField};
    ///
    /// let field = ProtocolField::new("addr", FieldType::Uint16, 0);
    /// assert_eq!(FieldValue::parse_for(&field, "0x1F")?, FieldValue::Unsigned(31));
    /// # Ok::<(), framekit_core::EncodeError>(())
    /// ```
    pub fn parse_for(field: &ProtocolField, input: &str) -> Result<FieldValue, EncodeError> {
        let text = input.trim();
        let invalid = || EncodeError::ValueOutOfRange {
            field: field.name.clone(),
            field_type: field.field_type,
            value: text.to_string(),
        };
        match field.field_type {
            FieldType::String => Ok(FieldValue::Text(input.to_string())),
            FieldType::Bytes | FieldType::Hex => decode_hex_text(text)
                .map(FieldValue::Bytes)
                .ok_or_else(invalid),
            FieldType::Float32 | FieldType::Float64 => {
                text.parse::<f64>().map(FieldValue::Float).map_err(|_| invalid())
            }
            _ => parse_integer(text).ok_or_else(invalid),
        }
    }
}

fn parse_integer(text: &str) -> Option<FieldValue> {
    if let Some(digits) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        return u64::from_str_radix(digits, 16).ok().map(FieldValue::Unsigned);
    }
    if let Ok(value) = text.parse::<u64>() {
        return Some(FieldValue::Unsigned(value));
    }
    text.parse::<i64>().ok().map(FieldValue::Signed)
}

/// Hex text with whitespace stripped, `None` on odd length or bad digits.
pub(crate) fn decode_hex_text(text: &str) -> Option<Vec<u8>> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(digits).ok()
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Unsigned(value) => write!(f, "{value}"),
            FieldValue::Signed(value) => write!(f, "{value}"),
            FieldValue::Float(value) => write!(f, "{value}"),
            FieldValue::Text(value) => f.write_str(value),
            FieldValue::Bytes(value) => f.write_str(&hex_pairs(value)),
        }
    }
}

macro_rules! from_unsigned {
    ($($ty:ty),*) => {
        $(impl From<$ty> for FieldValue {
            fn from(value: $ty) -> Self {
                FieldValue::Unsigned(u64::from(value))
            }
        })*
    };
}

macro_rules! from_signed {
    ($($ty:ty),*) => {
        $(impl From<$ty> for FieldValue {
            fn from(value: $ty) -> Self {
                FieldValue::Signed(i64::from(value))
            }
        })*
    };
}

from_unsigned!(u8, u16, u32, u64);
from_signed!(i8, i16, i32, i64);

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        FieldValue::Float(f64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        FieldValue::Bytes(value)
    }
}

impl From<&[u8]> for FieldValue {
    fn from(value: &[u8]) -> Self {
        FieldValue::Bytes(value.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_integer_forms() {
        let field = ProtocolField::new("v", FieldType::Int16, 0);
        assert_eq!(FieldValue::parse_for(&field, "42").unwrap(), FieldValue::Unsigned(42));
        assert_eq!(FieldValue::parse_for(&field, "-7").unwrap(), FieldValue::Signed(-7));
        assert_eq!(FieldValue::parse_for(&field, "0xff").unwrap(), FieldValue::Unsigned(255));
        assert!(FieldValue::parse_for(&field, "seven").is_err());
    }

    #[test]
    fn parse_bytes_hex_text() {
        let field = ProtocolField::new("raw", FieldType::Bytes, 0).with_length(3);
        assert_eq!(
            FieldValue::parse_for(&field, "0a ff 10").unwrap(),
            FieldValue::Bytes(vec![0x0A, 0xFF, 0x10])
        );
        let err = FieldValue::parse_for(&field, "0a f").unwrap_err();
        assert!(err.to_string().starts_with("value out of range"));
    }

    #[test]
    fn parse_string_keeps_text() {
        let field = ProtocolField::new("tag", FieldType::String, 0).with_length(4);
        assert_eq!(
            FieldValue::parse_for(&field, " ab").unwrap(),
            FieldValue::Text(" ab".to_string())
        );
    }

    #[test]
    fn untagged_json_values() {
        let values: FieldValues =
            serde_json::from_str(r#"{"a": 1, "b": -2, "c": 1.5, "d": "x", "e": [1, 2]}"#).unwrap();
        assert_eq!(values["a"], FieldValue::Unsigned(1));
        assert_eq!(values["b"], FieldValue::Signed(-2));
        assert_eq!(values["c"], FieldValue::Float(1.5));
        assert_eq!(values["d"], FieldValue::Text("x".to_string()));
        assert_eq!(values["e"], FieldValue::Bytes(vec![1, 2]));
    }

    #[test]
    fn display_bytes_as_hex_pairs() {
        assert_eq!(FieldValue::from(vec![0xDE, 0xAD]).to_string(), "DE AD");
        assert_eq!(FieldValue::from(-3i8).to_string(), "-3");
    }
}
