//! Field decoding.
//!
//! `buffer` is the payload region. A variable-length field without a
//! declared length runs to the end of the buffer.

use std::ops::Range;

use super::error::DecodeError;
use super::hex_pairs;
use super::reader::FieldReader;
use super::value::FieldValue;
use crate::{ByteOrder, FieldType, ParsedField, ProtocolField};

macro_rules! read_number {
    ($reader:expr, $start:expr, $order:expr, $ty:ty) => {{
        let bytes = $reader.read_array($start)?;
        match $order {
            ByteOrder::BigEndian => <$ty>::from_be_bytes(bytes),
            ByteOrder::LittleEndian => <$ty>::from_le_bytes(bytes),
        }
    }};
}

/// Decode one field into a [`ParsedField`].
///
/// # Examples
/// ```
/// use framekit_core::{ByteOrder, FieldType, ProtocolField, decode_field};
///
/// let field = ProtocolField::new("temp", FieldType::Int16, 1)
///     .with_byte_order(ByteOrder::LittleEndian);
/// let parsed = decode_field(&[0x00, 0xF6, 0xFF], &field)?;
/// assert_eq!(parsed.value, "-10");
/// assert_eq!(parsed.raw_bytes, vec![0xF6, 0xFF]);
/// # Ok::<(), framekit_core::DecodeError>(())
/// ```
pub fn decode_field(buffer: &[u8], field: &ProtocolField) -> Result<ParsedField, DecodeError> {
    let range = field_range(buffer, field)?;
    let reader = FieldReader::new(buffer, &field.name);
    let raw = reader.read_slice(range)?;
    let value = decode_value(buffer, field)?;
    Ok(ParsedField {
        name: field.name.clone(),
        field_type: field.field_type,
        raw_bytes: raw.to_vec(),
        value: render_value(field.field_type, &value),
        description: field.description.clone(),
    })
}

/// Decode one field into a typed [`FieldValue`].
pub fn decode_value(buffer: &[u8], field: &ProtocolField) -> Result<FieldValue, DecodeError> {
    let range = field_range(buffer, field)?;
    let reader = FieldReader::new(buffer, &field.name);
    let start = range.start;
    let order = field.byte_order;
    let value = match field.field_type {
        FieldType::Uint8 => FieldValue::Unsigned(u64::from(read_number!(reader, start, order, u8))),
        FieldType::Uint16 => {
            FieldValue::Unsigned(u64::from(read_number!(reader, start, order, u16)))
        }
        FieldType::Uint32 => {
            FieldValue::Unsigned(u64::from(read_number!(reader, start, order, u32)))
        }
        FieldType::Uint64 => FieldValue::Unsigned(read_number!(reader, start, order, u64)),
        FieldType::Int8 => FieldValue::Signed(i64::from(read_number!(reader, start, order, i8))),
        FieldType::Int16 => FieldValue::Signed(i64::from(read_number!(reader, start, order, i16))),
        FieldType::Int32 => FieldValue::Signed(i64::from(read_number!(reader, start, order, i32))),
        FieldType::Int64 => FieldValue::Signed(read_number!(reader, start, order, i64)),
        FieldType::Float32 => {
            FieldValue::Float(f64::from(read_number!(reader, start, order, f32)))
        }
        FieldType::Float64 => FieldValue::Float(read_number!(reader, start, order, f64)),
        FieldType::String => {
            let raw = reader.read_slice(range)?;
            let text = String::from_utf8_lossy(raw);
            FieldValue::Text(text.trim_end_matches('\0').to_string())
        }
        FieldType::Bytes | FieldType::Hex => FieldValue::Bytes(reader.read_slice(range)?.to_vec()),
    };
    Ok(value)
}

/// Render a decoded value the way it is displayed.
///
/// Floats use fixed precision (6 digits for float32, 10 for float64);
/// `bytes` and `hex` render as uppercase hex pairs.
pub fn render_value(field_type: FieldType, value: &FieldValue) -> String {
    match (field_type, value) {
        (FieldType::Float32, FieldValue::Float(v)) => format!("{v:.6}"),
        (FieldType::Float64, FieldValue::Float(v)) => format!("{v:.10}"),
        (_, FieldValue::Bytes(bytes)) => hex_pairs(bytes),
        (_, other) => other.to_string(),
    }
}

fn field_range(buffer: &[u8], field: &ProtocolField) -> Result<Range<usize>, DecodeError> {
    let start = usize::try_from(field.offset).map_err(|_| DecodeError::InvalidOffset {
        field: field.name.clone(),
        offset: field.offset,
    })?;
    let size = match field.size() {
        Some(size) => size,
        None => buffer.len().saturating_sub(start),
    };
    let end = start.checked_add(size).ok_or(DecodeError::InvalidOffset {
        field: field.name.clone(),
        offset: field.offset,
    })?;
    if end > buffer.len() || start > buffer.len() {
        return Err(DecodeError::OutOfBounds {
            field: field.name.clone(),
            start,
            end,
            actual: buffer.len(),
        });
    }
    Ok(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(field_type: FieldType, offset: i64) -> ProtocolField {
        ProtocolField::new("f", field_type, offset)
    }

    #[test]
    fn unsigned_big_and_little_endian() {
        let buf = [0x12, 0x34];
        assert_eq!(decode_field(&buf, &field(FieldType::Uint16, 0)).unwrap().value, "4660");
        let le = field(FieldType::Uint16, 0).with_byte_order(ByteOrder::LittleEndian);
        assert_eq!(decode_field(&buf, &le).unwrap().value, "13330");
    }

    #[test]
    fn signed_twos_complement() {
        let buf = [0xFF, 0xFF, 0xFF, 0xFE];
        assert_eq!(decode_field(&buf, &field(FieldType::Int32, 0)).unwrap().value, "-2");
        assert_eq!(decode_field(&buf, &field(FieldType::Int8, 3)).unwrap().value, "-2");
    }

    #[test]
    fn floats_fixed_precision() {
        let buf = 1.5f32.to_be_bytes();
        assert_eq!(decode_field(&buf, &field(FieldType::Float32, 0)).unwrap().value, "1.500000");
        let buf = (-0.25f64).to_le_bytes();
        let f = field(FieldType::Float64, 0).with_byte_order(ByteOrder::LittleEndian);
        assert_eq!(decode_field(&buf, &f).unwrap().value, "-0.2500000000");
    }

    #[test]
    fn string_lossy_and_nul_trimmed() {
        let buf = [b'O', b'K', 0xFF, 0x00];
        let f = field(FieldType::String, 0).with_length(4);
        assert_eq!(decode_field(&buf, &f).unwrap().value, "OK\u{FFFD}");
    }

    #[test]
    fn hex_and_bytes_render_pairs() {
        let buf = [0x00, 0x0A, 0xFF];
        let hex = field(FieldType::Hex, 1).with_length(2);
        let parsed = decode_field(&buf, &hex).unwrap();
        assert_eq!(parsed.value, "0A FF");
        assert_eq!(parsed.raw_bytes, vec![0x0A, 0xFF]);
        let bytes = field(FieldType::Bytes, 0).with_length(3);
        assert_eq!(
            decode_value(&buf, &bytes).unwrap(),
            FieldValue::Bytes(vec![0x00, 0x0A, 0xFF])
        );
    }

    #[test]
    fn open_ended_field_runs_to_end() {
        let buf = [1, 2, 3, 4];
        let parsed = decode_field(&buf, &field(FieldType::Bytes, 1)).unwrap();
        assert_eq!(parsed.raw_bytes, vec![2, 3, 4]);
    }

    #[test]
    fn out_of_bounds_for_every_type() {
        let all = [
            FieldType::Uint8,
            FieldType::Uint16,
            FieldType::Uint32,
            FieldType::Uint64,
            FieldType::Int8,
            FieldType::Int16,
            FieldType::Int32,
            FieldType::Int64,
            FieldType::Float32,
            FieldType::Float64,
            FieldType::String,
            FieldType::Bytes,
            FieldType::Hex,
        ];
        let buf = [0u8; 2];
        for ty in all {
            let f = field(ty, 2).with_length(1);
            let err = decode_field(&buf, &f).unwrap_err();
            assert!(err.to_string().contains("out of bounds"), "{ty}: {err}");
            let far = field(ty, 1_000).with_length(1);
            assert!(decode_field(&buf, &far).is_err());
        }
    }

    #[test]
    fn negative_offset_is_rejected() {
        let err = decode_field(&[0u8; 4], &field(FieldType::Uint8, -1)).unwrap_err();
        assert_eq!(
            err,
            DecodeError::InvalidOffset {
                field: "f".to_string(),
                offset: -1
            }
        );
    }
}
