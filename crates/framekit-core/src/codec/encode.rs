//! Field encoding.

use super::error::EncodeError;
use super::value::{FieldValue, decode_hex_text};
use super::writer::FieldWriter;
use crate::{ByteOrder, FieldType, ProtocolField};

macro_rules! write_number {
    ($value:expr, $order:expr) => {
        match $order {
            ByteOrder::BigEndian => $value.to_be_bytes().to_vec(),
            ByteOrder::LittleEndian => $value.to_le_bytes().to_vec(),
        }
    };
}

/// Encode `value` into `out` (the payload region) at the field's offset.
///
/// Nothing is written when the value is rejected.
///
/// # Examples
/// ```
/// use framekit_core::{ByteOrder, FieldType, ProtocolField, encode_field};
///
/// let field = ProtocolField::new("rpm", FieldType::Uint16, 1)
///     .with_byte_order(ByteOrder::LittleEndian);
/// let mut payload = [0u8; 3];
/// encode_field(&field, &0x1234u16.into(), &mut payload)?;
/// assert_eq!(payload, [0x00, 0x34, 0x12]);
/// # Ok::<(), framekit_core::EncodeError>(())
/// ```
pub fn encode_field(
    field: &ProtocolField,
    value: &FieldValue,
    out: &mut [u8],
) -> Result<(), EncodeError> {
    let start = usize::try_from(field.offset).map_err(|_| EncodeError::InvalidOffset {
        field: field.name.clone(),
        offset: field.offset,
    })?;
    let bytes = encode_value(field, value)?;
    FieldWriter::new(out, &field.name).write(start, &bytes)
}

/// Encode `value` into exactly the field's size in wire order.
pub fn encode_value(field: &ProtocolField, value: &FieldValue) -> Result<Vec<u8>, EncodeError> {
    let order = field.byte_order;
    let bytes = match field.field_type {
        FieldType::Uint8 => write_number!(integer::<u8>(field, value)?, order),
        FieldType::Uint16 => write_number!(integer::<u16>(field, value)?, order),
        FieldType::Uint32 => write_number!(integer::<u32>(field, value)?, order),
        FieldType::Uint64 => write_number!(integer::<u64>(field, value)?, order),
        FieldType::Int8 => write_number!(integer::<i8>(field, value)?, order),
        FieldType::Int16 => write_number!(integer::<i16>(field, value)?, order),
        FieldType::Int32 => write_number!(integer::<i32>(field, value)?, order),
        FieldType::Int64 => write_number!(integer::<i64>(field, value)?, order),
        FieldType::Float32 => {
            let wide = float(field, value)?;
            if wide.is_finite() && wide.abs() > f64::from(f32::MAX) {
                return Err(out_of_range(field, value));
            }
            write_number!(wide as f32, order)
        }
        FieldType::Float64 => write_number!(float(field, value)?, order),
        FieldType::String => {
            let length = declared_length(field)?;
            let mut bytes = match value {
                FieldValue::Text(text) => text.as_bytes().to_vec(),
                FieldValue::Bytes(raw) => raw.clone(),
                other => return Err(type_mismatch(field, other)),
            };
            if bytes.len() > length {
                return Err(EncodeError::LengthMismatch {
                    field: field.name.clone(),
                    expected: length,
                    actual: bytes.len(),
                });
            }
            bytes.resize(length, 0);
            bytes
        }
        FieldType::Bytes | FieldType::Hex => {
            let length = declared_length(field)?;
            let bytes = match value {
                FieldValue::Bytes(raw) => raw.clone(),
                FieldValue::Text(text) => {
                    decode_hex_text(text).ok_or_else(|| out_of_range(field, value))?
                }
                other => return Err(type_mismatch(field, other)),
            };
            if bytes.len() != length {
                return Err(EncodeError::LengthMismatch {
                    field: field.name.clone(),
                    expected: length,
                    actual: bytes.len(),
                });
            }
            bytes
        }
    };
    Ok(bytes)
}

fn integer<T>(field: &ProtocolField, value: &FieldValue) -> Result<T, EncodeError>
where
    T: TryFrom<u64> + TryFrom<i64>,
{
    let converted = match value {
        FieldValue::Unsigned(v) => <T as TryFrom<u64>>::try_from(*v).ok(),
        FieldValue::Signed(v) => <T as TryFrom<i64>>::try_from(*v).ok(),
        other => return Err(type_mismatch(field, other)),
    };
    converted.ok_or_else(|| out_of_range(field, value))
}

fn float(field: &ProtocolField, value: &FieldValue) -> Result<f64, EncodeError> {
    match value {
        FieldValue::Float(v) => Ok(*v),
        FieldValue::Unsigned(v) => Ok(*v as f64),
        FieldValue::Signed(v) => Ok(*v as f64),
        other => Err(type_mismatch(field, other)),
    }
}

fn declared_length(field: &ProtocolField) -> Result<usize, EncodeError> {
    field.length.ok_or_else(|| EncodeError::LengthUnresolved {
        field: field.name.clone(),
        field_type: field.field_type,
    })
}

fn out_of_range(field: &ProtocolField, value: &FieldValue) -> EncodeError {
    EncodeError::ValueOutOfRange {
        field: field.name.clone(),
        field_type: field.field_type,
        value: value.to_string(),
    }
}

fn type_mismatch(field: &ProtocolField, value: &FieldValue) -> EncodeError {
    EncodeError::TypeMismatch {
        field: field.name.clone(),
        field_type: field.field_type,
        kind: value.kind(),
    }
}
