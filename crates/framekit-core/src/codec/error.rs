use thiserror::Error;

use crate::FieldType;

/// Errors returned by field decoding.
///
/// # Examples
/// ```
/// use framekit_core::DecodeError;
///
/// let err = DecodeError::OutOfBounds {
///     field: "rpm".to_string(),
///     start: 4,
///     end: 6,
///     actual: 5,
/// };
/// assert!(err.to_string().contains("out of bounds"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("out of bounds: field '{field}' needs bytes {start}..{end}, buffer has {actual}")]
    OutOfBounds {
        field: String,
        start: usize,
        end: usize,
        actual: usize,
    },
    #[error("out of bounds: field '{field}' has invalid offset {offset}")]
    InvalidOffset { field: String, offset: i64 },
}

/// Errors returned by field and frame encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("value out of range: field '{field}' ({field_type}) cannot hold {value}")]
    ValueOutOfRange {
        field: String,
        field_type: FieldType,
        value: String,
    },
    #[error("length mismatch: field '{field}' holds {expected} bytes, value has {actual}")]
    LengthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },
    #[error("length mismatch: field '{field}' ({field_type}) has no declared length")]
    LengthUnresolved { field: String, field_type: FieldType },
    #[error("type mismatch: field '{field}' ({field_type}) does not accept {kind} value")]
    TypeMismatch {
        field: String,
        field_type: FieldType,
        kind: &'static str,
    },
    #[error("field '{field}' has invalid offset {offset}")]
    InvalidOffset { field: String, offset: i64 },
    #[error("field '{field}' needs bytes up to {end}, output has {actual}")]
    OutOfBounds {
        field: String,
        end: usize,
        actual: usize,
    },
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
    #[error("missing value for field '{field}'")]
    MissingValue { field: String },
    #[error("unknown field '{field}'")]
    UnknownField { field: String },
}
