//! Structural checks run before a protocol reaches the parser or encoder.

use std::collections::HashSet;

use thiserror::Error;

use crate::frame::{FrameLayout, MAX_FRAME_SIZE};
use crate::{FieldType, Protocol};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("protocol name is empty")]
    EmptyName,
    #[error("field #{index} has an empty name")]
    EmptyFieldName { index: usize },
    #[error("duplicate field name '{name}'")]
    DuplicateFieldName { name: String },
    #[error("field '{field}' has negative offset {offset}")]
    NegativeOffset { field: String, offset: i64 },
    #[error("field '{field}' ({field_type}) needs an explicit length")]
    MissingLength { field: String, field_type: FieldType },
    #[error("field '{field}' has zero length")]
    ZeroLength { field: String },
    #[error("field '{field}' ends at byte {end}, payload is {size} bytes")]
    ExceedsFrameSize {
        field: String,
        end: usize,
        size: usize,
    },
    #[error("header is present but empty")]
    EmptyHeader,
    #[error("footer is present but empty")]
    EmptyFooter,
    #[error("frame has no header, payload, checksum or footer bytes")]
    EmptyFrame,
    #[error("frame needs at least {len} bytes, limit is {max}")]
    FrameTooLarge { len: usize, max: usize },
}

/// Return every structural problem found; empty means valid.
///
/// # Examples
/// ```
/// use framekit_core::{FieldType, Protocol, ProtocolField, ValidationError, validate};
///
/// let protocol = Protocol::new("p")
///     .with_field(ProtocolField::new("a", FieldType::Uint8, 0))
///     .with_field(ProtocolField::new("a", FieldType::String, 1));
/// let errors = validate(&protocol);
/// assert!(errors.contains(&ValidationError::DuplicateFieldName { name: "a".into() }));
/// assert_eq!(errors.len(), 2);
/// ```
pub fn validate(protocol: &Protocol) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if protocol.name.trim().is_empty() {
        errors.push(ValidationError::EmptyName);
    }
    if protocol.header.as_ref().is_some_and(Vec::is_empty) {
        errors.push(ValidationError::EmptyHeader);
    }
    if protocol.footer.as_ref().is_some_and(Vec::is_empty) {
        errors.push(ValidationError::EmptyFooter);
    }

    let mut seen = HashSet::new();
    for (index, field) in protocol.fields.iter().enumerate() {
        if field.name.trim().is_empty() {
            errors.push(ValidationError::EmptyFieldName { index });
        } else if !seen.insert(field.name.as_str()) {
            errors.push(ValidationError::DuplicateFieldName {
                name: field.name.clone(),
            });
        }
        if field.offset < 0 {
            errors.push(ValidationError::NegativeOffset {
                field: field.name.clone(),
                offset: field.offset,
            });
        }
        if field.field_type.is_variable() {
            match field.length {
                None => errors.push(ValidationError::MissingLength {
                    field: field.name.clone(),
                    field_type: field.field_type,
                }),
                Some(0) => errors.push(ValidationError::ZeroLength {
                    field: field.name.clone(),
                }),
                Some(_) => {}
            }
        }
        match (protocol.payload_length, field.end()) {
            (Some(size), Some(end)) if end > size => {
                errors.push(ValidationError::ExceedsFrameSize {
                    field: field.name.clone(),
                    end,
                    size,
                });
            }
            _ => {}
        }
    }

    let layout = FrameLayout::of(protocol);
    if layout.fixed_len() == Some(0) {
        errors.push(ValidationError::EmptyFrame);
    }
    let len = layout.min_len();
    if len > MAX_FRAME_SIZE {
        errors.push(ValidationError::FrameTooLarge {
            len,
            max: MAX_FRAME_SIZE,
        });
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProtocolField;

    #[test]
    fn valid_protocol_has_no_errors() {
        let protocol = Protocol::new("ok")
            .with_header(vec![0xAA])
            .with_field(ProtocolField::new("a", FieldType::Uint16, 0))
            .with_field(ProtocolField::new("b", FieldType::Hex, 2).with_length(4));
        assert!(validate(&protocol).is_empty());
    }

    #[test]
    fn reports_every_problem() {
        let mut protocol = Protocol::new(" ")
            .with_payload_length(4)
            .with_field(ProtocolField::new("neg", FieldType::Uint8, -2))
            .with_field(ProtocolField::new("text", FieldType::String, 0))
            .with_field(ProtocolField::new("", FieldType::Uint8, 0))
            .with_field(ProtocolField::new("wide", FieldType::Uint32, 2))
            .with_field(ProtocolField::new("empty", FieldType::Bytes, 0).with_length(0));
        protocol.footer = Some(vec![]);
        let errors = validate(&protocol);
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptyName,
                ValidationError::EmptyFooter,
                ValidationError::NegativeOffset {
                    field: "neg".into(),
                    offset: -2
                },
                ValidationError::MissingLength {
                    field: "text".into(),
                    field_type: FieldType::String
                },
                ValidationError::EmptyFieldName { index: 2 },
                ValidationError::ExceedsFrameSize {
                    field: "wide".into(),
                    end: 6,
                    size: 4
                },
                ValidationError::ZeroLength {
                    field: "empty".into()
                },
            ]
        );
    }

    #[test]
    fn rejects_frames_without_bytes() {
        assert_eq!(validate(&Protocol::new("empty")), vec![ValidationError::EmptyFrame]);
        let zero = Protocol::new("zero").with_payload_length(0);
        assert_eq!(validate(&zero), vec![ValidationError::EmptyFrame]);
        let header_only = Protocol::new("ping").with_header(vec![0x05]);
        assert!(validate(&header_only).is_empty());
    }

    #[test]
    fn rejects_frames_above_size_limit() {
        let protocol = Protocol::new("huge")
            .with_header(vec![0xAA])
            .with_field(ProtocolField::new("blob", FieldType::Bytes, 0).with_length(usize::MAX));
        assert_eq!(
            validate(&protocol),
            vec![ValidationError::FrameTooLarge {
                len: usize::MAX,
                max: MAX_FRAME_SIZE
            }]
        );

        let declared = Protocol::new("declared")
            .with_payload_length(MAX_FRAME_SIZE)
            .with_checksum(crate::ChecksumAlgorithm::Crc32);
        assert_eq!(
            validate(&declared),
            vec![ValidationError::FrameTooLarge {
                len: MAX_FRAME_SIZE + 4,
                max: MAX_FRAME_SIZE
            }]
        );
        let fits = Protocol::new("fits").with_payload_length(MAX_FRAME_SIZE);
        assert!(validate(&fits).is_empty());
    }

    #[test]
    fn fixed_width_types_ignore_length() {
        let protocol =
            Protocol::new("p").with_field(ProtocolField::new("a", FieldType::Int64, 0));
        assert!(validate(&protocol).is_empty());
    }
}
