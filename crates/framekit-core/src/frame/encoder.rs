//! Frame encoder.

use std::sync::Arc;

use tracing::debug;

use super::layout::{FrameLayout, MAX_FRAME_SIZE, PayloadExtent};
use crate::checksum;
use crate::codec::{EncodeError, FieldValues, encode_field};
use crate::Protocol;

/// Build one frame: header, payload, checksum over the payload, footer.
///
/// Every protocol field needs a value and every value must name a field.
/// Fails without returning a partial buffer.
pub fn encode(protocol: &Protocol, values: &FieldValues) -> Result<Vec<u8>, EncodeError> {
    if let Some(name) = values.keys().find(|name| protocol.field(name).is_none()) {
        return Err(EncodeError::UnknownField {
            field: name.clone(),
        });
    }
    let layout = FrameLayout::of(protocol);
    let payload_len = match layout.payload {
        PayloadExtent::Fixed(len) => len,
        PayloadExtent::Open { field, .. } => {
            return Err(EncodeError::LengthUnresolved {
                field: field.name.clone(),
                field_type: field.field_type,
            });
        }
    };

    let len = layout.min_len();
    if len > MAX_FRAME_SIZE {
        return Err(EncodeError::FrameTooLarge {
            len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut payload = vec![0u8; payload_len];
    for field in &protocol.fields {
        let value = values.get(&field.name).ok_or_else(|| EncodeError::MissingValue {
            field: field.name.clone(),
        })?;
        encode_field(field, value, &mut payload)?;
    }

    let mut frame = Vec::with_capacity(len);
    frame.extend_from_slice(layout.header);
    frame.extend_from_slice(&payload);
    if let Some(algorithm) = layout.checksum {
        frame.extend(checksum::compute(algorithm, &payload));
    }
    frame.extend_from_slice(layout.footer);
    debug!(protocol = %protocol.name, len = frame.len(), "frame encoded");
    Ok(frame)
}

/// Encoder bound to one protocol snapshot.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    protocol: Arc<Protocol>,
}

impl FrameEncoder {
    pub fn new(protocol: Arc<Protocol>) -> Self {
        Self { protocol }
    }

    pub fn protocol(&self) -> &Arc<Protocol> {
        &self.protocol
    }

    pub fn encode(&self, values: &FieldValues) -> Result<Vec<u8>, EncodeError> {
        encode(&self.protocol, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::ChecksumAlgorithm;
    use crate::codec::FieldValue;
    use crate::{ByteOrder, FieldType, ProtocolField};

    fn modbus_read() -> Protocol {
        Protocol::new("modbus")
            .with_checksum(ChecksumAlgorithm::Crc16)
            .with_field(ProtocolField::new("slave", FieldType::Uint8, 0))
            .with_field(ProtocolField::new("function", FieldType::Uint8, 1))
            .with_field(ProtocolField::new("start", FieldType::Uint16, 2))
            .with_field(ProtocolField::new("count", FieldType::Uint16, 4))
    }

    fn values(pairs: &[(&str, FieldValue)]) -> FieldValues {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn modbus_request_with_crc16() {
        let values = values(&[
            ("slave", 1u8.into()),
            ("function", 3u8.into()),
            ("start", 0u16.into()),
            ("count", 10u16.into()),
        ]);
        assert_eq!(
            encode(&modbus_read(), &values).unwrap(),
            vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x0A, 0xC5, 0xCD]
        );
    }

    #[test]
    fn header_footer_and_gaps() {
        let protocol = Protocol::new("p")
            .with_header(vec![0xAA, 0x55])
            .with_footer(vec![0x0D, 0x0A])
            .with_checksum(ChecksumAlgorithm::Xor8)
            .with_field(
                ProtocolField::new("v", FieldType::Uint16, 1)
                    .with_byte_order(ByteOrder::LittleEndian),
            );
        let frame = encode(&protocol, &values(&[("v", 0x0102u16.into())])).unwrap();
        assert_eq!(frame, vec![0xAA, 0x55, 0x00, 0x02, 0x01, 0x03, 0x0D, 0x0A]);
    }

    #[test]
    fn missing_and_unknown_fields() {
        let err = encode(&modbus_read(), &values(&[("slave", 1u8.into())])).unwrap_err();
        assert!(matches!(err, EncodeError::MissingValue { ref field } if field == "function"));
        let err = encode(&modbus_read(), &values(&[("bogus", 1u8.into())])).unwrap_err();
        assert!(matches!(err, EncodeError::UnknownField { ref field } if field == "bogus"));
    }

    #[test]
    fn oversized_payload_is_refused_before_allocating() {
        let protocol = Protocol::new("huge")
            .with_payload_length(usize::MAX)
            .with_field(ProtocolField::new("a", FieldType::Uint8, 0));
        let err = encode(&protocol, &values(&[("a", 1u8.into())])).unwrap_err();
        assert_eq!(
            err,
            EncodeError::FrameTooLarge {
                len: usize::MAX,
                max: MAX_FRAME_SIZE
            }
        );
    }

    #[test]
    fn out_of_range_value_fails_whole_frame() {
        let values = values(&[
            ("slave", 300u16.into()),
            ("function", 3u8.into()),
            ("start", 0u16.into()),
            ("count", 10u16.into()),
        ]);
        let err = FrameEncoder::new(Arc::new(modbus_read())).encode(&values).unwrap_err();
        assert!(err.to_string().starts_with("value out of range"));
    }

    #[test]
    fn open_payload_cannot_be_encoded() {
        let protocol = Protocol::new("p")
            .with_field(ProtocolField::new("data", FieldType::Bytes, 0));
        let err = encode(&protocol, &values(&[("data", vec![1u8].into())])).unwrap_err();
        assert!(err.to_string().starts_with("length mismatch"));
    }
}
