//! Frame geometry derived from a protocol.

use crate::checksum::ChecksumAlgorithm;
use crate::{Protocol, ProtocolField};

/// Default number of garbage bytes scanned before a framing diagnostic.
pub const DEFAULT_MAX_SCAN_WINDOW: usize = 4096;
/// Default upper bound on a frame whose end is not yet known.
pub const DEFAULT_MAX_FRAME_LEN: usize = 4096;
/// Framing diagnostics kept before the oldest are dropped.
pub const MAX_DIAGNOSTICS: usize = 64;
/// Largest frame a protocol may describe.
pub const MAX_FRAME_SIZE: usize = 1 << 20;

/// Size of the payload region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PayloadExtent<'a> {
    /// Declared `payloadLength`, or the furthest field end.
    Fixed(usize),
    /// A variable-length field has no declared length; the payload runs to
    /// the next boundary. `min` is the furthest known field bound.
    Open {
        min: usize,
        field: &'a ProtocolField,
    },
}

impl<'a> PayloadExtent<'a> {
    pub fn of(protocol: &'a Protocol) -> Self {
        if let Some(len) = protocol.payload_length {
            return PayloadExtent::Fixed(len);
        }
        let furthest = protocol
            .fields
            .iter()
            .filter_map(|field| match usize::try_from(field.offset) {
                Ok(start) => Some(start.saturating_add(field.size().unwrap_or(0))),
                Err(_) => None,
            })
            .max()
            .unwrap_or(0);
        match protocol.fields.iter().find(|field| field.size().is_none()) {
            Some(field) => PayloadExtent::Open {
                min: furthest,
                field,
            },
            None => PayloadExtent::Fixed(furthest),
        }
    }

    pub fn min_len(&self) -> usize {
        match *self {
            PayloadExtent::Fixed(len) => len,
            PayloadExtent::Open { min, .. } => min,
        }
    }
}

/// Header, payload extent, checksum and footer of one protocol.
#[derive(Debug, Clone, Copy)]
pub struct FrameLayout<'a> {
    pub header: &'a [u8],
    pub footer: &'a [u8],
    pub checksum: Option<ChecksumAlgorithm>,
    pub payload: PayloadExtent<'a>,
}

impl<'a> FrameLayout<'a> {
    pub fn of(protocol: &'a Protocol) -> Self {
        Self {
            header: protocol.header_bytes(),
            footer: protocol.footer_bytes(),
            checksum: protocol.checksum,
            payload: PayloadExtent::of(protocol),
        }
    }

    pub fn checksum_width(&self) -> usize {
        self.checksum.map_or(0, ChecksumAlgorithm::width)
    }

    /// Bytes after the payload: checksum plus footer.
    pub fn trailer_len(&self) -> usize {
        self.checksum_width() + self.footer.len()
    }

    /// Header, payload and trailer. Saturates at `usize::MAX`; such a layout
    /// is larger than `MAX_FRAME_SIZE` and never frames.
    pub fn min_len(&self) -> usize {
        self.header
            .len()
            .saturating_add(self.payload.min_len())
            .saturating_add(self.trailer_len())
    }

    pub fn fixed_len(&self) -> Option<usize> {
        match self.payload {
            PayloadExtent::Fixed(_) => Some(self.min_len()),
            PayloadExtent::Open { .. } => None,
        }
    }

    /// True when no frame can be cut with this layout: a fixed frame of zero
    /// bytes, or one larger than `MAX_FRAME_SIZE`.
    pub fn is_degenerate(&self) -> bool {
        self.fixed_len() == Some(0) || self.min_len() > MAX_FRAME_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldType, ProtocolField};

    #[test]
    fn fixed_layout_uses_furthest_field() {
        let protocol = Protocol::new("p")
            .with_header(vec![0xAA])
            .with_footer(vec![0x0D, 0x0A])
            .with_checksum(ChecksumAlgorithm::Crc32)
            .with_field(ProtocolField::new("b", FieldType::Uint32, 2))
            .with_field(ProtocolField::new("a", FieldType::Uint8, 0));
        let layout = FrameLayout::of(&protocol);
        assert_eq!(layout.payload, PayloadExtent::Fixed(6));
        assert_eq!(layout.trailer_len(), 6);
        assert_eq!(layout.fixed_len(), Some(13));
        assert_eq!(layout.min_len(), 13);
    }

    #[test]
    fn declared_payload_length_wins() {
        let protocol = Protocol::new("p")
            .with_payload_length(8)
            .with_field(ProtocolField::new("a", FieldType::Uint8, 0));
        assert_eq!(FrameLayout::of(&protocol).fixed_len(), Some(8));
    }

    #[test]
    fn open_layout_when_length_missing() {
        let protocol = Protocol::new("p")
            .with_header(vec![0xAA])
            .with_field(ProtocolField::new("id", FieldType::Uint16, 0))
            .with_field(ProtocolField::new("tail", FieldType::Bytes, 2));
        let layout = FrameLayout::of(&protocol);
        assert!(matches!(
            layout.payload,
            PayloadExtent::Open { min: 2, field } if field.name == "tail"
        ));
        assert_eq!(layout.fixed_len(), None);
        assert_eq!(layout.min_len(), 3);
    }

    #[test]
    fn huge_lengths_saturate() {
        let protocol = Protocol::new("p")
            .with_header(vec![0xAA])
            .with_checksum(ChecksumAlgorithm::Crc16)
            .with_field(ProtocolField::new("blob", FieldType::Bytes, 4).with_length(usize::MAX));
        let layout = FrameLayout::of(&protocol);
        assert_eq!(layout.fixed_len(), Some(usize::MAX));
        assert!(layout.is_degenerate());
    }

    #[test]
    fn empty_layout_is_degenerate() {
        assert!(FrameLayout::of(&Protocol::new("empty")).is_degenerate());
        let zero = Protocol::new("zero")
            .with_payload_length(0)
            .with_field(ProtocolField::new("a", FieldType::Uint8, 0));
        assert!(FrameLayout::of(&zero).is_degenerate());
        let header_only = Protocol::new("h").with_header(vec![0xAA]);
        assert!(!FrameLayout::of(&header_only).is_degenerate());
    }
}
