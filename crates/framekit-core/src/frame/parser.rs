//! Frame parser: synchronizer + field codec + checksum engine.

use std::sync::Arc;

use tracing::{debug, warn};

use super::error::FramingError;
use super::layout::{FrameLayout, PayloadExtent};
use super::sync::{FrameSynchronizer, SyncConfig, SyncState};
use crate::checksum;
use crate::codec::{decode_field, hex_pairs};
use crate::{ParsedFrame, Protocol};

/// Running counters of one parser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    pub frames: u64,
    pub invalid_frames: u64,
    pub checksum_mismatches: u64,
    pub decode_errors: u64,
    pub framing_errors: u64,
    pub bytes_discarded: u64,
}

#[derive(Debug, Default)]
struct FrameIssues {
    checksum_mismatch: bool,
    decode_errors: u64,
}

/// Incremental decoder for one byte stream.
///
/// Not shareable between streams: it owns the carryover buffer. Decode N
/// streams with N parsers.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use framekit_core::{FieldType, FrameParser, Protocol, ProtocolField};
///
/// let protocol = Protocol::new("p")
///     .with_header(vec![0xAA])
///     .with_field(ProtocolField::new("v", FieldType::Uint8, 0));
/// let mut parser = FrameParser::new(Arc::new(protocol));
///
/// assert_eq!(parser.feed(&[0x00, 0xAA]).count(), 0);
/// let frames: Vec<_> = parser.feed(&[0x07]).collect();
/// assert_eq!(frames[0].fields[0].value, "7");
/// ```
pub struct FrameParser {
    protocol: Arc<Protocol>,
    sync: FrameSynchronizer,
    frames: u64,
    invalid_frames: u64,
    checksum_mismatches: u64,
    decode_errors: u64,
}

impl FrameParser {
    pub fn new(protocol: Arc<Protocol>) -> Self {
        Self::with_config(protocol, SyncConfig::default())
    }

    pub fn with_config(protocol: Arc<Protocol>, config: SyncConfig) -> Self {
        let sync = FrameSynchronizer::new(Arc::clone(&protocol), config);
        Self {
            protocol,
            sync,
            frames: 0,
            invalid_frames: 0,
            checksum_mismatches: 0,
            decode_errors: 0,
        }
    }

    pub fn protocol(&self) -> &Arc<Protocol> {
        &self.protocol
    }

    /// Append `bytes` to the carryover and yield the frames now complete.
    ///
    /// The iterator is lazy. Frames it does not yield before being dropped
    /// stay buffered and come out of the next `feed` or `flush`.
    pub fn feed(&mut self, bytes: &[u8]) -> Frames<'_> {
        self.sync.extend(bytes);
        Frames { parser: self }
    }

    /// End of stream: yield remaining frames, including a trailing
    /// open-ended one, and drop incomplete carryover.
    pub fn flush(&mut self) -> Vec<ParsedFrame> {
        let mut frames: Vec<ParsedFrame> = Frames { parser: self }.collect();
        if let Some(raw) = self.sync.flush() {
            frames.push(self.finish(raw));
        }
        frames
    }

    /// Drop carryover and counters; the protocol is kept.
    pub fn reset(&mut self) {
        self.sync.reset();
        self.frames = 0;
        self.invalid_frames = 0;
        self.checksum_mismatches = 0;
        self.decode_errors = 0;
    }

    pub fn pending(&self) -> usize {
        self.sync.pending()
    }

    pub fn state(&self) -> SyncState {
        self.sync.state()
    }

    pub fn stats(&self) -> ParserStats {
        let sync = self.sync.stats();
        ParserStats {
            frames: self.frames,
            invalid_frames: self.invalid_frames,
            checksum_mismatches: self.checksum_mismatches,
            decode_errors: self.decode_errors,
            framing_errors: sync.framing_errors,
            bytes_discarded: sync.bytes_discarded,
        }
    }

    /// Framing diagnostics since the last call (bounded, oldest dropped).
    pub fn take_diagnostics(&mut self) -> Vec<FramingError> {
        self.sync.take_diagnostics()
    }

    fn finish(&mut self, raw: Vec<u8>) -> ParsedFrame {
        let (frame, issues) = inspect_frame(&self.protocol, raw);
        self.frames += 1;
        self.decode_errors += issues.decode_errors;
        if issues.checksum_mismatch {
            self.checksum_mismatches += 1;
        }
        if frame.valid {
            debug!(
                protocol = %self.protocol.name,
                len = frame.raw_data.len(),
                fields = frame.fields.len(),
                "frame decoded"
            );
        } else {
            self.invalid_frames += 1;
            warn!(
                protocol = %self.protocol.name,
                len = frame.raw_data.len(),
                error = frame.error.as_deref().unwrap_or_default(),
                "invalid frame"
            );
        }
        frame
    }
}

/// Frames produced by one [`FrameParser::feed`] call.
#[must_use = "frames are decoded lazily while iterating"]
pub struct Frames<'a> {
    parser: &'a mut FrameParser,
}

impl Iterator for Frames<'_> {
    type Item = ParsedFrame;

    fn next(&mut self) -> Option<ParsedFrame> {
        let raw = self.parser.sync.next_frame()?;
        Some(self.parser.finish(raw))
    }
}

/// Decode one complete frame (header through footer) without any stream
/// state.
///
/// # Examples
/// ```
/// use framekit_core::{ChecksumAlgorithm, FieldType, Protocol, ProtocolField, decode_frame};
///
/// let protocol = Protocol::new("p")
///     .with_checksum(ChecksumAlgorithm::Sum8)
///     .with_field(ProtocolField::new("a", FieldType::Uint8, 0))
///     .with_field(ProtocolField::new("b", FieldType::Uint8, 1));
///
/// assert!(decode_frame(&protocol, &[0x01, 0x02, 0x03]).valid);
/// let bad = decode_frame(&protocol, &[0x01, 0x02, 0x04]);
/// assert!(!bad.valid);
/// assert_eq!(bad.fields.len(), 2);
/// ```
pub fn decode_frame(protocol: &Protocol, data: &[u8]) -> ParsedFrame {
    inspect_frame(protocol, data.to_vec()).0
}

fn inspect_frame(protocol: &Protocol, raw: Vec<u8>) -> (ParsedFrame, FrameIssues) {
    let layout = FrameLayout::of(protocol);
    let mut issues = FrameIssues::default();
    let rejected = |raw: Vec<u8>, error: String| ParsedFrame {
        protocol_name: protocol.name.clone(),
        raw_data: raw,
        fields: vec![],
        valid: false,
        error: Some(error),
    };

    let min = layout.min_len();
    if raw.len() < min {
        let error = format!("insufficient data: frame has {} bytes, needs {min}", raw.len());
        return (rejected(raw, error), issues);
    }
    if !raw.starts_with(layout.header) {
        let error = format!("header mismatch: expected {}", hex_pairs(layout.header));
        return (rejected(raw, error), issues);
    }
    if !raw.ends_with(layout.footer) {
        let error = format!("footer mismatch: expected {}", hex_pairs(layout.footer));
        return (rejected(raw, error), issues);
    }

    let mut errors = Vec::new();
    let start = layout.header.len();
    let payload_end = match layout.payload {
        PayloadExtent::Fixed(len) => {
            if raw.len() != min {
                errors.push(format!(
                    "length mismatch: frame has {} bytes, expected {min}",
                    raw.len()
                ));
            }
            start + len
        }
        PayloadExtent::Open { .. } => raw.len() - layout.trailer_len(),
    };
    let payload = &raw[start..payload_end];

    let mut fields = Vec::with_capacity(protocol.fields.len());
    for field in &protocol.fields {
        match decode_field(payload, field) {
            Ok(parsed) => fields.push(parsed),
            Err(err) => {
                issues.decode_errors += 1;
                errors.push(err.to_string());
            }
        }
    }

    if let Some(algorithm) = layout.checksum {
        let received = &raw[payload_end..payload_end + algorithm.width()];
        if !checksum::validate(algorithm, payload, received) {
            issues.checksum_mismatch = true;
            errors.push(format!(
                "checksum mismatch ({algorithm}): computed {}, received {}",
                hex_pairs(&checksum::compute(algorithm, payload)),
                hex_pairs(received)
            ));
        }
    }

    let frame = ParsedFrame {
        protocol_name: protocol.name.clone(),
        raw_data: raw,
        fields,
        valid: errors.is_empty(),
        error: (!errors.is_empty()).then(|| errors.join("; ")),
    };
    (frame, issues)
}
