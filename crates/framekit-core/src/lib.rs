//! framekit core library for protocol-driven binary frame decoding.
//!
//! A user-authored [`Protocol`] describes how a byte stream coming off a
//! hardware link is cut into frames (optional header/footer byte sequences,
//! optional checksum) and which typed fields live at which payload offsets.
//! The crate turns raw chunks into [`ParsedFrame`]s and builds outgoing
//! frames from typed field values:
//! - `checksum`: checksum/CRC engine (sum8, sum16, xor8, crc8, crc16, crc32)
//! - `codec`: per-field decode/encode over a payload slice
//! - `frame`: synchronizer (boundaries, carryover), parser, encoder
//! - `validate`: structural checks run before a protocol is used
//!
//! Decoding and encoding are pure and synchronous; the only I/O lives in
//! `source` (capture files, bounded in-process channel). A [`FrameParser`]
//! owns its carryover buffer and is driven by exactly one stream.
//!
//! Invariants:
//! - Frames are emitted in the order their closing boundary appears.
//! - A checksum mismatch or a field decode error never drops a frame; the
//!   frame is emitted with `valid = false` and an error description.
//! - Garbage between frames is discarded; memory stays bounded by the
//!   configured scan window and maximum frame length.
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//!
//! use framekit_core::{
//!     ChecksumAlgorithm, FieldType, FieldValues, FrameParser, Protocol, ProtocolField, encode,
//! };
//!
//! let protocol = Protocol::new("telemetry")
//!     .with_header(vec![0xAA, 0x55])
//!     .with_checksum(ChecksumAlgorithm::Sum8)
//!     .with_field(ProtocolField::new("speed", FieldType::Uint16, 0));
//!
//! let mut values = FieldValues::new();
//! values.insert("speed".to_string(), 1200u16.into());
//! let bytes = encode(&protocol, &values)?;
//!
//! let mut parser = FrameParser::new(Arc::new(protocol));
//! let frames: Vec<_> = parser.feed(&bytes).collect();
//! assert_eq!(frames.len(), 1);
//! assert!(frames[0].valid);
//! assert_eq!(frames[0].fields[0].value, "1200");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

mod analysis;
pub mod checksum;
pub mod codec;
pub mod frame;
mod registry;
pub mod source;
pub mod validate;

pub use analysis::{AnalysisError, DEFAULT_CHUNK_SIZE, DecodeOptions, decode_file, decode_source};
pub use checksum::{ChecksumAlgorithm, UnknownAlgorithm};
pub use codec::{
    DecodeError, EncodeError, FieldValue, FieldValues, decode_field, decode_value, encode_field,
};
pub use frame::{
    FrameEncoder, FrameParser, FramingError, MAX_FRAME_SIZE, ParserStats, SyncConfig, decode_frame,
    encode,
};
pub use registry::{ProtocolRegistry, RegistryError};
pub use source::{ByteSource, SourceError};
pub use validate::{ValidationError, validate};

/// Current report schema version.
pub const REPORT_VERSION: u32 = 1;
/// Default timestamp used when no input time is available.
pub const DEFAULT_GENERATED_AT: &str = "1970-01-01T00:00:00Z";

/// Field type table. Fixed-width numeric types carry their own size;
/// `string`, `bytes` and `hex` take it from [`ProtocolField::length`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Bytes,
    Hex,
}

impl FieldType {
    /// Byte width of fixed-width types, `None` for variable-length ones.
    ///
    /// # Examples
    /// ```
    /// use framekit_core::FieldType;
    ///
    /// assert_eq!(FieldType::Int32.size(), Some(4));
    /// assert_eq!(FieldType::Hex.size(), None);
    /// ```
    pub fn size(self) -> Option<usize> {
        match self {
            FieldType::Uint8 | FieldType::Int8 => Some(1),
            FieldType::Uint16 | FieldType::Int16 => Some(2),
            FieldType::Uint32 | FieldType::Int32 | FieldType::Float32 => Some(4),
            FieldType::Uint64 | FieldType::Int64 | FieldType::Float64 => Some(8),
            FieldType::String | FieldType::Bytes | FieldType::Hex => None,
        }
    }

    pub fn is_variable(self) -> bool {
        self.size().is_none()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Uint8 => "uint8",
            FieldType::Uint16 => "uint16",
            FieldType::Uint32 => "uint32",
            FieldType::Uint64 => "uint64",
            FieldType::Int8 => "int8",
            FieldType::Int16 => "int16",
            FieldType::Int32 => "int32",
            FieldType::Int64 => "int64",
            FieldType::Float32 => "float32",
            FieldType::Float64 => "float64",
            FieldType::String => "string",
            FieldType::Bytes => "bytes",
            FieldType::Hex => "hex",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte order of multi-byte numeric fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ByteOrder {
    #[default]
    BigEndian,
    LittleEndian,
}

/// One named, typed field of a protocol payload.
///
/// `offset` is relative to the first byte after the header. It is signed so
/// that a malformed description can be reported by [`validate()`] rather than
/// rejected during deserialization.
///
/// # Examples
/// ```
/// use framekit_core::{ByteOrder, FieldType, ProtocolField};
///
/// let field = ProtocolField::new("label", FieldType::String, 4)
///     .with_length(8)
///     .with_byte_order(ByteOrder::LittleEndian);
/// assert_eq!(field.size(), Some(8));
/// assert_eq!(field.end(), Some(12));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolField {
    /// Unique, non-empty name within the protocol.
    pub name: String,
    pub field_type: FieldType,
    /// Byte offset inside the payload region.
    pub offset: i64,
    /// Length for `string`/`bytes`/`hex`; ignored for numeric types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    #[serde(default)]
    pub byte_order: ByteOrder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Display hint only.
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl ProtocolField {
    pub fn new(name: &str, field_type: FieldType, offset: i64) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            offset,
            length: None,
            byte_order: ByteOrder::default(),
            description: None,
            visible: true,
        }
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Effective size in bytes: the type width, or the declared length.
    pub fn size(&self) -> Option<usize> {
        self.field_type.size().or(self.length)
    }

    /// Exclusive end offset, `None` when the offset is negative or the size
    /// is unresolved.
    pub fn end(&self) -> Option<usize> {
        let start = usize::try_from(self.offset).ok()?;
        start.checked_add(self.size()?)
    }
}

/// Protocol description: framing bytes, ordered fields, checksum selector.
///
/// The persistence collaborator owns the canonical copy; parsers and
/// encoders borrow an immutable snapshot (usually behind an `Arc`).
///
/// # Examples
/// ```
/// use framekit_core::{ChecksumAlgorithm, FieldType, Protocol, ProtocolField};
///
/// let protocol = Protocol::new("pump")
///     .with_header(vec![0x7E])
///     .with_footer(vec![0x7F])
///     .with_checksum(ChecksumAlgorithm::Crc16)
///     .with_field(ProtocolField::new("rpm", FieldType::Uint16, 0))
///     .with_field(ProtocolField::new("flags", FieldType::Uint8, 2));
/// assert_eq!(protocol.fixed_frame_length(), Some(1 + 3 + 2 + 1));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Byte sequence marking the start of a frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<Vec<u8>>,
    /// Byte sequence marking the end of a frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<Vec<u8>>,
    #[serde(default)]
    pub fields: Vec<ProtocolField>,
    #[serde(
        default,
        deserialize_with = "checksum::deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub checksum: Option<ChecksumAlgorithm>,
    /// Declared payload region size; defaults to the maximum field extent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_length: Option<usize>,
    /// Creation time in Unix milliseconds.
    #[serde(default)]
    pub created_at: i64,
    /// Last update time in Unix milliseconds.
    #[serde(default)]
    pub updated_at: i64,
}

impl Protocol {
    pub fn new(name: &str) -> Self {
        let now = unix_millis_now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: None,
            header: None,
            footer: None,
            fields: Vec::new(),
            checksum: None,
            payload_length: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Parse a protocol description from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_header(mut self, header: Vec<u8>) -> Self {
        self.header = Some(header);
        self
    }

    pub fn with_footer(mut self, footer: Vec<u8>) -> Self {
        self.footer = Some(footer);
        self
    }

    pub fn with_checksum(mut self, algorithm: ChecksumAlgorithm) -> Self {
        self.checksum = Some(algorithm);
        self
    }

    pub fn with_payload_length(mut self, length: usize) -> Self {
        self.payload_length = Some(length);
        self
    }

    pub fn with_field(mut self, field: ProtocolField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn add_field(&mut self, field: ProtocolField) {
        self.fields.push(field);
        self.updated_at = unix_millis_now();
    }

    pub fn field(&self, name: &str) -> Option<&ProtocolField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn header_bytes(&self) -> &[u8] {
        self.header.as_deref().unwrap_or_default()
    }

    pub fn footer_bytes(&self) -> &[u8] {
        self.footer.as_deref().unwrap_or_default()
    }

    /// Smallest number of bytes a complete frame can occupy.
    pub fn min_frame_length(&self) -> usize {
        frame::FrameLayout::of(self).min_len()
    }

    /// Exact frame length when every field size is known.
    pub fn fixed_frame_length(&self) -> Option<usize> {
        frame::FrameLayout::of(self).fixed_len()
    }
}

/// One decoded field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedField {
    pub name: String,
    pub field_type: FieldType,
    /// Exact sub-slice consumed by the field.
    pub raw_bytes: Vec<u8>,
    /// Rendered value.
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One synchronized frame, valid or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedFrame {
    pub protocol_name: String,
    /// Entire frame including header, checksum and footer.
    pub raw_data: Vec<u8>,
    /// Fields that decoded successfully, in protocol order.
    pub fields: Vec<ParsedField>,
    /// True when the checksum matched and every field decoded.
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Stream decode report with deterministic ordering.
///
/// # Examples
/// ```
/// use framekit_core::{Protocol, make_stub_report};
///
/// let protocol = Protocol::new("telemetry");
/// let report = make_stub_report("capture.bin", 64, &protocol);
/// assert_eq!(report.report_version, framekit_core::REPORT_VERSION);
/// assert!(report.frames.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeReport {
    /// Report schema version (not the binary version).
    pub report_version: u32,
    pub tool: ToolInfo,
    /// RFC3339 timestamp; the input's modification time when known.
    pub generated_at: String,
    pub input: InputInfo,
    pub protocol: ProtocolInfo,
    pub summary: StreamSummary,
    /// Recent framing diagnostics, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
    /// Emitted frames in stream order.
    pub frames: Vec<ParsedFrame>,
}

/// Tool metadata embedded in reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

/// Input metadata embedded in reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputInfo {
    /// Input path as provided to the decoder.
    pub path: String,
    /// Input size in bytes.
    pub bytes: u64,
}

/// Protocol identification embedded in reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolInfo {
    pub id: String,
    pub name: String,
}

/// Stream-level counters.
///
/// # Examples
/// ```
/// use framekit_core::StreamSummary;
///
/// let summary = StreamSummary::default();
/// assert_eq!(summary.frames_total, 0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSummary {
    pub chunks_total: u64,
    pub bytes_total: u64,
    pub frames_total: u64,
    pub frames_valid: u64,
    pub frames_invalid: u64,
    pub checksum_mismatches: u64,
    pub decode_errors: u64,
    pub framing_errors: u64,
    /// Bytes dropped while resynchronizing or abandoning candidates.
    pub bytes_discarded: u64,
    /// Bytes still buffered when the input ended.
    pub bytes_pending: u64,
}

/// Build a stub report with base fields filled and empty aggregates.
pub fn make_stub_report(input_path: &str, input_bytes: u64, protocol: &Protocol) -> DecodeReport {
    DecodeReport {
        report_version: REPORT_VERSION,
        tool: ToolInfo {
            name: "framekit".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        generated_at: DEFAULT_GENERATED_AT.to_string(),
        input: InputInfo {
            path: input_path.to_string(),
            bytes: input_bytes,
        },
        protocol: ProtocolInfo {
            id: protocol.id.clone(),
            name: protocol.name.clone(),
        },
        summary: StreamSummary::default(),
        diagnostics: vec![],
        frames: vec![],
    }
}

pub(crate) fn unix_millis_now() -> i64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
}

pub(crate) fn format_rfc3339(ts: OffsetDateTime) -> Option<String> {
    ts.format(&Rfc3339).ok()
}
