use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use crate::frame::{FrameParser, SyncConfig};
use crate::source::{ByteSource, SourceError, open_file_source};
use crate::{DecodeReport, Protocol, format_rfc3339, make_stub_report};

pub const DEFAULT_CHUNK_SIZE: usize = 256;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

/// Knobs for one stream decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    pub sync: SyncConfig,
    /// Read size used when the source is a file.
    pub chunk_size: usize,
    /// Keep decoded frames in the report; counters are always filled.
    pub keep_frames: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            keep_frames: true,
        }
    }
}

/// Decode a capture file (`.hex`/`.txt` text or raw binary).
pub fn decode_file(
    protocol: Arc<Protocol>,
    path: &Path,
    options: DecodeOptions,
) -> Result<DecodeReport, AnalysisError> {
    let metadata = path.metadata()?;
    let source = open_file_source(path, options.chunk_size)?;
    let mut report = decode_source(
        &path.display().to_string(),
        metadata.len(),
        protocol,
        source,
        options,
    )?;
    if let Some(generated_at) = metadata
        .modified()
        .ok()
        .map(OffsetDateTime::from)
        .and_then(format_rfc3339)
    {
        report.generated_at = generated_at;
    }
    Ok(report)
}

/// Drive one parser over `source` until it ends, then flush.
pub fn decode_source<S: ByteSource>(
    input_path: &str,
    input_bytes: u64,
    protocol: Arc<Protocol>,
    mut source: S,
    options: DecodeOptions,
) -> Result<DecodeReport, AnalysisError> {
    let mut report = make_stub_report(input_path, input_bytes, &protocol);
    let mut parser = FrameParser::with_config(protocol, options.sync);
    let keep = options.keep_frames;
    let summary = &mut report.summary;

    while let Some(chunk) = source.next_chunk()? {
        summary.chunks_total += 1;
        summary.bytes_total += chunk.len() as u64;
        let frames = parser.feed(&chunk);
        if keep {
            report.frames.extend(frames);
        } else {
            frames.for_each(drop);
        }
    }
    summary.bytes_pending = parser.pending() as u64;
    let trailing = parser.flush();
    if keep {
        report.frames.extend(trailing);
    }

    let stats = parser.stats();
    summary.frames_total = stats.frames;
    summary.frames_invalid = stats.invalid_frames;
    summary.frames_valid = stats.frames - stats.invalid_frames;
    summary.checksum_mismatches = stats.checksum_mismatches;
    summary.decode_errors = stats.decode_errors;
    summary.framing_errors = stats.framing_errors;
    summary.bytes_discarded = stats.bytes_discarded;

    report.diagnostics = parser
        .take_diagnostics()
        .iter()
        .map(ToString::to_string)
        .collect();
    debug!(
        input = input_path,
        frames = stats.frames,
        invalid = stats.invalid_frames,
        "stream decoded"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::ChecksumAlgorithm;
    use crate::source::HexTextSource;
    use crate::{FieldType, ProtocolField};

    fn protocol() -> Arc<Protocol> {
        Arc::new(
            Protocol::new("p")
                .with_header(vec![0xAA])
                .with_checksum(ChecksumAlgorithm::Xor8)
                .with_field(ProtocolField::new("v", FieldType::Uint8, 0)),
        )
    }

    #[test]
    fn summary_counts_stream() {
        // garbage, valid frame, corrupted frame, trailing partial frame
        let source = HexTextSource::from_text("00 AA 05 05 AA 06 00 AA", 2).unwrap();
        let report =
            decode_source("mem", 8, protocol(), source, DecodeOptions::default()).unwrap();
        let summary = &report.summary;
        assert_eq!(summary.chunks_total, 4);
        assert_eq!(summary.bytes_total, 8);
        assert_eq!(summary.frames_total, 2);
        assert_eq!(summary.frames_valid, 1);
        assert_eq!(summary.frames_invalid, 1);
        assert_eq!(summary.checksum_mismatches, 1);
        assert_eq!(summary.bytes_pending, 1);
        assert_eq!(summary.bytes_discarded, 2);
        assert_eq!(report.frames.len(), 2);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn keep_frames_false_drops_frames_only() {
        let source = HexTextSource::from_text("AA 05 05 AA 06 00 AA 07 07", 2).unwrap();
        let options = DecodeOptions {
            keep_frames: false,
            ..DecodeOptions::default()
        };
        let report = decode_source("mem", 9, protocol(), source, options).unwrap();
        assert!(report.frames.is_empty());
        assert_eq!(report.summary.chunks_total, 5);
        assert_eq!(report.summary.frames_valid, 2);
        assert_eq!(report.summary.frames_invalid, 1);
        assert_eq!(report.summary.bytes_pending, 0);
    }
}
