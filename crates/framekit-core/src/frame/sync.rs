//! Frame synchronizer.
//!
//! Owns the carryover buffer of one stream and cuts complete frames out of
//! it. States: `Scanning` (looking for the header at the buffer head),
//! `Accumulating` (aligned, waiting for the frame end), `Emit` (a frame
//! boundary is known). After a frame is handed out the synchronizer goes
//! back to `Scanning`.
//!
//! Memory is bounded: while scanning, at most `header.len() - 1` bytes are
//! kept, and an aligned candidate longer than the frame limit is abandoned.
//! A layout that describes an empty frame or one above `MAX_FRAME_SIZE`
//! drops its input.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::error::FramingError;
use super::find;
use super::layout::{
    DEFAULT_MAX_FRAME_LEN, DEFAULT_MAX_SCAN_WINDOW, FrameLayout, MAX_DIAGNOSTICS, MAX_FRAME_SIZE,
    PayloadExtent,
};
use crate::Protocol;

/// Bounds applied while synchronizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Garbage bytes discarded before a `HeaderNotFound` diagnostic.
    pub max_scan_window: usize,
    /// Longest candidate kept while its end is unknown. A protocol whose
    /// minimum frame is larger raises the bound to that size.
    pub max_frame_len: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_scan_window: DEFAULT_MAX_SCAN_WINDOW,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Scanning,
    Accumulating,
    Emit { len: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub bytes_discarded: u64,
    pub framing_errors: u64,
}

enum Boundary {
    Pending,
    At(usize),
    Abandon(FramingError),
    /// The layout can never produce a frame; all carryover is dropped.
    Reject(FramingError),
}

pub struct FrameSynchronizer {
    protocol: Arc<Protocol>,
    config: SyncConfig,
    buffer: Vec<u8>,
    state: SyncState,
    scanned: usize,
    stats: SyncStats,
    diagnostics: VecDeque<FramingError>,
}

impl FrameSynchronizer {
    pub fn new(protocol: Arc<Protocol>, config: SyncConfig) -> Self {
        Self {
            protocol,
            config,
            buffer: Vec::new(),
            state: SyncState::Scanning,
            scanned: 0,
            stats: SyncStats::default(),
            diagnostics: VecDeque::new(),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Carryover bytes not yet consumed by a frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    pub fn config(&self) -> SyncConfig {
        self.config
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        trace!(added = bytes.len(), pending = self.buffer.len(), "carryover extended");
    }

    /// Next complete frame in boundary order, `None` when more bytes are
    /// needed.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let protocol = Arc::clone(&self.protocol);
        let layout = FrameLayout::of(&protocol);
        loop {
            match self.state {
                SyncState::Scanning => {
                    if !self.align(layout.header) {
                        return None;
                    }
                    self.state = SyncState::Accumulating;
                }
                SyncState::Accumulating => match self.boundary(&layout) {
                    Boundary::Pending => return None,
                    Boundary::At(len) => self.state = SyncState::Emit { len },
                    Boundary::Abandon(err) => {
                        self.record(err);
                        let drop = layout.header.len().max(1).min(self.buffer.len());
                        self.discard(drop);
                        self.state = SyncState::Scanning;
                    }
                    Boundary::Reject(err) => {
                        self.record(err);
                        self.discard(self.buffer.len());
                        self.state = SyncState::Scanning;
                        return None;
                    }
                },
                SyncState::Emit { len } => {
                    let frame: Vec<u8> = self.buffer.drain(..len).collect();
                    self.state = SyncState::Scanning;
                    debug!(
                        protocol = %protocol.name,
                        len,
                        pending = self.buffer.len(),
                        "frame boundary"
                    );
                    return Some(frame);
                }
            }
        }
    }

    /// End of stream: hand out a trailing open-ended frame if one is
    /// aligned and long enough, discard everything else.
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        let protocol = Arc::clone(&self.protocol);
        let layout = FrameLayout::of(&protocol);
        let aligned = self.state != SyncState::Scanning || self.align(layout.header);
        let open_tail = matches!(layout.payload, PayloadExtent::Open { .. })
            && layout.footer.is_empty();
        let residual = std::mem::take(&mut self.buffer);
        self.state = SyncState::Scanning;
        if aligned && open_tail && !residual.is_empty() && residual.len() >= layout.min_len() {
            debug!(protocol = %protocol.name, len = residual.len(), "trailing frame flushed");
            return Some(residual);
        }
        if !residual.is_empty() {
            self.stats.bytes_discarded += residual.len() as u64;
            debug!(
                protocol = %protocol.name,
                discarded = residual.len(),
                "incomplete carryover dropped"
            );
        }
        None
    }

    /// Drop carryover, counters and diagnostics.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = SyncState::Scanning;
        self.scanned = 0;
        self.stats = SyncStats::default();
        self.diagnostics.clear();
    }

    /// Framing diagnostics recorded since the last call, oldest first.
    pub fn take_diagnostics(&mut self) -> Vec<FramingError> {
        self.diagnostics.drain(..).collect()
    }

    /// Bring the header to the buffer head. Returns false when no header is
    /// present yet; only a possible header prefix is kept.
    fn align(&mut self, header: &[u8]) -> bool {
        if header.is_empty() {
            return true;
        }
        if let Some(pos) = find(&self.buffer, header) {
            self.discard(pos);
            self.scanned = 0;
            return true;
        }
        let keep = (1..header.len())
            .rev()
            .find(|&n| self.buffer.ends_with(&header[..n]))
            .unwrap_or(0);
        self.discard(self.buffer.len() - keep);
        false
    }

    fn boundary(&self, layout: &FrameLayout<'_>) -> Boundary {
        let len = self.buffer.len();
        if layout.is_degenerate() {
            return match (len, layout.fixed_len()) {
                (0, _) => Boundary::Pending,
                (_, Some(0)) => Boundary::Reject(FramingError::EmptyFrame),
                _ => Boundary::Reject(FramingError::FrameTooLong {
                    limit: MAX_FRAME_SIZE,
                }),
            };
        }
        let limit = self.config.max_frame_len.max(layout.min_len());
        if let Some(frame_len) = layout.fixed_len() {
            if len < frame_len {
                return Boundary::Pending;
            }
            let footer = layout.footer;
            if !footer.is_empty() && &self.buffer[frame_len - footer.len()..frame_len] != footer {
                return Boundary::Abandon(FramingError::FooterMismatch {
                    offset: frame_len - footer.len(),
                });
            }
            return Boundary::At(frame_len);
        }

        let min = layout.min_len();
        let end = if !layout.footer.is_empty() {
            let from = min - layout.footer.len();
            self.buffer
                .get(from..)
                .and_then(|rest| find(rest, layout.footer))
                .map(|pos| from + pos + layout.footer.len())
        } else if !layout.header.is_empty() {
            let from = min.max(layout.header.len());
            self.buffer
                .get(from..)
                .and_then(|rest| find(rest, layout.header))
                .map(|pos| from + pos)
        } else if len >= min && len > 0 {
            Some(len)
        } else {
            None
        };
        match end {
            Some(end) if end <= limit => Boundary::At(end),
            Some(_) => Boundary::Abandon(FramingError::FrameTooLong { limit }),
            None if len > limit => Boundary::Abandon(FramingError::FrameTooLong { limit }),
            None => Boundary::Pending,
        }
    }

    fn discard(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        self.buffer.drain(..count);
        self.stats.bytes_discarded += count as u64;
        self.scanned += count;
        let window = self.config.max_scan_window.max(1);
        while self.scanned >= window {
            self.scanned -= window;
            self.record(FramingError::HeaderNotFound { window });
        }
    }

    fn record(&mut self, err: FramingError) {
        warn!(protocol = %self.protocol.name, error = %err, "framing error");
        self.stats.framing_errors += 1;
        if self.diagnostics.len() == MAX_DIAGNOSTICS {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::ChecksumAlgorithm;
    use crate::{FieldType, ProtocolField};

    fn sync(protocol: Protocol) -> FrameSynchronizer {
        FrameSynchronizer::new(Arc::new(protocol), SyncConfig::default())
    }

    fn drain(sync: &mut FrameSynchronizer) -> Vec<Vec<u8>> {
        std::iter::from_fn(|| sync.next_frame()).collect()
    }

    fn header_fixed() -> Protocol {
        Protocol::new("p")
            .with_header(vec![0xAA, 0x55])
            .with_field(ProtocolField::new("v", FieldType::Uint16, 0))
    }

    #[test]
    fn fixed_frames_after_header() {
        let mut s = sync(header_fixed());
        s.extend(&[0x01, 0xAA, 0x55, 0x00, 0x01, 0xAA, 0x55, 0x00]);
        assert_eq!(drain(&mut s), vec![vec![0xAA, 0x55, 0x00, 0x01]]);
        assert_eq!(s.state(), SyncState::Accumulating);
        assert_eq!(s.pending(), 3);
        s.extend(&[0x02]);
        assert_eq!(drain(&mut s), vec![vec![0xAA, 0x55, 0x00, 0x02]]);
        assert_eq!(s.stats().bytes_discarded, 1);
    }

    #[test]
    fn header_split_across_chunks() {
        let mut s = sync(header_fixed());
        s.extend(&[0x10, 0x20, 0xAA]);
        assert!(s.next_frame().is_none());
        assert_eq!(s.pending(), 1);
        s.extend(&[0x55, 0x12, 0x34]);
        assert_eq!(drain(&mut s), vec![vec![0xAA, 0x55, 0x12, 0x34]]);
    }

    #[test]
    fn garbage_is_bounded_and_reported_per_window() {
        let config = SyncConfig {
            max_scan_window: 16,
            max_frame_len: 64,
        };
        let mut s = FrameSynchronizer::new(Arc::new(header_fixed()), config);
        s.extend(&[0x00; 40]);
        assert!(s.next_frame().is_none());
        assert_eq!(s.pending(), 0);
        assert_eq!(s.stats().bytes_discarded, 40);
        assert_eq!(
            s.take_diagnostics(),
            vec![FramingError::HeaderNotFound { window: 16 }; 2]
        );
        assert!(s.take_diagnostics().is_empty());
    }

    #[test]
    fn footer_mismatch_abandons_candidate() {
        let protocol = Protocol::new("p")
            .with_header(vec![0xAA])
            .with_footer(vec![0x0D])
            .with_field(ProtocolField::new("v", FieldType::Uint8, 0));
        let mut s = sync(protocol);
        s.extend(&[0xAA, 0x01, 0xFF, 0xAA, 0x02, 0x0D]);
        assert_eq!(drain(&mut s), vec![vec![0xAA, 0x02, 0x0D]]);
        assert_eq!(
            s.take_diagnostics(),
            vec![FramingError::FooterMismatch { offset: 2 }]
        );
    }

    #[test]
    fn open_payload_ends_at_footer() {
        let protocol = Protocol::new("p")
            .with_header(vec![0x02])
            .with_footer(vec![0x03])
            .with_checksum(ChecksumAlgorithm::Xor8)
            .with_field(ProtocolField::new("text", FieldType::String, 0));
        let mut s = sync(protocol);
        s.extend(&[0x02, b'h', b'i', 0x01, 0x03, 0x02]);
        assert_eq!(drain(&mut s), vec![vec![0x02, b'h', b'i', 0x01, 0x03]]);
        assert_eq!(s.pending(), 1);
    }

    #[test]
    fn open_payload_without_footer_waits_for_next_header() {
        let protocol = Protocol::new("p")
            .with_header(vec![0x7E])
            .with_field(ProtocolField::new("data", FieldType::Bytes, 0));
        let mut s = sync(protocol);
        s.extend(&[0x7E, 1, 2, 0x7E, 3]);
        assert_eq!(drain(&mut s), vec![vec![0x7E, 1, 2]]);
        assert_eq!(s.flush(), Some(vec![0x7E, 3]));
        assert_eq!(s.pending(), 0);
    }

    #[test]
    fn no_delimiters_fixed_size_chunks() {
        let protocol = Protocol::new("p")
            .with_field(ProtocolField::new("a", FieldType::Uint8, 0))
            .with_field(ProtocolField::new("b", FieldType::Uint8, 1));
        let mut s = sync(protocol);
        s.extend(&[1, 2, 3, 4, 5]);
        assert_eq!(drain(&mut s), vec![vec![1, 2], vec![3, 4]]);
        assert_eq!(s.flush(), None);
        assert_eq!(s.stats().bytes_discarded, 1);
    }

    #[test]
    fn no_delimiters_open_consumes_whole_buffer() {
        let protocol = Protocol::new("p")
            .with_field(ProtocolField::new("id", FieldType::Uint8, 0))
            .with_field(ProtocolField::new("rest", FieldType::Hex, 1));
        let mut s = sync(protocol);
        s.extend(&[9]);
        assert_eq!(drain(&mut s), vec![vec![9]]);
        s.extend(&[1, 2, 3]);
        assert_eq!(drain(&mut s), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn unterminated_candidate_is_abandoned() {
        let protocol = Protocol::new("p")
            .with_header(vec![0xAA])
            .with_footer(vec![0x0D])
            .with_field(ProtocolField::new("data", FieldType::Bytes, 0));
        let config = SyncConfig {
            max_scan_window: 4096,
            max_frame_len: 8,
        };
        let mut s = FrameSynchronizer::new(Arc::new(protocol), config);
        s.extend(&[0xAA; 9]);
        assert!(drain(&mut s).is_empty());
        assert!(s.pending() <= 8);
        assert!(
            s.take_diagnostics()
                .contains(&FramingError::FrameTooLong { limit: 8 })
        );
    }

    #[test]
    fn empty_layout_drops_input() {
        let mut s = sync(Protocol::new("empty"));
        for _ in 0..64 {
            s.extend(&[0x42; 1024]);
            assert!(drain(&mut s).is_empty());
            assert_eq!(s.pending(), 0);
        }
        assert_eq!(s.stats().bytes_discarded, 64 * 1024);
        assert!(s.take_diagnostics().contains(&FramingError::EmptyFrame));
    }

    #[test]
    fn oversized_layout_drops_input_without_overflow() {
        let protocol = Protocol::new("huge")
            .with_header(vec![0xAA])
            .with_field(ProtocolField::new("blob", FieldType::Bytes, 0).with_length(usize::MAX));
        let mut s = sync(protocol);
        s.extend(&[0xAA, 1, 2]);
        assert!(drain(&mut s).is_empty());
        assert_eq!(s.pending(), 0);
        assert_eq!(
            s.take_diagnostics(),
            vec![FramingError::FrameTooLong {
                limit: MAX_FRAME_SIZE
            }]
        );
        assert_eq!(s.flush(), None);
    }

    #[test]
    fn reset_clears_everything() {
        let mut s = sync(header_fixed());
        s.extend(&[0x00, 0xAA, 0x55, 0x01]);
        assert!(s.next_frame().is_none());
        s.reset();
        assert_eq!(s.pending(), 0);
        assert_eq!(s.state(), SyncState::Scanning);
        assert_eq!(s.stats(), SyncStats::default());
    }
}
