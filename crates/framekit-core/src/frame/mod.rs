//! Frame layer: boundary detection, frame decoding, frame building.
//!
//! Wire layout of one frame:
//! ```text
//! [header] [payload: fields at their offsets] [checksum] [footer]
//! ```
//! The checksum covers the payload only. `layout` derives sizes from a
//! [`Protocol`](crate::Protocol), `sync` cuts frames out of a byte stream,
//! `parser` decodes them and `encoder` builds them.

pub mod encoder;
pub mod error;
pub mod layout;
pub mod parser;
pub mod sync;

pub use encoder::{FrameEncoder, encode};
pub use error::FramingError;
pub use layout::{FrameLayout, MAX_FRAME_SIZE, PayloadExtent};
pub use parser::{FrameParser, Frames, ParserStats, decode_frame};
pub use sync::{FrameSynchronizer, SyncConfig, SyncState, SyncStats};

/// Position of the first occurrence of `needle` in `haystack`.
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
