//! Byte sources feeding a [`FrameParser`](crate::FrameParser).
//!
//! Sources only deliver chunks; chunk boundaries are arbitrary and may split
//! frames. The parser's `feed` stays the only place the carryover buffer
//! changes.

mod channel;
mod file;
mod text;

use std::path::Path;

use thiserror::Error;

pub use channel::{ChannelSource, ChunkSender, chunk_channel};
pub use file::FileSource;
pub use text::HexTextSource;

pub trait ByteSource {
    /// Next chunk, `None` at end of input.
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, SourceError>;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        (**self).next_chunk()
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("hex capture line {line}: {message}")]
    Hex { line: usize, message: String },
    #[error("chunk channel closed")]
    Closed,
}

/// Open a capture file: `.hex`/`.txt` are hex text, anything else is raw
/// binary.
pub fn open_file_source(
    path: &Path,
    chunk_size: usize,
) -> Result<Box<dyn ByteSource>, SourceError> {
    let is_text = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("hex") || ext.eq_ignore_ascii_case("txt"));
    if is_text {
        Ok(Box::new(HexTextSource::open(path, chunk_size)?))
    } else {
        Ok(Box::new(FileSource::open(path, chunk_size)?))
    }
}
