use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::{ByteSource, SourceError};

/// Raw binary capture read in fixed-size chunks.
pub struct FileSource<R = BufReader<File>> {
    reader: R,
    chunk_size: usize,
}

impl FileSource {
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file), chunk_size))
    }
}

impl<R: Read> FileSource<R> {
    pub fn from_reader(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
        }
    }
}

impl<R: Read> ByteSource for FileSource<R> {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        let mut chunk = Vec::with_capacity(self.chunk_size);
        (&mut self.reader)
            .take(self.chunk_size as u64)
            .read_to_end(&mut chunk)?;
        if chunk.is_empty() {
            return Ok(None);
        }
        Ok(Some(chunk))
    }
}
