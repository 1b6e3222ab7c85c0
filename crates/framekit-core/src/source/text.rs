use std::path::Path;

use super::{ByteSource, SourceError};

/// Hex text capture: byte pairs separated by any whitespace, `#` starts a
/// comment that runs to the end of the line.
pub struct HexTextSource {
    bytes: Vec<u8>,
    position: usize,
    chunk_size: usize,
}

impl HexTextSource {
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self, SourceError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_text(&text, chunk_size)
    }

    pub fn from_text(text: &str, chunk_size: usize) -> Result<Self, SourceError> {
        let mut bytes = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let content = line.split('#').next().unwrap_or_default();
            let digits: String = content.split_whitespace().collect();
            let decoded = hex::decode(&digits).map_err(|err| SourceError::Hex {
                line: index + 1,
                message: err.to_string(),
            })?;
            bytes.extend(decoded);
        }
        Ok(Self {
            bytes,
            position: 0,
            chunk_size: chunk_size.max(1),
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl ByteSource for HexTextSource {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        if self.position >= self.bytes.len() {
            return Ok(None);
        }
        let end = (self.position + self.chunk_size).min(self.bytes.len());
        let chunk = self.bytes[self.position..end].to_vec();
        self.position = end;
        Ok(Some(chunk))
    }
}
