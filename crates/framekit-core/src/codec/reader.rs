use std::ops::Range;

use super::error::DecodeError;

/// Bounds-checked view over a payload on behalf of one field.
pub struct FieldReader<'a> {
    payload: &'a [u8],
    field: &'a str,
}

impl<'a> FieldReader<'a> {
    pub fn new(payload: &'a [u8], field: &'a str) -> Self {
        Self { payload, field }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn read_slice(&self, range: Range<usize>) -> Result<&'a [u8], DecodeError> {
        self.payload
            .get(range.clone())
            .ok_or_else(|| DecodeError::OutOfBounds {
                field: self.field.to_string(),
                start: range.start,
                end: range.end,
                actual: self.payload.len(),
            })
    }

    pub fn read_array<const N: usize>(&self, start: usize) -> Result<[u8; N], DecodeError> {
        let end = start.checked_add(N).ok_or_else(|| self.out_of_bounds(start, usize::MAX))?;
        let bytes = self.read_slice(start..end)?;
        bytes
            .try_into()
            .map_err(|_| self.out_of_bounds(start, end))
    }

    fn out_of_bounds(&self, start: usize, end: usize) -> DecodeError {
        DecodeError::OutOfBounds {
            field: self.field.to_string(),
            start,
            end,
            actual: self.payload.len(),
        }
    }
}
