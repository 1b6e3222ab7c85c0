use super::error::EncodeError;

/// Bounds-checked writes into an output payload on behalf of one field.
pub struct FieldWriter<'a> {
    out: &'a mut [u8],
    field: &'a str,
}

impl<'a> FieldWriter<'a> {
    pub fn new(out: &'a mut [u8], field: &'a str) -> Self {
        Self { out, field }
    }

    pub fn write(&mut self, start: usize, bytes: &[u8]) -> Result<(), EncodeError> {
        let actual = self.out.len();
        let end = start.checked_add(bytes.len());
        match end.and_then(|end| self.out.get_mut(start..end)) {
            Some(slot) => {
                slot.copy_from_slice(bytes);
                Ok(())
            }
            None => Err(EncodeError::OutOfBounds {
                field: self.field.to_string(),
                end: end.unwrap_or(usize::MAX),
                actual,
            }),
        }
    }
}
