//! Field codec.
//!
//! Decodes and encodes one typed field against a payload slice. Offsets are
//! relative to the payload region (the bytes between header and checksum).
//! The layering follows the rest of the crate:
//! - `reader` / `writer`: bounds-checked byte access, no indexing elsewhere
//! - `decode` / `encode`: type table, byte order, value rendering
//! - `value`: typed values handed in by command collaborators
//! - `error`: explicit, actionable errors
//!
//! Decoding never reads outside the buffer: every out-of-range offset is a
//! [`DecodeError`]. Encoding checks the value against the field width before
//! touching the output.

pub mod decode;
pub mod encode;
pub mod error;
pub mod reader;
pub mod value;
pub mod writer;

pub use decode::{decode_field, decode_value, render_value};
pub use encode::{encode_field, encode_value};
pub use error::{DecodeError, EncodeError};
pub use value::{FieldValue, FieldValues};

/// Uppercase hex pairs separated by single spaces (`"0A FF 10"`).
pub fn hex_pairs(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
