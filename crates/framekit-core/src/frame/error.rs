use thiserror::Error;

/// Recoverable framing problems, reported as diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("header not found within {window} scanned bytes")]
    HeaderNotFound { window: usize },
    #[error("frame end not found within {limit} bytes")]
    FrameTooLong { limit: usize },
    #[error("footer mismatch at frame offset {offset}")]
    FooterMismatch { offset: usize },
    #[error("protocol describes an empty frame")]
    EmptyFrame,
}
