use thiserror::Error;

/// Errors produced by the archive and script cores.
///
/// Every variant maps to one of the error families from the error
/// taxonomy: IO, Format, Codec, or Validation. Warnings are not part of
/// this enum; see [`crate::diagnostic::Diagnostic`].
#[derive(Debug, Error)]
pub enum Error {
    /// Short read, write failure, or seek failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad magic, overlong entry, malformed directory, out-of-range offset.
    #[error("format error: {0}")]
    Format(String),

    /// LZSS overrun, truncated bitstream, or a cipher called with `block == 0`.
    #[error("codec error: {0}")]
    Codec(String),

    /// Unknown opcode, type mismatch, undefined label, duplicate sub name.
    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
