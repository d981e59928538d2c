//! Error types for wire encoding and decoding.

use thiserror::Error;

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors that can occur while encoding or decoding wire payloads.
///
/// A decode failure marks a malformed packet: the receiver rejects it
/// whole and relies on the next full reconciliation to self-heal. Nothing
/// is ever partially applied from a malformed payload.
#[derive(Debug, Error)]
pub enum WireError {
    /// A payload failed to encode.
    #[error("encode error: {0}")]
    Encode(String),

    /// A payload failed to decode.
    #[error("malformed payload: {0}")]
    Decode(String),

    /// The payload decoded but carried an unknown status code.
    #[error("unknown status code {0}")]
    UnknownStatus(u8),
}

impl WireError {
    /// Creates an encode error from any displayable source.
    pub fn encode(err: impl std::fmt::Display) -> Self {
        Self::Encode(err.to_string())
    }

    /// Creates a decode error from any displayable source.
    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert!(WireError::decode("truncated").to_string().contains("malformed"));
        assert!(WireError::UnknownStatus(9).to_string().contains('9'));
    }
}
