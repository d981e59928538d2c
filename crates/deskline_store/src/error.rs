//! Error types for store operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
///
/// Every variant is fatal to the triggering call: the store never reports
/// success without durable persistence, so a failed `put` means the record
/// was NOT committed.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred while journaling.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The journal contains an undecodable frame.
    #[error("corrupt journal at offset {offset}: {reason}")]
    CorruptJournal {
        /// Byte offset of the offending frame.
        offset: u64,
        /// Description of the corruption.
        reason: String,
    },

    /// A frame payload failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(String),

    /// Another process holds the store directory lock.
    #[error("store locked: another process has exclusive access to {path}")]
    Locked {
        /// The store directory.
        path: PathBuf,
    },
}

impl StoreError {
    /// Creates a corrupt-journal error.
    pub fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        Self::CorruptJournal {
            offset,
            reason: reason.into(),
        }
    }

    /// Creates a codec error from any displayable source.
    pub fn codec(err: impl std::fmt::Display) -> Self {
        Self::Codec(err.to_string())
    }
}
