//! Error types for the sync engine.

use deskline_protocol::WireError;
use deskline_store::{RecordId, StoreError};
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A transport operation exceeded its timeout. Retryable within a
    /// handshake step's bounded retry budget.
    #[error("transport operation timed out")]
    Timeout,

    /// The link is down. Aborts the current handshake; work resumes on
    /// the next reconnect.
    #[error("transport disconnected")]
    Disconnected,

    /// A link-loss signal cancelled in-flight handshake work.
    #[error("handshake cancelled")]
    Cancelled,

    /// Fulfillment was attempted on an unknown record.
    #[error("record not found: {id}")]
    NotFound {
        /// The id that was not found.
        id: RecordId,
    },

    /// The operation is not available to this device role.
    #[error("role {role:?} cannot {action}")]
    RoleViolation {
        /// The engine's configured role.
        role: crate::config::Role,
        /// The attempted action.
        action: &'static str,
    },

    /// The peer sent something structurally valid but semantically wrong.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A malformed payload was rejected.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// A store durability failure. Always fatal to the triggering call.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Returns true if this error may be retried within a handshake
    /// step's retry budget.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Timeout)
    }

    /// Returns true if this error must propagate to the caller rather
    /// than be absorbed by the reconnect machinery.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Store(_) | EngineError::NotFound { .. })
    }
}
