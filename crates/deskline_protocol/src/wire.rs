//! Wire representation of a record.

use crate::error::{WireError, WireResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireStatus {
    /// Submitted, awaiting fulfillment.
    Sent,
    /// Fulfilled by the authority.
    Fulfilled,
}

impl WireStatus {
    /// Converts to a numeric code.
    #[must_use]
    pub fn to_code(self) -> u8 {
        match self {
            WireStatus::Sent => 1,
            WireStatus::Fulfilled => 2,
        }
    }

    /// Converts from a numeric code.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::UnknownStatus`] for an unassigned code.
    pub fn from_code(code: u8) -> WireResult<Self> {
        match code {
            1 => Ok(WireStatus::Sent),
            2 => Ok(WireStatus::Fulfilled),
            other => Err(WireError::UnknownStatus(other)),
        }
    }
}

/// A record as it travels between devices.
///
/// Mirrors the stored record minus the local-only `synced` flag, which
/// never crosses the link: each side tracks peer acknowledgment for its
/// own copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRecord {
    /// Record identity, stable across both devices.
    pub id: Uuid,
    /// Submitter-supplied poster number.
    pub label: String,
    /// Lifecycle status.
    pub status: WireStatus,
    /// Creation time, milliseconds since the Unix epoch.
    pub submitted_at: u64,
    /// Fulfillment time, present iff `status == Fulfilled`.
    pub fulfilled_at: Option<u64>,
}
