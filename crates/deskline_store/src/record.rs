//! The record entity and its identity types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;
use uuid::Uuid;

/// Unique identifier for a record.
///
/// Record IDs are 128-bit UUIDs that are:
/// - Globally unique across both device roles
/// - Immutable once assigned at creation
/// - The sole identity and merge key for a record
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Creates a new random record ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a record ID from raw bytes.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the raw bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Converts to a UUID.
    #[must_use]
    pub const fn to_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RecordId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<RecordId> for Uuid {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

/// Milliseconds since the Unix epoch.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp from raw milliseconds.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the raw milliseconds.
    #[inline]
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Returns the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(millis as u64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}ms)", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a record.
///
/// The only legal transition is `Sent → Fulfilled`; a record never moves
/// back. (The UI-level "Pending" label maps onto `Sent` and is never
/// stored.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Submitted by the Front Desk, awaiting fulfillment.
    Sent,
    /// Fulfilled by the Back Office.
    Fulfilled,
}

impl Status {
    /// Returns true if a stored record at `self` may be overwritten by an
    /// incoming record at `next`.
    ///
    /// Equal status is accepted (reconciliation refreshes copies in place);
    /// `Fulfilled → Sent` is never accepted.
    #[must_use]
    pub fn can_advance_to(self, next: Status) -> bool {
        self <= next
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Sent => write!(f, "sent"),
            Status::Fulfilled => write!(f, "fulfilled"),
        }
    }
}

/// A single tracked request (a "poster pull").
///
/// Records are created only by the Front Desk role and fulfilled only by
/// the Back Office role. The `synced` flag marks whether the last local
/// mutation has been acknowledged by the peer device; it is local-only and
/// never travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Immutable identity and merge key.
    pub id: RecordId,
    /// Poster number supplied by the submitter. Case-normalized, not unique.
    pub label: String,
    /// Lifecycle status.
    pub status: Status,
    /// Set at creation, immutable.
    pub submitted_at: Timestamp,
    /// Set exactly once, iff `status == Fulfilled`.
    pub fulfilled_at: Option<Timestamp>,
    /// True iff the last local mutation was acknowledged by the peer.
    pub synced: bool,
}

impl Record {
    /// Creates a new unsynced record with a fresh id, submitted now.
    #[must_use]
    pub fn new(label: impl AsRef<str>) -> Self {
        Self::with_parts(RecordId::new(), label, Timestamp::now())
    }

    /// Creates a new unsynced `Sent` record from explicit parts.
    #[must_use]
    pub fn with_parts(id: RecordId, label: impl AsRef<str>, submitted_at: Timestamp) -> Self {
        Self {
            id,
            label: normalize_label(label.as_ref()),
            status: Status::Sent,
            submitted_at,
            fulfilled_at: None,
            synced: false,
        }
    }

    /// Returns a fulfilled copy of this record.
    ///
    /// Sets `fulfilled_at`, flips `synced` off (the fulfillment has not
    /// been acknowledged yet). Idempotent on an already fulfilled record.
    #[must_use]
    pub fn fulfilled(mut self, at: Timestamp) -> Self {
        if self.status == Status::Fulfilled {
            return self;
        }
        self.status = Status::Fulfilled;
        self.fulfilled_at = Some(at);
        self.synced = false;
        self
    }

    /// Returns a copy with the `synced` flag set.
    #[must_use]
    pub fn acknowledged(mut self) -> Self {
        self.synced = true;
        self
    }
}

/// Case-normalizes a submitter-supplied label: trimmed, uppercased.
#[must_use]
pub fn normalize_label(label: &str) -> String {
    label.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_ids_are_unique() {
        let a = RecordId::new();
        let b = RecordId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn record_id_bytes_roundtrip() {
        let bytes = [7u8; 16];
        let id = RecordId::from_bytes(bytes);
        assert_eq!(*id.as_bytes(), bytes);
    }

    #[test]
    fn status_transitions() {
        assert!(Status::Sent.can_advance_to(Status::Sent));
        assert!(Status::Sent.can_advance_to(Status::Fulfilled));
        assert!(Status::Fulfilled.can_advance_to(Status::Fulfilled));
        assert!(!Status::Fulfilled.can_advance_to(Status::Sent));
    }

    #[test]
    fn new_record_is_unsynced_sent() {
        let record = Record::new("a457");
        assert_eq!(record.status, Status::Sent);
        assert_eq!(record.label, "A457");
        assert!(record.fulfilled_at.is_none());
        assert!(!record.synced);
    }

    #[test]
    fn label_is_normalized() {
        assert_eq!(normalize_label("  b102 "), "B102");
        assert_eq!(normalize_label("C9"), "C9");
    }

    #[test]
    fn fulfilled_sets_timestamp_once() {
        let at = Timestamp::from_millis(1000);
        let record = Record::new("a1").acknowledged().fulfilled(at);
        assert_eq!(record.status, Status::Fulfilled);
        assert_eq!(record.fulfilled_at, Some(at));
        assert!(!record.synced);

        // Second fulfillment is a no-op.
        let again = record.clone().fulfilled(Timestamp::from_millis(9999));
        assert_eq!(again.fulfilled_at, Some(at));
    }

    #[test]
    fn timestamp_ordering() {
        assert!(Timestamp::from_millis(1) < Timestamp::from_millis(2));
    }
}
