//! Protocol messages for the three sync channels.
//!
//! - Channel A (Submit): acknowledged delivery of one created record
//! - Channel B (Status): acknowledged push of one fulfillment
//! - Channel C (Full Sync): bulk read of the responder's complete set

use crate::error::{WireError, WireResult};
use crate::wire::{WireRecord, WireStatus};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Encodes a message to CBOR bytes.
pub fn to_bytes<T: Serialize>(message: &T) -> WireResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(message, &mut buf).map_err(WireError::encode)?;
    Ok(buf)
}

/// Decodes a message from CBOR bytes.
pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> WireResult<T> {
    ciborium::from_reader(bytes).map_err(WireError::decode)
}

/// Any protocol message, for framing layers that need a discriminant.
#[derive(Debug, Clone)]
pub enum Message {
    /// Channel A request.
    Submit(SubmitRequest),
    /// Channel A acknowledgment.
    SubmitAck(SubmitAck),
    /// Channel B push.
    Status(StatusUpdate),
    /// Channel B acknowledgment.
    StatusAck(StatusAck),
    /// Channel C request.
    Snapshot(SnapshotRequest),
    /// Channel C response.
    SnapshotResponse(SnapshotResponse),
}

impl Message {
    /// Returns the message type code.
    #[must_use]
    pub fn type_code(&self) -> u8 {
        match self {
            Message::Submit(_) => 1,
            Message::SubmitAck(_) => 2,
            Message::Status(_) => 3,
            Message::StatusAck(_) => 4,
            Message::Snapshot(_) => 5,
            Message::SnapshotResponse(_) => 6,
        }
    }
}

/// Channel A: delivery of one created record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// The record being delivered.
    pub record: WireRecord,
}

impl SubmitRequest {
    /// Creates a submit request.
    #[must_use]
    pub fn new(record: WireRecord) -> Self {
        Self { record }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> WireResult<Vec<u8>> {
        to_bytes(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> WireResult<Self> {
        from_bytes(bytes)
    }
}

/// Channel A acknowledgment.
///
/// `accepted == false` marks a duplicate delivery. A duplicate is still an
/// acknowledgment: the sender may flip its local `synced` flag either way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAck {
    /// Id of the acknowledged record.
    pub id: Uuid,
    /// False if the receiver already held this id.
    pub accepted: bool,
}

impl SubmitAck {
    /// Acknowledges a freshly inserted record.
    #[must_use]
    pub fn accepted(id: Uuid) -> Self {
        Self { id, accepted: true }
    }

    /// Acknowledges a duplicate delivery.
    #[must_use]
    pub fn duplicate(id: Uuid) -> Self {
        Self {
            id,
            accepted: false,
        }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> WireResult<Vec<u8>> {
        to_bytes(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> WireResult<Self> {
        from_bytes(bytes)
    }
}

/// Channel B: push of one fulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Id of the fulfilled record.
    pub id: Uuid,
    /// New status; always `Fulfilled` in the current protocol.
    pub status: WireStatus,
    /// Fulfillment time, milliseconds since the Unix epoch.
    pub fulfilled_at: Option<u64>,
}

impl StatusUpdate {
    /// Creates a fulfillment notification.
    #[must_use]
    pub fn fulfilled(id: Uuid, fulfilled_at: u64) -> Self {
        Self {
            id,
            status: WireStatus::Fulfilled,
            fulfilled_at: Some(fulfilled_at),
        }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> WireResult<Vec<u8>> {
        to_bytes(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> WireResult<Self> {
        from_bytes(bytes)
    }
}

/// Channel B acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusAck {
    /// Id of the acknowledged record.
    pub id: Uuid,
    /// False if the update was ignored (duplicate or unknown id).
    pub applied: bool,
}

impl StatusAck {
    /// Acknowledges an applied update.
    #[must_use]
    pub fn applied(id: Uuid) -> Self {
        Self { id, applied: true }
    }

    /// Acknowledges an ignored update.
    #[must_use]
    pub fn ignored(id: Uuid) -> Self {
        Self { id, applied: false }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> WireResult<Vec<u8>> {
        to_bytes(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> WireResult<Self> {
        from_bytes(bytes)
    }
}

/// Channel C: request for the responder's complete record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRequest {
    /// Requesting device, for logging on the responder.
    pub device_id: Uuid,
}

impl SnapshotRequest {
    /// Creates a snapshot request.
    #[must_use]
    pub fn new(device_id: Uuid) -> Self {
        Self { device_id }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> WireResult<Vec<u8>> {
        to_bytes(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> WireResult<Self> {
        from_bytes(bytes)
    }
}

/// Channel C response: every record the responder holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotResponse {
    /// All records, ascending by `submitted_at` (ties by `id`).
    pub records: Vec<WireRecord>,
}

impl SnapshotResponse {
    /// Creates a snapshot response, sorting records into canonical order.
    #[must_use]
    pub fn new(mut records: Vec<WireRecord>) -> Self {
        records.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Self { records }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> WireResult<Vec<u8>> {
        to_bytes(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> WireResult<Self> {
        from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(label: &str, submitted_at: u64) -> WireRecord {
        WireRecord {
            id: Uuid::new_v4(),
            label: label.to_string(),
            status: WireStatus::Sent,
            submitted_at,
            fulfilled_at: None,
        }
    }

    #[test]
    fn submit_roundtrip() {
        let request = SubmitRequest::new(sample_record("A457", 1000));
        let decoded = SubmitRequest::decode(&request.encode().unwrap()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn status_update_roundtrip() {
        let id = Uuid::new_v4();
        let update = StatusUpdate::fulfilled(id, 2000);
        let decoded = StatusUpdate::decode(&update.encode().unwrap()).unwrap();
        assert_eq!(decoded.id, id);
        assert_eq!(decoded.status, WireStatus::Fulfilled);
        assert_eq!(decoded.fulfilled_at, Some(2000));
    }

    #[test]
    fn snapshot_response_is_canonically_ordered() {
        let response = SnapshotResponse::new(vec![
            sample_record("C3", 300),
            sample_record("A1", 100),
            sample_record("B2", 200),
        ]);
        let times: Vec<u64> = response.records.iter().map(|r| r.submitted_at).collect();
        assert_eq!(times, [100, 200, 300]);
    }

    #[test]
    fn malformed_payload_is_rejected() {
        assert!(matches!(
            SubmitRequest::decode(b"\xffnot cbor"),
            Err(WireError::Decode(_))
        ));
        assert!(matches!(
            SnapshotResponse::decode(&[]),
            Err(WireError::Decode(_))
        ));
    }

    #[test]
    fn acks_carry_duplicate_flag() {
        let id = Uuid::new_v4();
        assert!(SubmitAck::accepted(id).accepted);
        assert!(!SubmitAck::duplicate(id).accepted);
        assert!(StatusAck::applied(id).applied);
        assert!(!StatusAck::ignored(id).applied);
    }

    proptest::proptest! {
        #[test]
        fn wire_records_survive_the_codec(
            label in "[A-Z][0-9]{1,4}",
            submitted_at in proptest::prelude::any::<u64>(),
            fulfilled_at in proptest::prelude::any::<Option<u64>>(),
        ) {
            let record = WireRecord {
                id: Uuid::new_v4(),
                label,
                status: if fulfilled_at.is_some() {
                    WireStatus::Fulfilled
                } else {
                    WireStatus::Sent
                },
                submitted_at,
                fulfilled_at,
            };
            let request = SubmitRequest::new(record);
            let decoded = SubmitRequest::decode(&request.encode().unwrap()).unwrap();
            proptest::prop_assert_eq!(decoded, request);
        }
    }

    #[test]
    fn message_type_codes_are_distinct() {
        let id = Uuid::new_v4();
        let codes = [
            Message::Submit(SubmitRequest::new(sample_record("A1", 1))).type_code(),
            Message::SubmitAck(SubmitAck::accepted(id)).type_code(),
            Message::Status(StatusUpdate::fulfilled(id, 1)).type_code(),
            Message::StatusAck(StatusAck::applied(id)).type_code(),
            Message::Snapshot(SnapshotRequest::new(id)).type_code(),
            Message::SnapshotResponse(SnapshotResponse::new(vec![])).type_code(),
        ];
        let mut unique = codes.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), codes.len());
    }
}
