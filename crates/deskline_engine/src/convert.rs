//! Conversions between stored records and their wire representation.

use deskline_protocol::{WireError, WireRecord, WireStatus};
use deskline_store::{normalize_label, Record, Status, Timestamp};

/// Builds the wire representation of a stored record.
///
/// The local-only `synced` flag is dropped; it never crosses the link.
pub(crate) fn to_wire(record: &Record) -> WireRecord {
    WireRecord {
        id: record.id.to_uuid(),
        label: record.label.clone(),
        status: match record.status {
            Status::Sent => WireStatus::Sent,
            Status::Fulfilled => WireStatus::Fulfilled,
        },
        submitted_at: record.submitted_at.as_millis(),
        fulfilled_at: record.fulfilled_at.map(|t| t.as_millis()),
    }
}

/// Rebuilds a stored record from its wire representation.
///
/// Enforces the `fulfilled_at` iff `Fulfilled` invariant; a wire record
/// violating it is malformed and rejected whole.
pub(crate) fn record_from_wire(wire: &WireRecord, synced: bool) -> Result<Record, WireError> {
    let (status, fulfilled_at) = match (wire.status, wire.fulfilled_at) {
        (WireStatus::Sent, None) => (Status::Sent, None),
        (WireStatus::Fulfilled, Some(at)) => (Status::Fulfilled, Some(Timestamp::from_millis(at))),
        (WireStatus::Fulfilled, None) => {
            return Err(WireError::decode("fulfilled record without fulfilled_at"))
        }
        (WireStatus::Sent, Some(_)) => {
            return Err(WireError::decode("sent record with fulfilled_at"))
        }
    };

    Ok(Record {
        id: wire.id.into(),
        label: normalize_label(&wire.label),
        status,
        submitted_at: Timestamp::from_millis(wire.submitted_at),
        fulfilled_at,
        synced,
    })
}
