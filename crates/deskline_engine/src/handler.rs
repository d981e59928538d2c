//! Inbound packet handlers: the passive direction of each handshake step.
//!
//! The transport collaborator invokes these when a packet arrives. Every
//! handler applies the duplicate/replay policy: a packet that would
//! re-apply an already-present `(id, status)` is ignored outright, never
//! re-processed, and correctness is restored where needed by the next full
//! reconciliation.

use crate::convert::{record_from_wire, to_wire};
use crate::error::EngineResult;
use deskline_protocol::{
    SnapshotRequest, SnapshotResponse, StatusAck, StatusUpdate, SubmitAck, SubmitRequest,
    WireStatus,
};
use deskline_store::{RecordId, RecordStore, Status, Timestamp};
use std::sync::Arc;

/// Applies peer packets to the local store.
///
/// Both roles hold one: the Back Office answers Channel A and C, the Front
/// Desk answers Channel B. Handlers are safe against duplicates, replays,
/// and malformed payloads; they never leave the store partially applied
/// because every store mutation is independently atomic.
pub struct InboundHandler {
    store: Arc<RecordStore>,
}

impl InboundHandler {
    /// Creates a handler over the local store.
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Channel A: a creation arrived.
    ///
    /// A duplicate id is ignored but still acknowledged, so a retried
    /// delivery converges instead of looping.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed record or a store durability
    /// failure; no ack is produced in that case.
    pub fn handle_submit(&self, request: &SubmitRequest) -> EngineResult<SubmitAck> {
        let id = RecordId::from(request.record.id);
        if self.store.get(id).is_some() {
            tracing::debug!(%id, "duplicate creation ignored");
            return Ok(SubmitAck::duplicate(request.record.id));
        }

        // The peer holds this record already, so the fresh copy starts
        // acknowledged.
        let record = record_from_wire(&request.record, true)?;
        self.store.put(record)?;
        tracing::debug!(%id, "creation applied");
        Ok(SubmitAck::accepted(request.record.id))
    }

    /// Channel B: a fulfillment notification arrived.
    ///
    /// Applies the authority's fulfillment state to the local copy. An
    /// already fulfilled or locally unknown id is ignored (and left to the
    /// next full reconciliation), but still acknowledged.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed update or a store durability
    /// failure; no ack is produced in that case.
    pub fn handle_status(&self, update: &StatusUpdate) -> EngineResult<StatusAck> {
        if update.status != WireStatus::Fulfilled {
            return Err(crate::error::EngineError::Protocol(format!(
                "unexpected status push {:?}",
                update.status
            )));
        }
        let Some(at) = update.fulfilled_at else {
            return Err(deskline_protocol::WireError::decode(
                "fulfillment without fulfilled_at",
            )
            .into());
        };

        let id = RecordId::from(update.id);
        match self.store.get(id) {
            None => {
                tracing::warn!(%id, "fulfillment for unknown record ignored");
                Ok(StatusAck::ignored(update.id))
            }
            Some(local) if local.status == Status::Fulfilled => {
                tracing::debug!(%id, "duplicate fulfillment ignored");
                Ok(StatusAck::ignored(update.id))
            }
            Some(local) => {
                let updated = local.fulfilled(Timestamp::from_millis(at)).acknowledged();
                self.store.put(updated)?;
                tracing::debug!(%id, "fulfillment applied");
                Ok(StatusAck::applied(update.id))
            }
        }
    }

    /// Channel C: the peer asked for our complete record set.
    ///
    /// # Errors
    ///
    /// Infallible in practice; kept fallible for transport symmetry.
    pub fn handle_snapshot(&self, request: &SnapshotRequest) -> EngineResult<SnapshotResponse> {
        let records: Vec<_> = self.store.records().iter().map(to_wire).collect();
        tracing::debug!(
            peer = %request.device_id,
            count = records.len(),
            "serving snapshot"
        );
        Ok(SnapshotResponse::new(records))
    }
}

impl std::fmt::Debug for InboundHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundHandler")
            .field("records", &self.store.len())
            .finish()
    }
}
