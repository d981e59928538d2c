//! Connection state machine and reconnect handshake.

use crate::config::EngineConfig;
use crate::convert::{record_from_wire, to_wire};
use crate::error::{EngineError, EngineResult};
use crate::handler::InboundHandler;
use crate::transport::LinkTransport;
use deskline_protocol::{SnapshotRequest, StatusUpdate, SubmitRequest};
use deskline_store::{Record, RecordId, RecordStore, Status, Timestamp};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The current state of the sync link.
///
/// `Disconnected` is both the initial state and the universal fallback on
/// any failure. The three handshaking states map to the three handshake
/// steps and advance automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No link; all outbound work is deferred.
    Disconnected,
    /// Link established, handshake not yet started.
    Connected,
    /// Handshake step 1: pushing unsynced creations.
    PushingSubmits,
    /// Handshake step 2: pushing unsynced fulfillments.
    PushingFulfillments,
    /// Handshake step 3: full reconciliation against the peer's set.
    Reconciling,
    /// Handshake complete; both stores converged as of the last step.
    Synced,
}

impl LinkState {
    /// Returns true while a handshake step is executing.
    #[must_use]
    pub fn is_handshaking(&self) -> bool {
        matches!(
            self,
            LinkState::PushingSubmits | LinkState::PushingFulfillments | LinkState::Reconciling
        )
    }

    /// Returns true if opportunistic single-record transmissions outside
    /// the handshake cadence are allowed.
    #[must_use]
    pub fn can_transmit(&self) -> bool {
        matches!(self, LinkState::Connected | LinkState::Synced)
    }
}

/// Counters describing the engine's sync activity.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Handshakes run to completion.
    pub handshakes_completed: u64,
    /// Creations delivered and acknowledged (step 1 + opportunistic).
    pub creations_pushed: u64,
    /// Fulfillments delivered and acknowledged (step 2 + opportunistic).
    pub fulfillments_pushed: u64,
    /// Records inserted or overwritten by reconciliation (step 3).
    pub records_merged: u64,
    /// Transmission retries after timeouts.
    pub retries: u64,
    /// Message of the last handshake failure, cleared on success.
    pub last_error: Option<String>,
}

/// The sync engine: drives all cross-device replication for one role.
///
/// One engine runs per device over that device's store. The transport
/// collaborator signals `link_up`/`link_down`; every `link_up` runs the
/// three-step handshake. Both roles run the same engine: the configured
/// [`crate::config::Role`] decides which steps actively push, and the
/// paired [`InboundHandler`] answers the passive direction.
pub struct SyncEngine<T: LinkTransport> {
    config: EngineConfig,
    transport: Arc<T>,
    store: Arc<RecordStore>,
    handler: InboundHandler,
    state: RwLock<LinkState>,
    stats: RwLock<SyncStats>,
    cancelled: AtomicBool,
}

impl<T: LinkTransport> SyncEngine<T> {
    /// Creates a new engine over a store and a transport.
    pub fn new(config: EngineConfig, transport: T, store: Arc<RecordStore>) -> Self {
        Self {
            config,
            transport: Arc::new(transport),
            handler: InboundHandler::new(Arc::clone(&store)),
            store,
            state: RwLock::new(LinkState::Disconnected),
            stats: RwLock::new(SyncStats::default()),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Returns the current link state.
    pub fn state(&self) -> LinkState {
        *self.state.read()
    }

    /// Returns a copy of the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the local store.
    #[must_use]
    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Returns the transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Returns the inbound handler for the transport collaborator to
    /// route arriving packets into.
    #[must_use]
    pub fn handler(&self) -> &InboundHandler {
        &self.handler
    }

    /// Signals that the transport established the link.
    ///
    /// Runs the full three-step handshake. Transport failures (timeouts,
    /// link loss, cancellation) are absorbed: the engine falls back to
    /// `Disconnected` and the next reconnect resumes the work.
    ///
    /// # Errors
    ///
    /// Only store durability failures propagate.
    pub fn link_up(&self) -> EngineResult<()> {
        self.cancelled.store(false, Ordering::SeqCst);
        self.set_state(LinkState::Connected);
        tracing::info!(role = ?self.config.role, "link established, starting handshake");

        match self.run_handshake() {
            Ok(()) => {
                self.set_state(LinkState::Synced);
                let mut stats = self.stats.write();
                stats.handshakes_completed += 1;
                stats.last_error = None;
                tracing::info!("handshake complete");
                Ok(())
            }
            Err(e) => {
                self.set_state(LinkState::Disconnected);
                self.stats.write().last_error = Some(e.to_string());
                if e.is_fatal() {
                    Err(e)
                } else {
                    tracing::warn!(error = %e, "handshake aborted, waiting for reconnect");
                    Ok(())
                }
            }
        }
    }

    /// Signals that the transport lost the link.
    ///
    /// May arrive from any thread at any time: cancels in-flight handshake
    /// work and drives the machine to `Disconnected`. No store rollback is
    /// needed; every store mutation is independently atomic, so a
    /// cancelled handshake only loses progress, never correctness.
    pub fn link_down(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.set_state(LinkState::Disconnected);
        tracing::info!("link lost");
    }

    /// Creates and durably persists a new record (Front Desk only), then
    /// opportunistically transmits it if the link is up.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RoleViolation`] for the wrong role, or a
    /// store durability failure.
    pub fn submit(&self, label: &str) -> EngineResult<Record> {
        if !self.config.role.can_submit() {
            return Err(EngineError::RoleViolation {
                role: self.config.role,
                action: "submit",
            });
        }

        let record = Record::new(label);
        self.store.put(record.clone())?;
        tracing::info!(id = %record.id, label = %record.label, "record submitted");

        self.opportunistic_submit(&record);
        Ok(self.store.get(record.id).unwrap_or(record))
    }

    /// Marks a record fulfilled (Back Office only): idempotent, atomic,
    /// durable. Opportunistically transmits the fulfillment if the link
    /// is up; on failure the record simply stays unsynced for the next
    /// handshake's step 2.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown id,
    /// [`EngineError::RoleViolation`] for the wrong role, or a store
    /// durability failure.
    pub fn fulfill(&self, id: RecordId) -> EngineResult<Record> {
        if !self.config.role.can_fulfill() {
            return Err(EngineError::RoleViolation {
                role: self.config.role,
                action: "fulfill",
            });
        }

        let Some(current) = self.store.get(id) else {
            return Err(EngineError::NotFound { id });
        };
        if current.status == Status::Fulfilled {
            return Ok(current);
        }

        let updated = current.fulfilled(Timestamp::now());
        self.store.put(updated.clone())?;
        tracing::info!(%id, label = %updated.label, "record fulfilled");

        self.opportunistic_status(&updated);
        Ok(self.store.get(id).unwrap_or(updated))
    }

    fn set_state(&self, state: LinkState) {
        *self.state.write() = state;
        tracing::debug!(?state, "link state");
    }

    fn check_cancelled(&self) -> EngineResult<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Runs handshake steps strictly in order; each step finishes (or
    /// exhausts its retries) before the next begins.
    fn run_handshake(&self) -> EngineResult<()> {
        self.set_state(LinkState::PushingSubmits);
        if self.config.role.can_submit() {
            self.push_unsynced_creations()?;
        }
        self.check_cancelled()?;

        self.set_state(LinkState::PushingFulfillments);
        if self.config.role.can_fulfill() {
            self.push_unsynced_fulfillments()?;
        }
        self.check_cancelled()?;

        self.set_state(LinkState::Reconciling);
        if self.config.role.can_submit() {
            self.reconcile()?;
        }
        self.check_cancelled()?;

        Ok(())
    }

    /// Handshake step 1: transmit unsynced creations one at a time in
    /// submission order.
    fn push_unsynced_creations(&self) -> EngineResult<()> {
        let mut pending = self
            .store
            .scan(|r| r.status == Status::Sent && !r.synced);
        pending.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        tracing::debug!(count = pending.len(), "pushing unsynced creations");

        for record in pending {
            self.check_cancelled()?;
            let request = SubmitRequest::new(to_wire(&record));
            match self.send_with_retry(|| self.transport.submit(&request)) {
                Ok(_ack) => {
                    self.store.mark_synced(record.id)?;
                    self.stats.write().creations_pushed += 1;
                    tracing::debug!(id = %record.id, "creation acknowledged");
                }
                Err(e @ (EngineError::Timeout
                | EngineError::Disconnected
                | EngineError::Cancelled
                | EngineError::Store(_))) => return Err(e),
                Err(e) => {
                    // A per-record rejection leaves it unsynced for the
                    // next handshake without blocking the rest.
                    tracing::warn!(id = %record.id, error = %e, "creation rejected");
                }
            }
        }
        Ok(())
    }

    /// Handshake step 2: transmit unsynced fulfillments one at a time.
    fn push_unsynced_fulfillments(&self) -> EngineResult<()> {
        let mut pending = self
            .store
            .scan(|r| r.status == Status::Fulfilled && !r.synced);
        pending.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        tracing::debug!(count = pending.len(), "pushing unsynced fulfillments");

        for record in pending {
            self.check_cancelled()?;
            let Some(at) = record.fulfilled_at else {
                tracing::warn!(id = %record.id, "fulfilled record missing timestamp, skipped");
                continue;
            };
            let update = StatusUpdate::fulfilled(record.id.to_uuid(), at.as_millis());
            match self.send_with_retry(|| self.transport.push_status(&update)) {
                Ok(_ack) => {
                    self.store.mark_synced(record.id)?;
                    self.stats.write().fulfillments_pushed += 1;
                    tracing::debug!(id = %record.id, "fulfillment acknowledged");
                }
                Err(e @ (EngineError::Timeout
                | EngineError::Disconnected
                | EngineError::Cancelled
                | EngineError::Store(_))) => return Err(e),
                Err(e) => {
                    tracing::warn!(id = %record.id, error = %e, "fulfillment rejected");
                }
            }
        }
        Ok(())
    }

    /// Handshake step 3: bulk-read the authority's complete set and merge.
    ///
    /// The authority's fulfillment state always wins; records only we hold
    /// are left untouched for a future step 1 to deliver.
    fn reconcile(&self) -> EngineResult<()> {
        let request = SnapshotRequest::new(self.config.device_id);
        let response = self.send_with_retry(|| self.transport.fetch_snapshot(&request))?;
        tracing::debug!(count = response.records.len(), "reconciling snapshot");

        let mut merged = 0u64;
        for wire in &response.records {
            self.check_cancelled()?;
            let incoming = match record_from_wire(wire, true) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(id = %wire.id, error = %e, "malformed snapshot record rejected");
                    continue;
                }
            };

            match self.store.get(incoming.id) {
                None => {
                    self.store.put(incoming)?;
                    merged += 1;
                }
                Some(local)
                    if local.status == Status::Sent && incoming.status == Status::Fulfilled =>
                {
                    self.store.put(incoming)?;
                    merged += 1;
                }
                Some(_) => {}
            }
        }

        self.stats.write().records_merged += merged;
        Ok(())
    }

    /// Runs one transmission with the step's bounded retry budget. Only
    /// timeouts are retried; everything else surfaces immediately.
    fn send_with_retry<R, F>(&self, mut op: F) -> EngineResult<R>
    where
        F: FnMut() -> EngineResult<R>,
    {
        let retry = &self.config.retry;
        let mut last = None;

        for attempt in 0..retry.max_attempts {
            if attempt > 0 {
                std::thread::sleep(retry.delay_for_attempt(attempt));
                self.stats.write().retries += 1;
            }
            self.check_cancelled()?;

            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    tracing::debug!(attempt, error = %e, "transmission timed out");
                    last = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last.unwrap_or(EngineError::Timeout))
    }

    /// One immediate transmission outside the handshake cadence. Any
    /// failure is swallowed: the record stays unsynced and the next
    /// handshake picks it up.
    fn opportunistic_submit(&self, record: &Record) {
        if !self.state().can_transmit() {
            return;
        }
        let request = SubmitRequest::new(to_wire(record));
        match self.transport.submit(&request) {
            Ok(_ack) => {
                if self.store.mark_synced(record.id).is_ok() {
                    self.stats.write().creations_pushed += 1;
                    tracing::debug!(id = %record.id, "opportunistic creation acknowledged");
                }
            }
            Err(e) => {
                tracing::debug!(id = %record.id, error = %e, "opportunistic creation deferred");
            }
        }
    }

    /// Opportunistic counterpart of [`Self::opportunistic_submit`] for a
    /// single fulfillment.
    fn opportunistic_status(&self, record: &Record) {
        if !self.state().can_transmit() {
            return;
        }
        let Some(at) = record.fulfilled_at else {
            return;
        };
        let update = StatusUpdate::fulfilled(record.id.to_uuid(), at.as_millis());
        match self.transport.push_status(&update) {
            Ok(_ack) => {
                if self.store.mark_synced(record.id).is_ok() {
                    self.stats.write().fulfillments_pushed += 1;
                    tracing::debug!(id = %record.id, "opportunistic fulfillment acknowledged");
                }
            }
            Err(e) => {
                tracing::debug!(id = %record.id, error = %e, "opportunistic fulfillment deferred");
            }
        }
    }
}

impl<T: LinkTransport> std::fmt::Debug for SyncEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("role", &self.config.role)
            .field("state", &self.state())
            .field("records", &self.store.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetryConfig, Role};
    use crate::transport::MockTransport;
    use deskline_protocol::SnapshotResponse;
    use std::time::Duration;

    fn engine(role: Role) -> SyncEngine<MockTransport> {
        let config = EngineConfig::new(role)
            .with_retry(RetryConfig::new(3).with_backoff(Duration::ZERO));
        let store = Arc::new(RecordStore::open_in_memory().unwrap());
        SyncEngine::new(config, MockTransport::new(), store)
    }

    fn seed_sent(engine: &SyncEngine<MockTransport>, label: &str, millis: u64) -> RecordId {
        let record = Record::with_parts(RecordId::new(), label, Timestamp::from_millis(millis));
        let id = record.id;
        engine.store().put(record).unwrap();
        id
    }

    #[test]
    fn initial_state_is_disconnected() {
        let engine = engine(Role::FrontDesk);
        assert_eq!(engine.state(), LinkState::Disconnected);
        assert_eq!(engine.stats().handshakes_completed, 0);
    }

    #[test]
    fn state_predicates() {
        assert!(LinkState::PushingSubmits.is_handshaking());
        assert!(LinkState::Reconciling.is_handshaking());
        assert!(!LinkState::Synced.is_handshaking());

        assert!(LinkState::Connected.can_transmit());
        assert!(LinkState::Synced.can_transmit());
        assert!(!LinkState::Disconnected.can_transmit());
        assert!(!LinkState::PushingSubmits.can_transmit());
    }

    #[test]
    fn handshake_pushes_creations_in_submission_order() {
        let engine = engine(Role::FrontDesk);
        seed_sent(&engine, "later", 300);
        seed_sent(&engine, "first", 100);
        seed_sent(&engine, "middle", 200);

        engine.link_up().unwrap();
        assert_eq!(engine.state(), LinkState::Synced);

        let sent = engine.transport.submitted();
        let labels: Vec<&str> = sent.iter().map(|r| r.record.label.as_str()).collect();
        assert_eq!(labels, ["FIRST", "MIDDLE", "LATER"]);

        // Every pushed record is now locally acknowledged.
        assert!(engine.store().records().iter().all(|r| r.synced));
        assert_eq!(engine.stats().creations_pushed, 3);
    }

    #[test]
    fn handshake_skips_already_synced_records() {
        let engine = engine(Role::FrontDesk);
        let id = seed_sent(&engine, "a1", 100);
        engine.store().mark_synced(id).unwrap();

        engine.link_up().unwrap();
        assert!(engine.transport.submitted().is_empty());
    }

    #[test]
    fn retry_budget_exhaustion_disconnects() {
        let engine = engine(Role::FrontDesk);
        let id = seed_sent(&engine, "u1", 100);
        engine.transport.fail_next_submits(3);

        engine.link_up().unwrap();
        assert_eq!(engine.state(), LinkState::Disconnected);
        assert!(!engine.store().get(id).unwrap().synced);
        assert_eq!(engine.stats().retries, 2);
        assert!(engine.stats().last_error.is_some());

        // Next reconnect retries the same record from scratch.
        engine.link_up().unwrap();
        assert_eq!(engine.state(), LinkState::Synced);
        assert!(engine.store().get(id).unwrap().synced);
        assert!(engine.stats().last_error.is_none());
    }

    #[test]
    fn transient_timeout_is_retried_within_budget() {
        let engine = engine(Role::FrontDesk);
        let id = seed_sent(&engine, "u1", 100);
        engine.transport.fail_next_submits(2);

        engine.link_up().unwrap();
        assert_eq!(engine.state(), LinkState::Synced);
        assert!(engine.store().get(id).unwrap().synced);
        assert_eq!(engine.stats().retries, 2);
    }

    #[test]
    fn back_office_pushes_fulfillments() {
        let engine = engine(Role::BackOffice);
        let record = Record::with_parts(RecordId::new(), "u1", Timestamp::from_millis(100))
            .acknowledged()
            .fulfilled(Timestamp::from_millis(605_000));
        let id = record.id;
        engine.store().put(record).unwrap();

        engine.link_up().unwrap();
        assert_eq!(engine.state(), LinkState::Synced);

        let pushed = engine.transport.status_updates();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].fulfilled_at, Some(605_000));
        assert!(engine.store().get(id).unwrap().synced);
        assert_eq!(engine.stats().fulfillments_pushed, 1);
    }

    #[test]
    fn reconcile_inserts_and_overwrites() {
        let engine = engine(Role::FrontDesk);

        // Local Sent copy the authority has fulfilled, plus a record the
        // authority holds that we lost.
        let local = Record::with_parts(RecordId::new(), "u1", Timestamp::from_millis(100))
            .acknowledged();
        let local_id = local.id;
        engine.store().put(local.clone()).unwrap();

        let remote_fulfilled = to_wire(&local.fulfilled(Timestamp::from_millis(500)));
        let remote_new = to_wire(&Record::with_parts(
            RecordId::new(),
            "u9",
            Timestamp::from_millis(50),
        ));
        engine
            .transport
            .set_snapshot(SnapshotResponse::new(vec![remote_fulfilled, remote_new]));

        engine.link_up().unwrap();
        assert_eq!(engine.state(), LinkState::Synced);

        let merged = engine.store().get(local_id).unwrap();
        assert_eq!(merged.status, Status::Fulfilled);
        assert_eq!(merged.fulfilled_at, Some(Timestamp::from_millis(500)));
        assert!(merged.synced);

        assert_eq!(engine.store().len(), 2);
        assert_eq!(engine.stats().records_merged, 2);
    }

    #[test]
    fn reconcile_never_clobbers_local_only_records() {
        let engine = engine(Role::FrontDesk);
        let id = seed_sent(&engine, "mine", 100);
        engine.transport.set_snapshot(SnapshotResponse::new(vec![]));

        engine.link_up().unwrap();
        assert!(engine.store().get(id).is_some());
    }

    #[test]
    fn submit_requires_front_desk_role() {
        let engine = engine(Role::BackOffice);
        assert!(matches!(
            engine.submit("a1"),
            Err(EngineError::RoleViolation { .. })
        ));
    }

    #[test]
    fn fulfill_requires_back_office_role() {
        let engine = engine(Role::FrontDesk);
        assert!(matches!(
            engine.fulfill(RecordId::new()),
            Err(EngineError::RoleViolation { .. })
        ));
    }

    #[test]
    fn fulfill_unknown_id_is_not_found() {
        let engine = engine(Role::BackOffice);
        let id = RecordId::new();
        assert!(matches!(
            engine.fulfill(id),
            Err(EngineError::NotFound { id: missing }) if missing == id
        ));
    }

    #[test]
    fn fulfill_is_idempotent() {
        let engine = engine(Role::BackOffice);
        let record = Record::with_parts(RecordId::new(), "u1", Timestamp::from_millis(100));
        let id = record.id;
        engine.store().put(record).unwrap();

        let first = engine.fulfill(id).unwrap();
        let at = first.fulfilled_at;
        assert!(at.is_some());

        let second = engine.fulfill(id).unwrap();
        assert_eq!(second.fulfilled_at, at);
        assert_eq!(engine.transport.status_updates().len(), 1);
    }

    #[test]
    fn submit_while_disconnected_stays_unsynced() {
        let engine = engine(Role::FrontDesk);
        let record = engine.submit("a457").unwrap();
        assert!(!record.synced);
        assert!(engine.transport.submitted().is_empty());
    }

    #[test]
    fn submit_while_synced_transmits_opportunistically() {
        let engine = engine(Role::FrontDesk);
        engine.link_up().unwrap();
        assert_eq!(engine.state(), LinkState::Synced);

        let record = engine.submit("a457").unwrap();
        assert!(record.synced);
        assert_eq!(engine.transport.submitted().len(), 1);
    }

    #[test]
    fn opportunistic_failure_defers_to_next_handshake() {
        let engine = engine(Role::BackOffice);
        let record = Record::with_parts(RecordId::new(), "u1", Timestamp::from_millis(100))
            .acknowledged();
        let id = record.id;
        engine.store().put(record).unwrap();

        engine.link_up().unwrap();
        engine.transport.fail_next_statuses(1);
        let fulfilled = engine.fulfill(id).unwrap();
        assert!(!fulfilled.synced);

        // The next handshake's step 2 delivers it.
        engine.link_up().unwrap();
        assert!(engine.store().get(id).unwrap().synced);
    }

    #[test]
    fn link_down_cancels_and_disconnects() {
        let engine = engine(Role::FrontDesk);
        engine.link_up().unwrap();
        assert_eq!(engine.state(), LinkState::Synced);

        engine.link_down();
        assert_eq!(engine.state(), LinkState::Disconnected);

        // A cancelled engine refuses further handshake work until the
        // next link_up resets the flag.
        assert!(matches!(engine.check_cancelled(), Err(EngineError::Cancelled)));
        engine.link_up().unwrap();
        assert_eq!(engine.state(), LinkState::Synced);
    }

    #[test]
    fn status_monotonicity_is_preserved_end_to_end() {
        let engine = engine(Role::FrontDesk);
        let record = Record::with_parts(RecordId::new(), "u1", Timestamp::from_millis(100))
            .fulfilled(Timestamp::from_millis(200));
        let id = record.id;
        engine.store().put(record.clone()).unwrap();

        // A stale Sent copy arriving via snapshot must not regress it.
        let mut stale = to_wire(&record);
        stale.status = deskline_protocol::WireStatus::Sent;
        stale.fulfilled_at = None;
        engine
            .transport
            .set_snapshot(SnapshotResponse::new(vec![stale]));

        engine.link_up().unwrap();
        assert_eq!(engine.store().get(id).unwrap().status, Status::Fulfilled);
    }
}
