//! Transport abstraction for the sync link.

use crate::error::{EngineError, EngineResult};
use deskline_protocol::{
    SnapshotRequest, SnapshotResponse, StatusAck, StatusUpdate, SubmitAck, SubmitRequest,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// The wireless link as the engine sees it: three logical channels.
///
/// The implementation owns physical discovery, pairing, payload framing
/// and size limits, and the per-operation timeout: a call that exceeds the
/// configured timeout must fail with [`EngineError::Timeout`] so the
/// engine's retry accounting works. The engine treats `is_connected` as
/// ground truth and never second-guesses link quality.
pub trait LinkTransport: Send + Sync {
    /// Channel A: delivers one created record, awaiting acknowledgment.
    fn submit(&self, request: &SubmitRequest) -> EngineResult<SubmitAck>;

    /// Channel B: pushes one fulfillment, awaiting acknowledgment.
    fn push_status(&self, update: &StatusUpdate) -> EngineResult<StatusAck>;

    /// Channel C: bulk-reads the peer's complete record set.
    fn fetch_snapshot(&self, request: &SnapshotRequest) -> EngineResult<SnapshotResponse>;

    /// Returns true while the link is up.
    fn is_connected(&self) -> bool;
}

/// A scriptable transport for tests.
///
/// By default every operation succeeds: submits and status pushes are
/// recorded and acknowledged, snapshots return the configured response
/// (empty unless set). Timeouts can be injected per channel, consumed one
/// per call.
#[derive(Debug, Default)]
pub struct MockTransport {
    connected: AtomicBool,
    submitted: Mutex<Vec<SubmitRequest>>,
    status_updates: Mutex<Vec<StatusUpdate>>,
    snapshot: Mutex<SnapshotResponse>,
    submit_timeouts: AtomicU32,
    status_timeouts: AtomicU32,
    snapshot_timeouts: AtomicU32,
}

impl MockTransport {
    /// Creates a connected mock transport.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            submitted: Mutex::new(Vec::new()),
            status_updates: Mutex::new(Vec::new()),
            snapshot: Mutex::new(SnapshotResponse::new(Vec::new())),
            submit_timeouts: AtomicU32::new(0),
            status_timeouts: AtomicU32::new(0),
            snapshot_timeouts: AtomicU32::new(0),
        }
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Sets the response served on Channel C.
    pub fn set_snapshot(&self, response: SnapshotResponse) {
        *self.snapshot.lock() = response;
    }

    /// Makes the next `n` submit calls time out.
    pub fn fail_next_submits(&self, n: u32) {
        self.submit_timeouts.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` status pushes time out.
    pub fn fail_next_statuses(&self, n: u32) {
        self.status_timeouts.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` snapshot fetches time out.
    pub fn fail_next_snapshots(&self, n: u32) {
        self.snapshot_timeouts.store(n, Ordering::SeqCst);
    }

    /// Returns all recorded submit requests.
    #[must_use]
    pub fn submitted(&self) -> Vec<SubmitRequest> {
        self.submitted.lock().clone()
    }

    /// Returns all recorded status pushes.
    #[must_use]
    pub fn status_updates(&self) -> Vec<StatusUpdate> {
        self.status_updates.lock().clone()
    }

    fn consume_timeout(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl LinkTransport for MockTransport {
    fn submit(&self, request: &SubmitRequest) -> EngineResult<SubmitAck> {
        if !self.is_connected() {
            return Err(EngineError::Disconnected);
        }
        if Self::consume_timeout(&self.submit_timeouts) {
            return Err(EngineError::Timeout);
        }
        self.submitted.lock().push(request.clone());
        Ok(SubmitAck::accepted(request.record.id))
    }

    fn push_status(&self, update: &StatusUpdate) -> EngineResult<StatusAck> {
        if !self.is_connected() {
            return Err(EngineError::Disconnected);
        }
        if Self::consume_timeout(&self.status_timeouts) {
            return Err(EngineError::Timeout);
        }
        self.status_updates.lock().push(update.clone());
        Ok(StatusAck::applied(update.id))
    }

    fn fetch_snapshot(&self, _request: &SnapshotRequest) -> EngineResult<SnapshotResponse> {
        if !self.is_connected() {
            return Err(EngineError::Disconnected);
        }
        if Self::consume_timeout(&self.snapshot_timeouts) {
            return Err(EngineError::Timeout);
        }
        Ok(self.snapshot.lock().clone())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskline_protocol::{WireRecord, WireStatus};
    use uuid::Uuid;

    fn request() -> SubmitRequest {
        SubmitRequest::new(WireRecord {
            id: Uuid::new_v4(),
            label: "A1".into(),
            status: WireStatus::Sent,
            submitted_at: 100,
            fulfilled_at: None,
        })
    }

    #[test]
    fn mock_acknowledges_and_records() {
        let transport = MockTransport::new();
        let req = request();

        let ack = transport.submit(&req).unwrap();
        assert!(ack.accepted);
        assert_eq!(ack.id, req.record.id);
        assert_eq!(transport.submitted().len(), 1);
    }

    #[test]
    fn disconnected_transport_refuses() {
        let transport = MockTransport::new();
        transport.set_connected(false);

        assert!(matches!(
            transport.submit(&request()),
            Err(EngineError::Disconnected)
        ));
        assert!(transport.submitted().is_empty());
    }

    #[test]
    fn injected_timeouts_are_consumed() {
        let transport = MockTransport::new();
        transport.fail_next_submits(2);

        assert!(matches!(
            transport.submit(&request()),
            Err(EngineError::Timeout)
        ));
        assert!(matches!(
            transport.submit(&request()),
            Err(EngineError::Timeout)
        ));
        assert!(transport.submit(&request()).is_ok());
    }
}
