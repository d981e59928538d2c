//! Loopback transport wiring two engines directly together.
//!
//! Routes each channel straight into the peer's [`InboundHandler`] with no
//! network in between. Used by integration tests to drive both roles of
//! the protocol in one process; link loss and timeouts are injectable.

use crate::error::{EngineError, EngineResult};
use crate::handler::InboundHandler;
use crate::transport::LinkTransport;
use deskline_protocol::{
    SnapshotRequest, SnapshotResponse, StatusAck, StatusUpdate, SubmitAck, SubmitRequest,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// One direction of an in-process link: this side's outbound channels,
/// answered by the peer's inbound handler.
pub struct PairedTransport {
    peer: Arc<InboundHandler>,
    connected: AtomicBool,
    submit_timeouts: AtomicU32,
    status_timeouts: AtomicU32,
    snapshot_timeouts: AtomicU32,
}

impl PairedTransport {
    /// Creates a connected transport answering from the given peer.
    pub fn new(peer: Arc<InboundHandler>) -> Self {
        Self {
            peer,
            connected: AtomicBool::new(true),
            submit_timeouts: AtomicU32::new(0),
            status_timeouts: AtomicU32::new(0),
            snapshot_timeouts: AtomicU32::new(0),
        }
    }

    /// Sets the link state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Makes the next `n` submit calls time out before reaching the peer.
    pub fn fail_next_submits(&self, n: u32) {
        self.submit_timeouts.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` status pushes time out before reaching the peer.
    pub fn fail_next_statuses(&self, n: u32) {
        self.status_timeouts.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` snapshot fetches time out.
    pub fn fail_next_snapshots(&self, n: u32) {
        self.snapshot_timeouts.store(n, Ordering::SeqCst);
    }

    fn consume_timeout(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl LinkTransport for PairedTransport {
    fn submit(&self, request: &SubmitRequest) -> EngineResult<SubmitAck> {
        if !self.is_connected() {
            return Err(EngineError::Disconnected);
        }
        if Self::consume_timeout(&self.submit_timeouts) {
            return Err(EngineError::Timeout);
        }
        self.peer.handle_submit(request)
    }

    fn push_status(&self, update: &StatusUpdate) -> EngineResult<StatusAck> {
        if !self.is_connected() {
            return Err(EngineError::Disconnected);
        }
        if Self::consume_timeout(&self.status_timeouts) {
            return Err(EngineError::Timeout);
        }
        self.peer.handle_status(update)
    }

    fn fetch_snapshot(&self, request: &SnapshotRequest) -> EngineResult<SnapshotResponse> {
        if !self.is_connected() {
            return Err(EngineError::Disconnected);
        }
        if Self::consume_timeout(&self.snapshot_timeouts) {
            return Err(EngineError::Timeout);
        }
        self.peer.handle_snapshot(request)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for PairedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairedTransport")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
