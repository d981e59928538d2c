//! Change-notification stream for presentation plumbing.
//!
//! The feed emits an event after every durable store mutation so a UI can
//! refresh its projections. It carries no consistency logic: the sync
//! engine reads the store directly and never consumes the feed.

use crate::record::Record;
use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};

/// What kind of mutation produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A record was inserted.
    Created,
    /// A record was overwritten without a status transition.
    Updated,
    /// A record transitioned to `Fulfilled`.
    Fulfilled,
    /// A record's `synced` flag flipped to true.
    Acknowledged,
}

/// A single change event.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEvent {
    /// The mutation kind.
    pub kind: ChangeKind,
    /// The record state after the mutation.
    pub record: Record,
}

/// Fan-out of committed mutations to subscribers.
///
/// Events are emitted only after the mutation is durably journaled, in
/// commit order. Disconnected subscribers are dropped on the next emit.
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Sender<StoreEvent>>>,
}

impl ChangeFeed {
    /// Creates a new feed with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribes to all future events.
    pub fn subscribe(&self) -> Receiver<StoreEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an event to all live subscribers.
    pub fn emit(&self, event: StoreEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Timestamp;
    use std::time::Duration;

    fn event(kind: ChangeKind) -> StoreEvent {
        StoreEvent {
            kind,
            record: Record::with_parts(
                crate::record::RecordId::new(),
                "a1",
                Timestamp::from_millis(1),
            ),
        }
    }

    #[test]
    fn emit_and_receive() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();

        let ev = event(ChangeKind::Created);
        feed.emit(ev.clone());

        let received = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(received, ev);
    }

    #[test]
    fn multiple_subscribers() {
        let feed = ChangeFeed::new();
        let rx1 = feed.subscribe();
        let rx2 = feed.subscribe();

        let ev = event(ChangeKind::Fulfilled);
        feed.emit(ev.clone());

        assert_eq!(rx1.recv().unwrap(), ev);
        assert_eq!(rx2.recv().unwrap(), ev);
    }

    #[test]
    fn dropped_subscriber_is_cleaned_up() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 1);

        drop(rx);
        feed.emit(event(ChangeKind::Updated));
        assert_eq!(feed.subscriber_count(), 0);
    }
}
