//! # Deskline Store
//!
//! Durable keyed record store for deskline.
//!
//! This crate provides:
//! - The [`Record`] entity (a tracked "poster pull" request)
//! - A CRC-framed append-only journal with replay on open
//! - The [`RecordStore`] keyed API with write-before-acknowledge durability
//! - Queue projections ([`live_queue`], [`audit_log`])
//! - A change-notification feed for presentation plumbing
//!
//! ## Key Invariants
//!
//! - A record's `id` never changes; it is the sole identity and merge key
//! - `status` only ever moves `Sent → Fulfilled`
//! - `put` and `mark_synced` return success only after the mutation is
//!   synced to stable storage
//! - One writer per store: mutations are globally serialized, and an
//!   on-disk store holds an exclusive advisory lock on its directory

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod feed;
mod journal;
mod record;
mod store;
mod views;

pub use backend::{FileBackend, JournalBackend, MemoryBackend};
pub use error::{StoreError, StoreResult};
pub use feed::{ChangeFeed, ChangeKind, StoreEvent};
pub use journal::{compute_crc32, Frame, Journal, JOURNAL_MAGIC, JOURNAL_VERSION};
pub use record::{normalize_label, Record, RecordId, Status, Timestamp};
pub use store::{PutOutcome, RecordStore};
pub use views::{audit_log, live_queue};
