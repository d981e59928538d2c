//! The keyed record store.

use crate::backend::{FileBackend, JournalBackend, MemoryBackend};
use crate::error::{StoreError, StoreResult};
use crate::feed::{ChangeFeed, ChangeKind, StoreEvent};
use crate::journal::{Frame, Journal};
use crate::record::{Record, RecordId, Status};
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::mpsc::Receiver;

/// Journal file name inside a store directory.
const JOURNAL_FILE: &str = "records.journal";

/// Advisory lock file enforcing single-writer access to a store directory.
const LOCK_FILE: &str = "LOCK";

/// Outcome of a `put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// No record with that id existed; the record was inserted.
    Inserted,
    /// A record existed and was overwritten (equal status or a legal
    /// forward transition).
    Updated,
    /// The write was silently dropped: it would have moved the status
    /// backwards.
    Ignored,
}

impl PutOutcome {
    /// Returns true if the store was mutated.
    #[must_use]
    pub fn applied(&self) -> bool {
        !matches!(self, PutOutcome::Ignored)
    }
}

/// Durable keyed persistence for records, one per device role.
///
/// All mutations are serialized behind a single writer lock and journaled
/// with write-before-acknowledge semantics: `put` and `mark_synced` return
/// success only after the mutation is synced to stable storage, so callers
/// may treat the return as an acknowledgment.
///
/// Records are never deleted; the store is an append/mutate log for the
/// operational session.
pub struct RecordStore {
    inner: Mutex<Inner>,
    feed: ChangeFeed,
    /// Held for the store's lifetime; dropping releases the advisory lock.
    _lock_file: Option<File>,
}

struct Inner {
    records: HashMap<RecordId, Record>,
    journal: Journal,
}

impl RecordStore {
    /// Opens (or creates) a store directory, acquiring its exclusive lock
    /// and replaying the journal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`] if another process holds the store,
    /// or an I/O/corruption error from opening or replaying the journal.
    pub fn open(path: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(path)?;

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked {
                path: path.to_path_buf(),
            });
        }

        let backend = FileBackend::open(&path.join(JOURNAL_FILE))?;
        Self::from_journal(Journal::new(Box::new(backend), true), Some(lock_file))
    }

    /// Opens an ephemeral in-memory store, for tests and previews.
    ///
    /// # Errors
    ///
    /// Never fails in practice; kept fallible for signature symmetry with
    /// [`RecordStore::open`].
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_journal(Journal::new(Box::new(MemoryBackend::new()), false), None)
    }

    /// Builds a store over an arbitrary backend. Useful for replay tests.
    ///
    /// # Errors
    ///
    /// Returns an error if journal replay fails.
    pub fn with_backend(backend: Box<dyn JournalBackend>, sync_on_write: bool) -> StoreResult<Self> {
        Self::from_journal(Journal::new(backend, sync_on_write), None)
    }

    fn from_journal(journal: Journal, lock_file: Option<File>) -> StoreResult<Self> {
        let mut records = HashMap::new();
        journal.replay(|frame| {
            apply_frame(&mut records, frame);
            Ok(())
        })?;
        tracing::debug!(records = records.len(), "store opened");

        Ok(Self {
            inner: Mutex::new(Inner { records, journal }),
            feed: ChangeFeed::new(),
            _lock_file: lock_file,
        })
    }

    /// Upserts a record keyed by its `id`.
    ///
    /// Inserts when absent. When present, the incoming record is accepted
    /// only if its status equals or legally advances the stored one;
    /// otherwise the write is a silent no-op (`PutOutcome::Ignored`).
    ///
    /// Durable: returns only after the mutation is synced to stable
    /// storage.
    ///
    /// # Errors
    ///
    /// A journaling failure is fatal to this call and means the record was
    /// NOT committed.
    pub fn put(&self, record: Record) -> StoreResult<PutOutcome> {
        let (outcome, kind) = {
            let mut inner = self.inner.lock();
            let (outcome, prev_status) = match inner.records.get(&record.id) {
                None => (PutOutcome::Inserted, None),
                Some(existing) if existing.status.can_advance_to(record.status) => {
                    (PutOutcome::Updated, Some(existing.status))
                }
                Some(_) => return Ok(PutOutcome::Ignored),
            };

            inner.journal.append(&Frame::Put(record.clone()))?;
            inner.records.insert(record.id, record.clone());

            let kind = match (prev_status, record.status) {
                (None, _) => ChangeKind::Created,
                (Some(Status::Sent), Status::Fulfilled) => ChangeKind::Fulfilled,
                _ => ChangeKind::Updated,
            };
            (outcome, kind)
        };

        self.feed.emit(StoreEvent { kind, record });
        Ok(outcome)
    }

    /// Point lookup by id.
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<Record> {
        self.inner.lock().records.get(&id).cloned()
    }

    /// Returns all records matching a predicate.
    ///
    /// Ordering is unspecified at this layer; ordering is a projection
    /// concern.
    pub fn scan<P>(&self, predicate: P) -> Vec<Record>
    where
        P: Fn(&Record) -> bool,
    {
        self.inner
            .lock()
            .records
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }

    /// Returns every stored record. Used by full reconciliation.
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        self.inner.lock().records.values().cloned().collect()
    }

    /// Atomically flips the `synced` flag of the identified record to
    /// true. A missing id or an already synced record is a silent no-op.
    ///
    /// # Errors
    ///
    /// A journaling failure is fatal to this call.
    pub fn mark_synced(&self, id: RecordId) -> StoreResult<()> {
        let updated = {
            let mut inner = self.inner.lock();
            let Some(current) = inner.records.get(&id).cloned() else {
                return Ok(());
            };
            if current.synced {
                return Ok(());
            }
            inner.journal.append(&Frame::MarkSynced(id))?;
            let updated = current.acknowledged();
            inner.records.insert(id, updated.clone());
            updated
        };

        self.feed.emit(StoreEvent {
            kind: ChangeKind::Acknowledged,
            record: updated,
        });
        Ok(())
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    /// Returns true if no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribes to the change-notification stream.
    pub fn subscribe(&self) -> Receiver<StoreEvent> {
        self.feed.subscribe()
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// Applies a replayed frame with the same gating rules as live writes.
fn apply_frame(records: &mut HashMap<RecordId, Record>, frame: Frame) {
    match frame {
        Frame::Put(record) => match records.get(&record.id) {
            Some(existing) if !existing.status.can_advance_to(record.status) => {}
            _ => {
                records.insert(record.id, record);
            }
        },
        Frame::MarkSynced(id) => {
            if let Some(record) = records.get_mut(&id) {
                record.synced = true;
            }
        }
    }
}
