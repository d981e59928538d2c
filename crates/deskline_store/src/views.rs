//! Queue projections: pure, stateless read views over the store.
//!
//! Projections are recomputed fresh on every call and never persisted.
//! Identical store state always yields identical output order.

use crate::record::{Record, Status};
use crate::store::RecordStore;

/// The live queue: records awaiting fulfillment, strict FIFO.
///
/// Ascending `submitted_at`, ties broken by `id` for determinism.
#[must_use]
pub fn live_queue(store: &RecordStore) -> Vec<Record> {
    let mut records = store.scan(|r| r.status == Status::Sent);
    records.sort_by(|a, b| {
        a.submitted_at
            .cmp(&b.submitted_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    records
}

/// The audit log: fulfilled records ordered by label.
///
/// Ascending case-insensitive lexicographic `label`, ties broken by `id`.
/// With a filter, only records whose label contains the filter
/// (case-insensitively) are included.
#[must_use]
pub fn audit_log(store: &RecordStore, filter: Option<&str>) -> Vec<Record> {
    let needle = filter.map(str::to_lowercase);
    let mut records = store.scan(|r| {
        r.status == Status::Fulfilled
            && needle
                .as_deref()
                .map_or(true, |n| r.label.to_lowercase().contains(n))
    });
    records.sort_by(|a, b| {
        a.label
            .to_lowercase()
            .cmp(&b.label.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
    records
}
