//! Inspect command implementation.

use deskline_store::{RecordStore, Status};
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Total records.
    pub total: usize,
    /// Records awaiting fulfillment.
    pub sent: usize,
    /// Fulfilled records.
    pub fulfilled: usize,
    /// Records whose last mutation has not been acknowledged by the peer.
    pub unsynced: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::debug!(path = %path.display(), "opening store");
    let store = RecordStore::open(path)?;

    let result = InspectResult {
        path: path.display().to_string(),
        total: store.len(),
        sent: store.scan(|r| r.status == Status::Sent).len(),
        fulfilled: store.scan(|r| r.status == Status::Fulfilled).len(),
        unsynced: store.scan(|r| !r.synced).len(),
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Deskline Store Inspection");
    println!("=========================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Records:");
    println!("  Total:     {}", result.total);
    println!("  Sent:      {}", result.sent);
    println!("  Fulfilled: {}", result.fulfilled);
    println!();
    println!("Sync backlog:");
    println!("  Unsynced:  {}", result.unsynced);
}
