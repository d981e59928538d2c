//! Queue command implementation.

use deskline_store::{live_queue, RecordStore};
use std::path::Path;

/// Runs the queue command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = RecordStore::open(path)?;
    let queue = live_queue(&store);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&queue)?);
        }
        _ => {
            if queue.is_empty() {
                println!("Live queue is empty.");
                return Ok(());
            }
            println!("{:>4}  {:<12} {:>15}  {}", "#", "LABEL", "SUBMITTED", "SYNC");
            for (position, record) in queue.iter().enumerate() {
                println!(
                    "{:>4}  {:<12} {:>15}  {}",
                    position + 1,
                    record.label,
                    record.submitted_at,
                    if record.synced { "ok" } else { "pending" }
                );
            }
        }
    }

    Ok(())
}
