//! Audit command implementation.

use deskline_store::{audit_log, RecordStore};
use std::path::Path;

/// Runs the audit command.
pub fn run(path: &Path, filter: Option<&str>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = RecordStore::open(path)?;
    let audit = audit_log(&store, filter);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&audit)?);
        }
        _ => {
            if audit.is_empty() {
                match filter {
                    Some(filter) => println!("No fulfilled records match {filter:?}."),
                    None => println!("No fulfilled records."),
                }
                return Ok(());
            }
            println!("{:<12} {:>15} {:>15}  {}", "LABEL", "SUBMITTED", "FULFILLED", "SYNC");
            for record in &audit {
                let fulfilled_at = record
                    .fulfilled_at
                    .map(|t| t.to_string())
                    .unwrap_or_default();
                println!(
                    "{:<12} {:>15} {:>15}  {}",
                    record.label,
                    record.submitted_at,
                    fulfilled_at,
                    if record.synced { "ok" } else { "pending" }
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskline_store::{Record, RecordId, Timestamp};
    use tempfile::tempdir;

    #[test]
    fn audit_runs_with_and_without_filter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        {
            let store = RecordStore::open(&path).unwrap();
            store
                .put(
                    Record::with_parts(RecordId::new(), "a457", Timestamp::from_millis(100))
                        .fulfilled(Timestamp::from_millis(200)),
                )
                .unwrap();
        }

        assert!(run(&path, None, "text").is_ok());
        assert!(run(&path, Some("457"), "text").is_ok());
        assert!(run(&path, Some("zzz"), "text").is_ok());
        assert!(run(&path, None, "json").is_ok());
    }
}
