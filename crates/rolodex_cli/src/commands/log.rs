//! Log command implementation.

use rolodex_core::Database;
use rolodex_sync_engine::{DatabaseStore, SyncLogStore};
use std::path::Path;
use std::sync::Arc;

/// Prints recent sync cycle outcomes, newest first.
pub fn run(db_path: &Path, limit: usize, failures: bool) -> Result<(), Box<dyn std::error::Error>> {
    let db = Arc::new(Database::open(db_path)?);
    let store = DatabaseStore::new(db);

    let entries = store.recent(limit, failures)?;
    if entries.is_empty() {
        println!("No sync cycles recorded.");
        return Ok(());
    }

    for entry in entries {
        let status = if entry.success { "ok " } else { "FAIL" };
        let mut line = format!(
            "#{:<4} {} {}  pushed {}/{}  pulled {}  {} ms",
            entry.id,
            status,
            entry.started_at.format("%Y-%m-%d %H:%M:%S"),
            entry.push.applied,
            entry.push.attempted,
            entry.pull.total(),
            entry.duration_ms,
        );
        if let Some(error) = &entry.error {
            line.push_str(&format!("  {error}"));
        }
        println!("{line}");
    }

    Ok(())
}
