//! Delete command implementation.

use rolodex_core::{ContactId, ContactRepository, Database};
use std::path::Path;

/// Tombstones a contact; the delete is queued for the next sync.
pub fn run(db_path: &Path, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let id: ContactId = id.parse().map_err(|_| format!("invalid contact id: {id}"))?;

    let db = Database::open(db_path)?;
    ContactRepository::new(&db).delete(&id)?;
    tracing::debug!(%id, "tombstone queued");

    println!("Deleted {id}");
    Ok(())
}
