//! List command implementation.

use rolodex_core::{ContactRepository, Database, GroupRepository};
use std::path::Path;

/// Prints live contacts, and optionally groups.
pub fn run(db_path: &Path, include_groups: bool) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(db_path)?;

    let contacts = ContactRepository::new(&db).list()?;
    if contacts.is_empty() {
        println!("No contacts.");
    }
    for contact in &contacts {
        let mut line = format!("{}  {}", contact.id, contact.display_name());
        if let Some(email) = contact.emails.first() {
            line.push_str(&format!("  <{email}>"));
        }
        if contact.conflict {
            line.push_str("  [conflict]");
        }
        println!("{line}");
    }

    if include_groups {
        let groups = GroupRepository::new(&db).list()?;
        for group in &groups {
            println!(
                "{}  {} ({} members)",
                group.id,
                group.name,
                group.member_ids.len()
            );
        }
    }

    Ok(())
}
