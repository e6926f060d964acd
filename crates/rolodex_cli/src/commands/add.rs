//! Add command implementation.

use rolodex_core::{Contact, ContactRepository, Database};
use std::path::Path;

/// Creates a contact and queues it for the next sync.
#[allow(clippy::too_many_arguments)]
pub fn run(
    db_path: &Path,
    owner: &str,
    given_name: &str,
    family_name: &str,
    emails: Vec<String>,
    phones: Vec<String>,
    note: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(db_path)?;
    let repo = ContactRepository::new(&db);

    let mut contact = Contact::new(owner, given_name, family_name);
    contact.emails = emails;
    contact.phones = phones;
    contact.note = note;
    repo.save(&contact)?;
    tracing::debug!(id = %contact.id, "contact saved and queued");

    println!("Added {} ({})", contact.display_name(), contact.id);
    Ok(())
}
