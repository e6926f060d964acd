//! Contact model.

use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use rolodex_sync_protocol::{format_instant, parse_instant, ContactChange};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactId(Uuid);

impl ContactId {
    /// Creates a new unique contact id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the string representation of this id.
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ContactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContactId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A contact in the local replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Unique identifier.
    pub id: ContactId,
    /// Owning account reference.
    pub owner_id: String,
    /// Given name.
    pub given_name: String,
    /// Family name.
    pub family_name: String,
    /// Email addresses.
    pub emails: Vec<String>,
    /// Phone numbers.
    pub phones: Vec<String>,
    /// Free-form note.
    pub note: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Authoritative mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Tombstone marker; the sync engine never hard-deletes.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Advisory monotonically increasing version.
    pub version: i64,
    /// Advisory UI hint that this record lost a merge.
    pub conflict: bool,
}

impl Contact {
    /// Creates a new contact owned by the given account.
    #[must_use]
    pub fn new(
        owner_id: impl Into<String>,
        given_name: impl Into<String>,
        family_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ContactId::new(),
            owner_id: owner_id.into(),
            given_name: given_name.into(),
            family_name: family_name.into(),
            emails: Vec::new(),
            phones: Vec::new(),
            note: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            version: 1,
            conflict: false,
        }
    }

    /// Returns true if the record is logically deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Returns "Given Family" with empty halves trimmed away.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.given_name, self.family_name);
        full.trim().to_string()
    }

    /// Bumps the mutation timestamp and advisory version.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.version += 1;
    }

    /// Converts to the wire representation.
    #[must_use]
    pub fn to_change(&self) -> ContactChange {
        ContactChange {
            id: self.id.as_str(),
            owner_id: Some(self.owner_id.clone()),
            given_name: self.given_name.clone(),
            family_name: self.family_name.clone(),
            emails: self.emails.clone(),
            phones: self.phones.clone(),
            note: self.note.clone(),
            created_at: Some(format_instant(self.created_at)),
            updated_at: Some(format_instant(self.updated_at)),
            deleted_at: self.deleted_at.map(format_instant),
            version: Some(self.version),
        }
    }

    /// Builds a replica record from a wire change.
    ///
    /// Unparseable timestamps fall back to `fallback_now` so an
    /// inserted record is never fresher than the pull that carried it.
    pub fn from_change(change: &ContactChange, fallback_now: DateTime<Utc>) -> Result<Self> {
        let id = change
            .id
            .parse()
            .map_err(|_| CoreError::InvalidInput(format!("invalid contact id: {}", change.id)))?;
        let updated_at = change
            .updated_at
            .as_deref()
            .and_then(parse_instant)
            .unwrap_or(fallback_now);
        Ok(Self {
            id,
            owner_id: change.owner_id.clone().unwrap_or_default(),
            given_name: change.given_name.clone(),
            family_name: change.family_name.clone(),
            emails: change.emails.clone(),
            phones: change.phones.clone(),
            note: change.note.clone(),
            created_at: change
                .created_at
                .as_deref()
                .and_then(parse_instant)
                .unwrap_or(updated_at),
            updated_at,
            deleted_at: change.deleted_at.as_deref().and_then(parse_instant),
            version: change.version.unwrap_or(0),
            conflict: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn contact_id_unique_and_parseable() {
        let id1 = ContactId::new();
        let id2 = ContactId::new();
        assert_ne!(id1, id2);

        let parsed: ContactId = id1.as_str().parse().unwrap();
        assert_eq!(id1, parsed);
    }

    #[test]
    fn new_contact_is_live() {
        let contact = Contact::new("u1", "Ada", "Lovelace");
        assert!(!contact.is_deleted());
        assert_eq!(contact.version, 1);
        assert_eq!(contact.created_at, contact.updated_at);
        assert_eq!(contact.display_name(), "Ada Lovelace");
    }

    #[test]
    fn touch_bumps_version_and_timestamp() {
        let mut contact = Contact::new("u1", "Ada", "Lovelace");
        let before = contact.updated_at;
        contact.touch();
        assert_eq!(contact.version, 2);
        assert!(contact.updated_at >= before);
    }

    #[test]
    fn change_roundtrip() {
        let mut contact = Contact::new("u1", "Grace", "Hopper");
        contact.emails.push("grace@example.com".into());

        let change = contact.to_change();
        let back = Contact::from_change(&change, Utc::now()).unwrap();
        assert_eq!(back.id, contact.id);
        assert_eq!(back.emails, contact.emails);
        assert_eq!(back.version, contact.version);
        assert_eq!(back.updated_at.timestamp_millis(), contact.updated_at.timestamp_millis());
    }

    #[test]
    fn from_change_rejects_bad_id() {
        let mut change = Contact::new("u1", "A", "B").to_change();
        change.id = "not-a-uuid".into();
        assert!(Contact::from_change(&change, Utc::now()).is_err());
    }
}
