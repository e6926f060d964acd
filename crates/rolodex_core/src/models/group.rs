//! Group model.

use crate::error::{CoreError, Result};
use crate::models::ContactId;
use chrono::{DateTime, Utc};
use rolodex_sync_protocol::{format_instant, parse_instant, GroupChange};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(Uuid);

impl GroupId {
    /// Creates a new unique group id.
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

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GroupId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A contact group in the local replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Unique identifier.
    pub id: GroupId,
    /// Owning account reference.
    pub owner_id: String,
    /// Display name.
    pub name: String,
    /// Member contact ids.
    pub member_ids: Vec<ContactId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Authoritative mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Tombstone marker.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Advisory monotonically increasing version.
    pub version: i64,
    /// Advisory UI hint that this record lost a merge.
    pub conflict: bool,
}

impl Group {
    /// Creates a new empty group owned by the given account.
    #[must_use]
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: GroupId::new(),
            owner_id: owner_id.into(),
            name: name.into(),
            member_ids: Vec::new(),
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

    /// Bumps the mutation timestamp and advisory version.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.version += 1;
    }

    /// Converts to the wire representation.
    #[must_use]
    pub fn to_change(&self) -> GroupChange {
        GroupChange {
            id: self.id.as_str(),
            owner_id: Some(self.owner_id.clone()),
            name: self.name.clone(),
            member_ids: self.member_ids.iter().map(ContactId::as_str).collect(),
            created_at: Some(format_instant(self.created_at)),
            updated_at: Some(format_instant(self.updated_at)),
            deleted_at: self.deleted_at.map(format_instant),
            version: Some(self.version),
        }
    }

    /// Builds a replica record from a wire change.
    pub fn from_change(change: &GroupChange, fallback_now: DateTime<Utc>) -> Result<Self> {
        let id = change
            .id
            .parse()
            .map_err(|_| CoreError::InvalidInput(format!("invalid group id: {}", change.id)))?;
        let member_ids = change
            .member_ids
            .iter()
            .map(|raw| {
                raw.parse()
                    .map_err(|_| CoreError::InvalidInput(format!("invalid member id: {raw}")))
            })
            .collect::<Result<Vec<ContactId>>>()?;
        let updated_at = change
            .updated_at
            .as_deref()
            .and_then(parse_instant)
            .unwrap_or(fallback_now);
        Ok(Self {
            id,
            owner_id: change.owner_id.clone().unwrap_or_default(),
            name: change.name.clone(),
            member_ids,
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
    fn new_group_is_live() {
        let group = Group::new("u1", "Family");
        assert!(!group.is_deleted());
        assert!(group.member_ids.is_empty());
        assert_eq!(group.version, 1);
    }

    #[test]
    fn change_roundtrip_keeps_members() {
        let mut group = Group::new("u1", "Friends");
        group.member_ids.push(ContactId::new());
        group.member_ids.push(ContactId::new());

        let change = group.to_change();
        let back = Group::from_change(&change, Utc::now()).unwrap();
        assert_eq!(back.member_ids, group.member_ids);
        assert_eq!(back.name, "Friends");
    }

    #[test]
    fn from_change_rejects_bad_member_id() {
        let mut change = Group::new("u1", "Friends").to_change();
        change.member_ids.push("nope".into());
        assert!(Group::from_change(&change, Utc::now()).is_err());
    }
}
