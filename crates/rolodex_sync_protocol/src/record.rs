//! Change records and payload types.

use crate::time::parse_instant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The replica entity kinds covered by the sync protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A contact record.
    Contact,
    /// A contact group record.
    Group,
}

impl EntityKind {
    /// Returns the lowercase wire/storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Contact => "contact",
            EntityKind::Group => "group",
        }
    }

    /// Parses the lowercase wire/storage name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "contact" => Some(EntityKind::Contact),
            "group" => Some(EntityKind::Group),
            _ => None,
        }
    }
}

/// The kind of mutation an outbox item carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    /// A record created locally.
    Insert,
    /// A record edited locally.
    Update,
    /// A record tombstoned locally.
    Delete,
}

impl ChangeOp {
    /// Returns the lowercase wire/storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOp::Insert => "insert",
            ChangeOp::Update => "update",
            ChangeOp::Delete => "delete",
        }
    }

    /// Parses the lowercase wire/storage name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "insert" => Some(ChangeOp::Insert),
            "update" => Some(ChangeOp::Update),
            "delete" => Some(ChangeOp::Delete),
            _ => None,
        }
    }
}

/// A contact as it appears on the wire.
///
/// Every field other than `id` is optional-with-default so a sparse
/// server payload still deserializes; timestamps stay raw strings
/// until the merge resolver parses them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactChange {
    /// Stable globally unique identifier.
    pub id: String,
    /// Owning account reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Given name.
    #[serde(default)]
    pub given_name: String,
    /// Family name.
    #[serde(default)]
    pub family_name: String,
    /// Email addresses.
    #[serde(default)]
    pub emails: Vec<String>,
    /// Phone numbers.
    #[serde(default)]
    pub phones: Vec<String>,
    /// Free-form note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Creation timestamp, RFC 3339.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Authoritative mutation timestamp, RFC 3339.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Tombstone marker; presence means the record is deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
    /// Advisory monotonically increasing version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

/// A group as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupChange {
    /// Stable globally unique identifier.
    pub id: String,
    /// Owning account reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Display name. Required: it is what distinguishes a group
    /// payload from a contact payload in the untagged union.
    pub name: String,
    /// Member contact ids.
    #[serde(default)]
    pub member_ids: Vec<String>,
    /// Creation timestamp, RFC 3339.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Authoritative mutation timestamp, RFC 3339.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Tombstone marker; presence means the record is deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
    /// Advisory monotonically increasing version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

/// A point-in-time snapshot of one mutated record.
///
/// Tagged by shape rather than by an explicit discriminator: the
/// enclosing push item already carries the `entity` field, and
/// `GroupChange` requires `name` so group payloads never match the
/// contact variant. `Group` must stay first so deserialization tries
/// the stricter shape before the permissive one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordPayload {
    /// A group snapshot.
    Group(GroupChange),
    /// A contact snapshot.
    Contact(ContactChange),
}

impl RecordPayload {
    /// Returns the entity kind of the snapshot.
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            RecordPayload::Contact(_) => EntityKind::Contact,
            RecordPayload::Group(_) => EntityKind::Group,
        }
    }

    /// Returns the record identifier.
    pub fn record_id(&self) -> &str {
        match self {
            RecordPayload::Contact(change) => &change.id,
            RecordPayload::Group(change) => &change.id,
        }
    }

    /// Returns the advisory version carried by the snapshot.
    pub fn version(&self) -> i64 {
        match self {
            RecordPayload::Contact(change) => change.version.unwrap_or(0),
            RecordPayload::Group(change) => change.version.unwrap_or(0),
        }
    }
}

impl ContactChange {
    /// Returns true if the record carries a delete tombstone.
    pub fn is_tombstone(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Parses the record's authoritative mutation instant.
    ///
    /// Falls back to the tombstone timestamp when `updated_at` is
    /// absent; `None` means the record must never override local
    /// state.
    pub fn change_instant(&self) -> Option<DateTime<Utc>> {
        self.updated_at
            .as_deref()
            .and_then(parse_instant)
            .or_else(|| self.deleted_at.as_deref().and_then(parse_instant))
    }
}

impl GroupChange {
    /// Returns true if the record carries a delete tombstone.
    pub fn is_tombstone(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Parses the record's authoritative mutation instant.
    pub fn change_instant(&self) -> Option<DateTime<Utc>> {
        self.updated_at
            .as_deref()
            .and_then(parse_instant)
            .or_else(|| self.deleted_at.as_deref().and_then(parse_instant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn contact(id: &str) -> ContactChange {
        ContactChange {
            id: id.into(),
            owner_id: None,
            given_name: "Ada".into(),
            family_name: "Lovelace".into(),
            emails: vec!["ada@example.com".into()],
            phones: vec![],
            note: None,
            created_at: Some("2024-01-01T00:00:00Z".into()),
            updated_at: Some("2024-01-02T00:00:00Z".into()),
            deleted_at: None,
            version: Some(3),
        }
    }

    #[test]
    fn entity_kind_names_roundtrip() {
        assert_eq!(EntityKind::parse("contact"), Some(EntityKind::Contact));
        assert_eq!(EntityKind::parse("group"), Some(EntityKind::Group));
        assert_eq!(EntityKind::parse("note"), None);
        assert_eq!(EntityKind::Contact.as_str(), "contact");
    }

    #[test]
    fn change_op_names_roundtrip() {
        for op in [ChangeOp::Insert, ChangeOp::Update, ChangeOp::Delete] {
            assert_eq!(ChangeOp::parse(op.as_str()), Some(op));
        }
        assert_eq!(ChangeOp::parse("upsert"), None);
    }

    #[test]
    fn tombstone_detection() {
        let mut change = contact("c1");
        assert!(!change.is_tombstone());
        change.deleted_at = Some("2024-01-03T00:00:00Z".into());
        assert!(change.is_tombstone());
    }

    #[test]
    fn change_instant_falls_back_to_tombstone() {
        let mut change = contact("c1");
        change.updated_at = None;
        change.deleted_at = Some("2024-01-03T00:00:00Z".into());
        assert!(change.change_instant().is_some());

        change.deleted_at = Some("garbage".into());
        assert!(change.change_instant().is_none());
    }

    #[test]
    fn payload_union_distinguishes_contact_and_group() {
        let group_json = serde_json::json!({
            "id": "g1",
            "name": "Family",
            "member_ids": ["c1", "c2"],
        });
        let payload: RecordPayload = serde_json::from_value(group_json).unwrap();
        assert_eq!(payload.entity_kind(), EntityKind::Group);
        assert_eq!(payload.record_id(), "g1");

        let contact_json = serde_json::to_value(contact("c9")).unwrap();
        let payload: RecordPayload = serde_json::from_value(contact_json).unwrap();
        assert_eq!(payload.entity_kind(), EntityKind::Contact);
        assert_eq!(payload.record_id(), "c9");
        assert_eq!(payload.version(), 3);
    }
}
