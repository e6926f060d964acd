//! Outbox item model.

use chrono::{DateTime, Utc};
use rolodex_sync_protocol::{ChangeOp, EntityKind, RecordPayload};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an outbox item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    /// Waiting for selection into a push batch.
    Queued,
    /// Selected into the batch currently being transmitted.
    Sending,
    /// Confirmed applied by the server.
    Done,
    /// Transport failure or server rejection; re-eligible next cycle.
    Error,
}

impl OutboxStatus {
    /// Returns the lowercase storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Queued => "queued",
            OutboxStatus::Sending => "sending",
            OutboxStatus::Done => "done",
            OutboxStatus::Error => "error",
        }
    }

    /// Parses the lowercase storage name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "queued" => Some(OutboxStatus::Queued),
            "sending" => Some(OutboxStatus::Sending),
            "done" => Some(OutboxStatus::Done),
            "error" => Some(OutboxStatus::Error),
            _ => None,
        }
    }

}

/// A pending local mutation awaiting transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxItem {
    /// Local auto-incrementing id.
    pub id: i64,
    /// Entity kind of the mutated record.
    pub entity: EntityKind,
    /// Identifier of the mutated record.
    pub entity_id: String,
    /// Kind of mutation.
    pub op: ChangeOp,
    /// Point-in-time snapshot of the mutation, including version.
    pub payload: RecordPayload,
    /// Creation timestamp, used for queue ordering.
    pub client_time: DateTime<Utc>,
    /// Lifecycle state.
    pub status: OutboxStatus,
    /// Number of transmission attempts so far.
    pub try_count: i64,
}

impl OutboxItem {
    /// Creates a freshly queued item.
    #[must_use]
    pub fn queued(
        id: i64,
        op: ChangeOp,
        payload: RecordPayload,
        client_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            entity: payload.entity_kind(),
            entity_id: payload.record_id().to_string(),
            op,
            payload,
            client_time,
            status: OutboxStatus::Queued,
            try_count: 0,
        }
    }

    /// Key under which queued mutations are deduplicated.
    #[must_use]
    pub fn dedup_key(&self) -> (EntityKind, &str) {
        (self.entity, self.entity_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolodex_sync_protocol::ContactChange;

    fn payload(id: &str) -> RecordPayload {
        RecordPayload::Contact(ContactChange {
            id: id.into(),
            owner_id: None,
            given_name: "A".into(),
            family_name: "B".into(),
            emails: vec![],
            phones: vec![],
            note: None,
            created_at: None,
            updated_at: None,
            deleted_at: None,
            version: Some(1),
        })
    }

    #[test]
    fn status_names_roundtrip() {
        for status in [
            OutboxStatus::Queued,
            OutboxStatus::Sending,
            OutboxStatus::Done,
            OutboxStatus::Error,
        ] {
            assert_eq!(OutboxStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OutboxStatus::parse("pending"), None);
    }

    #[test]
    fn queued_item_derives_key_from_payload() {
        let item = OutboxItem::queued(1, ChangeOp::Insert, payload("c1"), Utc::now());
        assert_eq!(item.dedup_key(), (EntityKind::Contact, "c1"));
        assert_eq!(item.status, OutboxStatus::Queued);
        assert_eq!(item.try_count, 0);
    }
}
