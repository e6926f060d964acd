//! Request and response bodies.

use crate::record::{ChangeOp, ContactChange, EntityKind, GroupChange, RecordPayload};
use serde::{Deserialize, Serialize};

/// Body of `POST /sync/push`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    /// Client wall-clock time when the batch was assembled, RFC 3339.
    pub client_time: String,
    /// Deduplicated batch in transmission order.
    pub batch: Vec<PushItem>,
}

/// One outbox mutation inside a push batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushItem {
    /// Client-local outbox item id, echoed back in `appliedIds`.
    pub id: i64,
    /// Entity kind of the mutated record.
    pub entity: EntityKind,
    /// Identifier of the mutated record.
    pub entity_id: String,
    /// Kind of mutation.
    pub op: ChangeOp,
    /// Advisory record version at mutation time.
    pub version: i64,
    /// Point-in-time snapshot of the mutation.
    pub payload: RecordPayload,
}

/// Body of the `POST /sync/push` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    /// Outbox item ids the server reports as applied.
    #[serde(default)]
    pub applied_ids: Vec<i64>,
    /// Number of batch items rejected as conflicts.
    #[serde(default)]
    pub conflicts: u32,
    /// Number of batch items rejected for other reasons.
    #[serde(default)]
    pub errors: u32,
}

impl PushResponse {
    /// Response reporting every listed item as applied.
    pub fn applied(applied_ids: Vec<i64>) -> Self {
        Self {
            applied_ids,
            conflicts: 0,
            errors: 0,
        }
    }
}

/// Body of the `GET /sync/pull` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    /// Server's authoritative "as of" timestamp, RFC 3339.
    pub server_time: String,
    /// Contact records changed since the requested watermark.
    #[serde(default)]
    pub contacts: Vec<ContactChange>,
    /// Group records changed since the requested watermark.
    #[serde(default)]
    pub groups: Vec<GroupChange>,
}

impl PullResponse {
    /// An empty delta as of the given server time.
    pub fn empty(server_time: impl Into<String>) -> Self {
        Self {
            server_time: server_time.into(),
            contacts: Vec::new(),
            groups: Vec::new(),
        }
    }
}
