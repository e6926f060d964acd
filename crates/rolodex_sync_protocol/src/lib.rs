//! # Rolodex Sync Protocol
//!
//! Wire types for the Rolodex push/pull synchronization protocol.
//!
//! This crate provides:
//! - Push request/response bodies (`POST /sync/push`)
//! - Pull response body (`GET /sync/pull?since=...`)
//! - Change records for contacts and groups with tombstone markers
//! - RFC 3339 timestamp parsing with lenient fallbacks
//!
//! All bodies are JSON. Envelope fields are camelCase on the wire
//! (`clientTime`, `appliedIds`, `serverTime`); record fields keep
//! their snake_case column names (`updated_at`, `deleted_at`).
//!
//! Timestamps travel as raw strings and are parsed at the merge
//! boundary: a malformed or missing remote timestamp must never
//! override local state, so parsing returns `Option` and callers
//! treat `None` as older than any local record.

mod messages;
mod record;
mod time;

pub use messages::{PullResponse, PushItem, PushRequest, PushResponse};
pub use record::{ChangeOp, ContactChange, EntityKind, GroupChange, RecordPayload};
pub use time::{format_instant, parse_instant};
