//! Replica data model.

mod contact;
mod group;
mod outbox;
mod sync_log;

pub use contact::{Contact, ContactId};
pub use group::{Group, GroupId};
pub use outbox::{OutboxItem, OutboxStatus};
pub use sync_log::{PullStats, PushStats, SyncLogEntry};
