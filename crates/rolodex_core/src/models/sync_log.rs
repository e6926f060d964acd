//! Sync log entry model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate counters for one push phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushStats {
    /// Items selected into batches this cycle.
    pub attempted: u32,
    /// Items actually transmitted (batches that reached the server).
    pub sent: u32,
    /// Items the server confirmed applied.
    pub applied: u32,
    /// Items the server rejected as conflicts.
    pub conflicts: u32,
    /// Items that ended the cycle in error status.
    pub errors: u32,
}

/// Aggregate counters for one pull phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullStats {
    /// Contact records inserted or updated.
    pub contacts_upserted: u32,
    /// Contact tombstones applied.
    pub contacts_deleted: u32,
    /// Group records inserted or updated.
    pub groups_upserted: u32,
    /// Group tombstones applied.
    pub groups_deleted: u32,
}

impl PullStats {
    /// Total records touched by the merge.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.contacts_upserted + self.contacts_deleted + self.groups_upserted + self.groups_deleted
    }
}

/// Immutable record of one orchestration cycle.
///
/// Created exactly once per cycle, whether the cycle succeeded or
/// failed at any phase; never mutated after being written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    /// Row id (0 until persisted).
    pub id: i64,
    /// Cycle start time.
    pub started_at: DateTime<Utc>,
    /// Cycle end time.
    pub finished_at: DateTime<Utc>,
    /// Whether both phases completed and the pull merged cleanly.
    pub success: bool,
    /// Push phase counters.
    pub push: PushStats,
    /// Pull phase counters.
    pub pull: PullStats,
    /// Error message when the cycle failed.
    pub error: Option<String>,
    /// Watermark before the cycle ran.
    pub watermark_before: Option<DateTime<Utc>>,
    /// Watermark after the cycle (unchanged unless the pull succeeded).
    pub watermark_after: Option<DateTime<Utc>>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_stats_total() {
        let stats = PullStats {
            contacts_upserted: 2,
            contacts_deleted: 1,
            groups_upserted: 3,
            groups_deleted: 0,
        };
        assert_eq!(stats.total(), 6);
        assert_eq!(PullStats::default().total(), 0);
    }
}
