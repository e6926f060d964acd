//! Pull phase: fetches the remote delta and merges it last-write-wins.

use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::error::{SyncError, SyncResult};
use crate::transport::{AccessToken, SyncTransport};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rolodex_core::PullStats;
use rolodex_sync_protocol::{format_instant, parse_instant, ContactChange, EntityKind, GroupChange};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// The record writes one pull decided to apply.
///
/// Computed read-only against the replica, then handed to
/// [`ReplicaStore::apply_merge`] to execute in a single transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergePlan {
    /// Contact inserts and updates that won their LWW comparison.
    pub contact_upserts: Vec<ContactChange>,
    /// Contact tombstones that won their LWW comparison.
    pub contact_deletes: Vec<ContactChange>,
    /// Group inserts and updates that won their LWW comparison.
    pub group_upserts: Vec<GroupChange>,
    /// Group tombstones that won their LWW comparison.
    pub group_deletes: Vec<GroupChange>,
}

impl MergePlan {
    /// Returns true when nothing won.
    pub fn is_empty(&self) -> bool {
        self.contact_upserts.is_empty()
            && self.contact_deletes.is_empty()
            && self.group_upserts.is_empty()
            && self.group_deletes.is_empty()
    }

    /// Counters matching the plan.
    pub fn stats(&self) -> PullStats {
        PullStats {
            contacts_upserted: self.contact_upserts.len() as u32,
            contacts_deleted: self.contact_deletes.len() as u32,
            groups_upserted: self.group_upserts.len() as u32,
            groups_deleted: self.group_deletes.len() as u32,
        }
    }
}

/// Read and write access to the local replica for merges.
pub trait ReplicaStore: Send + Sync {
    /// Returns the local record's authoritative mutation instant.
    ///
    /// `None` means no local record exists (live or tombstoned).
    fn local_updated_at(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> SyncResult<Option<DateTime<Utc>>>;

    /// Applies every write in the plan inside one transaction.
    ///
    /// Either the whole plan lands or none of it does.
    fn apply_merge(&self, plan: &MergePlan) -> SyncResult<()>;
}

/// The result of one successful pull.
#[derive(Debug, Clone, Copy)]
pub struct PullOutcome {
    /// Aggregate counters.
    pub stats: PullStats,
    /// The server's authoritative "as of" instant for this delta.
    pub server_time: DateTime<Utc>,
}

/// Decides whether a remote record overrides local state.
///
/// Malformed or missing remote timestamps never win. Ties favor the
/// local record for updates; a tombstone wins a tie so that a delete
/// and an edit stamped at the same instant converge on deleted.
fn remote_wins(
    local: Option<DateTime<Utc>>,
    remote: Option<DateTime<Utc>>,
    tombstone: bool,
) -> bool {
    let Some(local) = local else {
        // No local record: insert verbatim, tombstones included, so the
        // delete cannot resurrect through a later full pull.
        return true;
    };
    let Some(remote) = remote else {
        return false;
    };
    if tombstone {
        local <= remote
    } else {
        remote > local
    }
}

/// Fetches the delta since a watermark and merges it into the replica.
pub struct DeltaPuller<'a> {
    transport: &'a dyn SyncTransport,
    replica: &'a dyn ReplicaStore,
    diagnostics: &'a dyn Diagnostics,
}

impl<'a> DeltaPuller<'a> {
    /// Creates a puller over the given transport and replica.
    pub fn new(
        transport: &'a dyn SyncTransport,
        replica: &'a dyn ReplicaStore,
        diagnostics: &'a dyn Diagnostics,
    ) -> Self {
        Self {
            transport,
            replica,
            diagnostics,
        }
    }

    /// Runs one pull: fetch, resolve, apply atomically.
    pub fn pull(
        &self,
        token: &AccessToken,
        since: Option<DateTime<Utc>>,
    ) -> SyncResult<PullOutcome> {
        let since_raw = since.map(format_instant);
        let response = self.transport.pull(token, since_raw.as_deref())?;

        let server_time = parse_instant(&response.server_time).ok_or_else(|| {
            SyncError::Protocol(format!(
                "unparseable serverTime: {:?}",
                response.server_time
            ))
        })?;

        let mut plan = MergePlan::default();
        for change in &response.contacts {
            let local = self
                .replica
                .local_updated_at(EntityKind::Contact, &change.id)?;
            if !remote_wins(local, change.change_instant(), change.is_tombstone()) {
                continue;
            }
            if change.is_tombstone() {
                plan.contact_deletes.push(change.clone());
            } else {
                plan.contact_upserts.push(change.clone());
            }
        }
        for change in &response.groups {
            let local = self.replica.local_updated_at(EntityKind::Group, &change.id)?;
            if !remote_wins(local, change.change_instant(), change.is_tombstone()) {
                continue;
            }
            if change.is_tombstone() {
                plan.group_deletes.push(change.clone());
            } else {
                plan.group_upserts.push(change.clone());
            }
        }

        let stats = plan.stats();
        if !plan.is_empty() {
            self.replica.apply_merge(&plan)?;
        }
        self.diagnostics.record(DiagnosticEvent::DeltaMerged {
            upserts: stats.contacts_upserted + stats.groups_upserted,
            deletes: stats.contacts_deleted + stats.groups_deleted,
        });

        Ok(PullOutcome { stats, server_time })
    }
}

/// In-memory replica for engine tests.
///
/// Stores records in wire form; `fail_next_apply` simulates a store
/// that dies mid-merge, which must leave the replica untouched.
#[derive(Default)]
pub struct MemoryReplica {
    contacts: Mutex<HashMap<String, ContactChange>>,
    groups: Mutex<HashMap<String, GroupChange>>,
    fail_next_apply: AtomicBool,
}

impl MemoryReplica {
    /// Creates an empty replica.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a contact record.
    pub fn seed_contact(&self, change: ContactChange) {
        self.contacts.lock().insert(change.id.clone(), change);
    }

    /// Seeds a group record.
    pub fn seed_group(&self, change: GroupChange) {
        self.groups.lock().insert(change.id.clone(), change);
    }

    /// Returns the stored contact, if any.
    pub fn contact(&self, id: &str) -> Option<ContactChange> {
        self.contacts.lock().get(id).cloned()
    }

    /// Returns the stored group, if any.
    pub fn group(&self, id: &str) -> Option<GroupChange> {
        self.groups.lock().get(id).cloned()
    }

    /// Makes the next `apply_merge` fail without writing anything.
    pub fn fail_next_apply(&self) {
        self.fail_next_apply.store(true, Ordering::SeqCst);
    }
}

impl ReplicaStore for MemoryReplica {
    fn local_updated_at(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> SyncResult<Option<DateTime<Utc>>> {
        let instant = match kind {
            EntityKind::Contact => self
                .contacts
                .lock()
                .get(id)
                .and_then(ContactChange::change_instant),
            EntityKind::Group => self
                .groups
                .lock()
                .get(id)
                .and_then(GroupChange::change_instant),
        };
        Ok(instant)
    }

    fn apply_merge(&self, plan: &MergePlan) -> SyncResult<()> {
        if self.fail_next_apply.swap(false, Ordering::SeqCst) {
            return Err(SyncError::Store(rolodex_core::CoreError::InvalidInput(
                "replica unavailable".into(),
            )));
        }
        let mut contacts = self.contacts.lock();
        for change in plan.contact_upserts.iter().chain(&plan.contact_deletes) {
            contacts.insert(change.id.clone(), change.clone());
        }
        let mut groups = self.groups.lock();
        for change in plan.group_upserts.iter().chain(&plan.group_deletes) {
            groups.insert(change.id.clone(), change.clone());
        }
        Ok(())
    }
}
