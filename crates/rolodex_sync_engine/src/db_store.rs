//! SQLite-backed implementations of the engine's store traits.
//!
//! One [`DatabaseStore`] plays all four roles (outbox, replica,
//! watermark, log) over a shared [`Database`], so every status
//! transition and every merge runs inside that database's
//! transactions.

use crate::error::SyncResult;
use crate::orchestrator::{SyncLogStore, WatermarkStore};
use crate::outbox::OutboxStore;
use crate::pull::{MergePlan, ReplicaStore};
use chrono::{DateTime, Utc};
use rolodex_core::{
    Contact, CoreError, Database, Group, OutboxItem, OutboxStatus, PullStats, PushStats,
    SyncLogEntry,
};
use rolodex_sync_protocol::{
    format_instant, parse_instant, ChangeOp, ContactChange, EntityKind, GroupChange,
};
use rusqlite::{params, Row, Transaction};
use std::sync::Arc;

const WATERMARK_KEY: &str = "last_sync_at";

/// Engine store adapter over the shared local database.
#[derive(Clone)]
pub struct DatabaseStore {
    db: Arc<Database>,
}

impl DatabaseStore {
    /// Creates an adapter over the given database.
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Returns the underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    fn set_status(&self, ids: &[i64], status: OutboxStatus, bump_tries: bool) -> SyncResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.db.with_transaction(|tx| {
            let sql = if bump_tries {
                "UPDATE outbox SET status = ?, try_count = try_count + 1 WHERE id = ?"
            } else {
                "UPDATE outbox SET status = ? WHERE id = ?"
            };
            let mut stmt = tx.prepare(sql)?;
            for id in ids {
                stmt.execute(params![status.as_str(), id])?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

fn parse_outbox_row(row: &Row<'_>) -> rusqlite::Result<(i64, String, String, String, String, DateTime<Utc>, String, i64)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

impl OutboxStore for DatabaseStore {
    fn requeue_errors(&self) -> SyncResult<usize> {
        let changed = self.db.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE outbox SET status = 'queued' WHERE status = 'error'",
                [],
            )?)
        })?;
        Ok(changed)
    }

    fn queued_items(&self) -> SyncResult<Vec<OutboxItem>> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, entity, entity_id, op, payload, client_time, status, try_count
                 FROM outbox
                 WHERE status = 'queued'
                 ORDER BY client_time, id",
            )?;
            let rows = stmt
                .query_map([], parse_outbox_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        let mut items = Vec::with_capacity(rows.len());
        for (id, entity, entity_id, op, payload, client_time, status, try_count) in rows {
            let entity = EntityKind::parse(&entity)
                .ok_or_else(|| CoreError::InvalidInput(format!("unknown entity: {entity}")))?;
            let op = ChangeOp::parse(&op)
                .ok_or_else(|| CoreError::InvalidInput(format!("unknown op: {op}")))?;
            let status = OutboxStatus::parse(&status)
                .ok_or_else(|| CoreError::InvalidInput(format!("unknown status: {status}")))?;
            let payload =
                serde_json::from_str(&payload).map_err(CoreError::Serialization)?;
            items.push(OutboxItem {
                id,
                entity,
                entity_id,
                op,
                payload,
                client_time,
                status,
                try_count,
            });
        }
        Ok(items)
    }

    fn mark_sending(&self, ids: &[i64]) -> SyncResult<()> {
        self.set_status(ids, OutboxStatus::Sending, true)
    }

    fn mark_done(&self, ids: &[i64]) -> SyncResult<()> {
        self.set_status(ids, OutboxStatus::Done, false)
    }

    fn mark_error(&self, ids: &[i64]) -> SyncResult<()> {
        self.set_status(ids, OutboxStatus::Error, false)
    }
}

/// Writes one merged contact row. Remote writes never enqueue outbox
/// rows; that would echo the server's own changes back at it.
fn upsert_contact(
    tx: &Transaction<'_>,
    change: &ContactChange,
    tombstone: bool,
    now: DateTime<Utc>,
) -> rolodex_core::Result<()> {
    let mut contact = Contact::from_change(change, now)?;
    if tombstone && contact.deleted_at.is_none() {
        contact.deleted_at = Some(contact.updated_at);
    }
    tx.execute(
        "INSERT INTO contacts
             (id, owner_id, given_name, family_name, emails, phones, note,
              created_at, updated_at, deleted_at, version, conflict)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             owner_id = excluded.owner_id,
             given_name = excluded.given_name,
             family_name = excluded.family_name,
             emails = excluded.emails,
             phones = excluded.phones,
             note = excluded.note,
             updated_at = excluded.updated_at,
             deleted_at = excluded.deleted_at,
             version = excluded.version",
        params![
            contact.id.as_str(),
            contact.owner_id,
            contact.given_name,
            contact.family_name,
            serde_json::to_string(&contact.emails)?,
            serde_json::to_string(&contact.phones)?,
            contact.note,
            contact.created_at,
            contact.updated_at,
            contact.deleted_at,
            contact.version,
            i32::from(contact.conflict),
        ],
    )?;
    Ok(())
}

fn upsert_group(
    tx: &Transaction<'_>,
    change: &GroupChange,
    tombstone: bool,
    now: DateTime<Utc>,
) -> rolodex_core::Result<()> {
    let mut group = Group::from_change(change, now)?;
    if tombstone && group.deleted_at.is_none() {
        group.deleted_at = Some(group.updated_at);
    }
    let member_ids: Vec<String> = group.member_ids.iter().map(|id| id.as_str()).collect();
    tx.execute(
        "INSERT INTO groups
             (id, owner_id, name, member_ids, created_at, updated_at,
              deleted_at, version, conflict)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             owner_id = excluded.owner_id,
             name = excluded.name,
             member_ids = excluded.member_ids,
             updated_at = excluded.updated_at,
             deleted_at = excluded.deleted_at,
             version = excluded.version",
        params![
            group.id.as_str(),
            group.owner_id,
            group.name,
            serde_json::to_string(&member_ids)?,
            group.created_at,
            group.updated_at,
            group.deleted_at,
            group.version,
            i32::from(group.conflict),
        ],
    )?;
    Ok(())
}

impl ReplicaStore for DatabaseStore {
    fn local_updated_at(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> SyncResult<Option<DateTime<Utc>>> {
        let sql = match kind {
            EntityKind::Contact => "SELECT updated_at FROM contacts WHERE id = ?",
            EntityKind::Group => "SELECT updated_at FROM groups WHERE id = ?",
        };
        let instant = self.db.with_conn(|conn| {
            match conn.query_row(sql, params![id], |row| row.get::<_, DateTime<Utc>>(0)) {
                Ok(at) => Ok(Some(at)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })?;
        Ok(instant)
    }

    fn apply_merge(&self, plan: &MergePlan) -> SyncResult<()> {
        let now = Utc::now();
        self.db.with_transaction(|tx| {
            for change in &plan.contact_upserts {
                upsert_contact(tx, change, false, now)?;
            }
            for change in &plan.contact_deletes {
                upsert_contact(tx, change, true, now)?;
            }
            for change in &plan.group_upserts {
                upsert_group(tx, change, false, now)?;
            }
            for change in &plan.group_deletes {
                upsert_group(tx, change, true, now)?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

impl WatermarkStore for DatabaseStore {
    fn watermark(&self) -> SyncResult<Option<DateTime<Utc>>> {
        let raw = self.db.with_conn(|conn| {
            match conn.query_row(
                "SELECT value FROM sync_meta WHERE key = ?",
                params![WATERMARK_KEY],
                |row| row.get::<_, String>(0),
            ) {
                Ok(value) => Ok(Some(value)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })?;
        Ok(raw.as_deref().and_then(parse_instant))
    }

    fn set_watermark(&self, at: DateTime<Utc>) -> SyncResult<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sync_meta (key, value) VALUES (?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![WATERMARK_KEY, format_instant(at)],
            )?;
            Ok(())
        })?;
        Ok(())
    }
}

fn parse_log_row(row: &Row<'_>) -> rusqlite::Result<SyncLogEntry> {
    Ok(SyncLogEntry {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        success: row.get::<_, i32>(3)? != 0,
        push: PushStats {
            attempted: row.get(4)?,
            sent: row.get(5)?,
            applied: row.get(6)?,
            conflicts: row.get(7)?,
            errors: row.get(8)?,
        },
        pull: PullStats {
            contacts_upserted: row.get(9)?,
            contacts_deleted: row.get(10)?,
            groups_upserted: row.get(11)?,
            groups_deleted: row.get(12)?,
        },
        error: row.get(13)?,
        watermark_before: row.get(14)?,
        watermark_after: row.get(15)?,
        duration_ms: row.get(16)?,
    })
}

const LOG_COLUMNS: &str = "id, started_at, finished_at, success,
     push_attempted, push_sent, push_applied, push_conflicts, push_errors,
     pull_contacts_upserted, pull_contacts_deleted,
     pull_groups_upserted, pull_groups_deleted,
     error, watermark_before, watermark_after, duration_ms";

impl SyncLogStore for DatabaseStore {
    fn append(&self, entry: &SyncLogEntry) -> SyncResult<i64> {
        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sync_log
                     (started_at, finished_at, success,
                      push_attempted, push_sent, push_applied, push_conflicts, push_errors,
                      pull_contacts_upserted, pull_contacts_deleted,
                      pull_groups_upserted, pull_groups_deleted,
                      error, watermark_before, watermark_after, duration_ms)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    entry.started_at,
                    entry.finished_at,
                    i32::from(entry.success),
                    entry.push.attempted,
                    entry.push.sent,
                    entry.push.applied,
                    entry.push.conflicts,
                    entry.push.errors,
                    entry.pull.contacts_upserted,
                    entry.pull.contacts_deleted,
                    entry.pull.groups_upserted,
                    entry.pull.groups_deleted,
                    entry.error,
                    entry.watermark_before,
                    entry.watermark_after,
                    entry.duration_ms,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        Ok(id)
    }

    fn recent(&self, limit: usize, failures_only: bool) -> SyncResult<Vec<SyncLogEntry>> {
        let sql = if failures_only {
            format!(
                "SELECT {LOG_COLUMNS} FROM sync_log WHERE success = 0 ORDER BY id DESC LIMIT ?"
            )
        } else {
            format!("SELECT {LOG_COLUMNS} FROM sync_log ORDER BY id DESC LIMIT ?")
        };
        let entries = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let entries = stmt
                .query_map(params![limit as i64], parse_log_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use pretty_assertions::assert_eq;
    use rolodex_core::ContactRepository;

    fn store() -> DatabaseStore {
        DatabaseStore::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    fn contact_change(id: &str, given_name: &str, updated_at: &str) -> ContactChange {
        ContactChange {
            id: id.into(),
            owner_id: Some("u1".into()),
            given_name: given_name.into(),
            family_name: "Test".into(),
            emails: vec![],
            phones: vec![],
            note: None,
            created_at: None,
            updated_at: Some(updated_at.into()),
            deleted_at: None,
            version: Some(1),
        }
    }

    #[test]
    fn queued_items_roundtrip_through_repository() {
        let store = store();
        let contact = Contact::new("u1", "Ada", "Lovelace");
        ContactRepository::new(store.database()).save(&contact).unwrap();

        let items = store.queued_items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].entity, EntityKind::Contact);
        assert_eq!(items[0].entity_id, contact.id.as_str());
        assert_eq!(items[0].op, ChangeOp::Insert);
        assert_eq!(items[0].payload.record_id(), contact.id.as_str());
    }

    #[test]
    fn status_transitions_and_requeue() {
        let store = store();
        let contact = Contact::new("u1", "Ada", "Lovelace");
        ContactRepository::new(store.database()).save(&contact).unwrap();
        let id = store.queued_items().unwrap()[0].id;

        store.mark_sending(&[id]).unwrap();
        assert!(store.queued_items().unwrap().is_empty());

        store.mark_error(&[id]).unwrap();
        assert_eq!(store.requeue_errors().unwrap(), 1);
        let items = store.queued_items().unwrap();
        assert_eq!(items[0].try_count, 1);

        store.mark_done(&[id]).unwrap();
        assert!(store.queued_items().unwrap().is_empty());
        assert_eq!(store.requeue_errors().unwrap(), 0);
    }

    #[test]
    fn watermark_roundtrip() {
        let store = store();
        assert_eq!(store.watermark().unwrap(), None);

        let first = parse_instant("2024-05-01T10:00:00Z").unwrap();
        store.set_watermark(first).unwrap();
        assert_eq!(store.watermark().unwrap(), Some(first));

        let second = parse_instant("2024-05-01T11:00:00Z").unwrap();
        store.set_watermark(second).unwrap();
        assert_eq!(store.watermark().unwrap(), Some(second));
    }

    #[test]
    fn watermark_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rolodex.db");
        let at = parse_instant("2024-05-01T10:00:00Z").unwrap();

        {
            let store = DatabaseStore::new(Arc::new(Database::open(&path).unwrap()));
            store.set_watermark(at).unwrap();
        }

        let store = DatabaseStore::new(Arc::new(Database::open(&path).unwrap()));
        assert_eq!(store.watermark().unwrap(), Some(at));
    }

    #[test]
    fn apply_merge_upserts_and_tombstones() {
        let store = store();
        let live = Contact::new("u1", "Ada", "Lovelace");
        let dead = Contact::new("u1", "Grace", "Hopper");

        let mut tombstone = dead.to_change();
        tombstone.deleted_at = tombstone.updated_at.clone();

        let plan = MergePlan {
            contact_upserts: vec![live.to_change()],
            contact_deletes: vec![tombstone],
            group_upserts: vec![],
            group_deletes: vec![],
        };
        store.apply_merge(&plan).unwrap();

        let repo = ContactRepository::new(store.database());
        assert!(repo.get(&live.id).unwrap().is_some());
        assert!(repo.get(&dead.id).unwrap().is_none());
        assert!(store
            .local_updated_at(EntityKind::Contact, &dead.id.as_str())
            .unwrap()
            .is_some());
        // Remote writes never enqueue.
        assert!(store.queued_items().unwrap().is_empty());
    }

    #[test]
    fn apply_merge_is_all_or_nothing() {
        let store = store();
        let good = Contact::new("u1", "Ada", "Lovelace").to_change();
        let mut bad = Contact::new("u1", "Grace", "Hopper").to_change();
        bad.id = "not-a-uuid".into();

        let plan = MergePlan {
            contact_upserts: vec![good.clone(), bad],
            contact_deletes: vec![],
            group_upserts: vec![],
            group_deletes: vec![],
        };
        let result = store.apply_merge(&plan);
        assert!(matches!(result, Err(SyncError::Store(_))));
        assert_eq!(
            store
                .local_updated_at(EntityKind::Contact, &good.id)
                .unwrap(),
            None
        );
    }

    #[test]
    fn log_append_and_recent() {
        let store = store();
        for (i, success) in [true, false, true].into_iter().enumerate() {
            let entry = SyncLogEntry {
                id: 0,
                started_at: Utc::now(),
                finished_at: Utc::now(),
                success,
                push: PushStats {
                    attempted: i as u32,
                    ..Default::default()
                },
                pull: PullStats::default(),
                error: (!success).then(|| "offline".to_string()),
                watermark_before: None,
                watermark_after: parse_instant("2024-05-01T10:00:00Z"),
                duration_ms: 12,
            };
            let id = store.append(&entry).unwrap();
            assert_eq!(id, i as i64 + 1);
        }

        let all = store.recent(10, false).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, 3);
        assert_eq!(
            all[0].watermark_after,
            parse_instant("2024-05-01T10:00:00Z")
        );

        let failures = store.recent(10, true).unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].error.as_deref(), Some("offline"));

        let limited = store.recent(2, false).unwrap();
        assert_eq!(limited.len(), 2);
    }
}
