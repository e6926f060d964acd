//! Contact and group repositories.
//!
//! Every mutation writes the record and its outbox row in one
//! transaction, so the pending-mutation queue can never drift from
//! the replica state it describes.

use crate::error::{CoreError, Result};
use crate::models::{Contact, ContactId, Group, GroupId};
use chrono::Utc;
use rolodex_sync_protocol::{ChangeOp, RecordPayload};
use rusqlite::{params, Row, Transaction};

use super::Database;

/// Writes one outbox row for a mutation snapshot.
fn enqueue(tx: &Transaction<'_>, op: ChangeOp, payload: &RecordPayload) -> Result<()> {
    tx.execute(
        "INSERT INTO outbox (entity, entity_id, op, payload, client_time)
         VALUES (?, ?, ?, ?, ?)",
        params![
            payload.entity_kind().as_str(),
            payload.record_id(),
            op.as_str(),
            serde_json::to_string(payload)?,
            Utc::now(),
        ],
    )?;
    Ok(())
}

/// Store operations for contacts.
pub struct ContactRepository<'a> {
    db: &'a Database,
}

impl<'a> ContactRepository<'a> {
    /// Creates a repository over the given database.
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn parse_contact(row: &Row<'_>) -> rusqlite::Result<Contact> {
        let id: String = row.get(0)?;
        let emails: String = row.get(4)?;
        let phones: String = row.get(5)?;
        Ok(Contact {
            id: id.parse().unwrap_or_default(),
            owner_id: row.get(1)?,
            given_name: row.get(2)?,
            family_name: row.get(3)?,
            emails: serde_json::from_str(&emails).unwrap_or_default(),
            phones: serde_json::from_str(&phones).unwrap_or_default(),
            note: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
            deleted_at: row.get(9)?,
            version: row.get(10)?,
            conflict: row.get::<_, i32>(11)? != 0,
        })
    }

    /// Upserts the contact and enqueues the matching outbox row.
    pub fn save(&self, contact: &Contact) -> Result<()> {
        self.db.with_transaction(|tx| {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM contacts WHERE id = ?)",
                params![contact.id.as_str()],
                |row| row.get(0),
            )?;

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
                     version = excluded.version,
                     conflict = excluded.conflict",
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

            let op = if exists {
                ChangeOp::Update
            } else {
                ChangeOp::Insert
            };
            enqueue(tx, op, &RecordPayload::Contact(contact.to_change()))
        })
    }

    /// Gets a live (non-tombstoned) contact by id.
    pub fn get(&self, id: &ContactId) -> Result<Option<Contact>> {
        self.db.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT id, owner_id, given_name, family_name, emails, phones, note,
                        created_at, updated_at, deleted_at, version, conflict
                 FROM contacts WHERE id = ? AND deleted_at IS NULL",
                params![id.as_str()],
                Self::parse_contact,
            );
            match result {
                Ok(contact) => Ok(Some(contact)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Lists live contacts ordered by name.
    pub fn list(&self) -> Result<Vec<Contact>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner_id, given_name, family_name, emails, phones, note,
                        created_at, updated_at, deleted_at, version, conflict
                 FROM contacts
                 WHERE deleted_at IS NULL
                 ORDER BY family_name, given_name",
            )?;
            let contacts = stmt
                .query_map([], Self::parse_contact)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(contacts)
        })
    }

    /// Tombstones the contact and enqueues the delete.
    pub fn delete(&self, id: &ContactId) -> Result<()> {
        self.db.with_transaction(|tx| {
            let mut contact = tx
                .query_row(
                    "SELECT id, owner_id, given_name, family_name, emails, phones, note,
                            created_at, updated_at, deleted_at, version, conflict
                     FROM contacts WHERE id = ? AND deleted_at IS NULL",
                    params![id.as_str()],
                    Self::parse_contact,
                )
                .map_err(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => CoreError::NotFound(id.to_string()),
                    other => CoreError::Sqlite(other),
                })?;

            contact.touch();
            contact.deleted_at = Some(contact.updated_at);

            tx.execute(
                "UPDATE contacts SET updated_at = ?, deleted_at = ?, version = ? WHERE id = ?",
                params![
                    contact.updated_at,
                    contact.deleted_at,
                    contact.version,
                    contact.id.as_str(),
                ],
            )?;

            enqueue(
                tx,
                ChangeOp::Delete,
                &RecordPayload::Contact(contact.to_change()),
            )
        })
    }
}

/// Store operations for groups.
pub struct GroupRepository<'a> {
    db: &'a Database,
}

impl<'a> GroupRepository<'a> {
    /// Creates a repository over the given database.
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn parse_group(row: &Row<'_>) -> rusqlite::Result<Group> {
        let id: String = row.get(0)?;
        let member_ids: String = row.get(3)?;
        Ok(Group {
            id: id.parse().unwrap_or_default(),
            owner_id: row.get(1)?,
            name: row.get(2)?,
            member_ids: serde_json::from_str::<Vec<String>>(&member_ids)
                .unwrap_or_default()
                .iter()
                .filter_map(|raw| raw.parse().ok())
                .collect(),
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
            deleted_at: row.get(6)?,
            version: row.get(7)?,
            conflict: row.get::<_, i32>(8)? != 0,
        })
    }

    /// Upserts the group and enqueues the matching outbox row.
    pub fn save(&self, group: &Group) -> Result<()> {
        self.db.with_transaction(|tx| {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM groups WHERE id = ?)",
                params![group.id.as_str()],
                |row| row.get(0),
            )?;

            let member_ids: Vec<String> = group.member_ids.iter().map(ContactId::as_str).collect();
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
                     version = excluded.version,
                     conflict = excluded.conflict",
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

            let op = if exists {
                ChangeOp::Update
            } else {
                ChangeOp::Insert
            };
            enqueue(tx, op, &RecordPayload::Group(group.to_change()))
        })
    }

    /// Gets a live group by id.
    pub fn get(&self, id: &GroupId) -> Result<Option<Group>> {
        self.db.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT id, owner_id, name, member_ids, created_at, updated_at,
                        deleted_at, version, conflict
                 FROM groups WHERE id = ? AND deleted_at IS NULL",
                params![id.as_str()],
                Self::parse_group,
            );
            match result {
                Ok(group) => Ok(Some(group)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Lists live groups ordered by name.
    pub fn list(&self) -> Result<Vec<Group>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner_id, name, member_ids, created_at, updated_at,
                        deleted_at, version, conflict
                 FROM groups
                 WHERE deleted_at IS NULL
                 ORDER BY name",
            )?;
            let groups = stmt
                .query_map([], Self::parse_group)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(groups)
        })
    }

    /// Tombstones the group and enqueues the delete.
    pub fn delete(&self, id: &GroupId) -> Result<()> {
        self.db.with_transaction(|tx| {
            let mut group = tx
                .query_row(
                    "SELECT id, owner_id, name, member_ids, created_at, updated_at,
                            deleted_at, version, conflict
                     FROM groups WHERE id = ? AND deleted_at IS NULL",
                    params![id.as_str()],
                    Self::parse_group,
                )
                .map_err(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => CoreError::NotFound(id.to_string()),
                    other => CoreError::Sqlite(other),
                })?;

            group.touch();
            group.deleted_at = Some(group.updated_at);

            tx.execute(
                "UPDATE groups SET updated_at = ?, deleted_at = ?, version = ? WHERE id = ?",
                params![
                    group.updated_at,
                    group.deleted_at,
                    group.version,
                    group.id.as_str(),
                ],
            )?;

            enqueue(tx, ChangeOp::Delete, &RecordPayload::Group(group.to_change()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn outbox_rows(db: &Database) -> Vec<(String, String, String)> {
        db.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT entity, entity_id, op FROM outbox ORDER BY id")
                .unwrap();
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })
                .unwrap()
                .collect::<rusqlite::Result<Vec<_>>>()
                .unwrap();
            Ok(rows)
        })
        .unwrap()
    }

    #[test]
    fn save_and_get_contact() {
        let db = setup();
        let repo = ContactRepository::new(&db);

        let mut contact = Contact::new("u1", "Ada", "Lovelace");
        contact.emails.push("ada@example.com".into());
        repo.save(&contact).unwrap();

        let fetched = repo.get(&contact.id).unwrap().unwrap();
        assert_eq!(fetched, contact);
    }

    #[test]
    fn save_enqueues_insert_then_update() {
        let db = setup();
        let repo = ContactRepository::new(&db);

        let mut contact = Contact::new("u1", "Ada", "Lovelace");
        repo.save(&contact).unwrap();

        contact.given_name = "Augusta".into();
        contact.touch();
        repo.save(&contact).unwrap();

        let rows = outbox_rows(&db);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].2, "insert");
        assert_eq!(rows[1].2, "update");
        assert_eq!(rows[0].1, contact.id.as_str());
    }

    #[test]
    fn delete_tombstones_and_enqueues() {
        let db = setup();
        let repo = ContactRepository::new(&db);

        let contact = Contact::new("u1", "Ada", "Lovelace");
        repo.save(&contact).unwrap();
        repo.delete(&contact.id).unwrap();

        // Gone from live reads.
        assert!(repo.get(&contact.id).unwrap().is_none());
        assert!(repo.list().unwrap().is_empty());

        // But the row is retained as a tombstone.
        let deleted: Option<String> = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT deleted_at FROM contacts WHERE id = ?",
                    params![contact.id.as_str()],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert!(deleted.is_some());

        let rows = outbox_rows(&db);
        assert_eq!(rows.last().unwrap().2, "delete");
    }

    #[test]
    fn delete_missing_contact_is_not_found() {
        let db = setup();
        let repo = ContactRepository::new(&db);
        let err = repo.delete(&ContactId::new()).unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn list_orders_by_name() {
        let db = setup();
        let repo = ContactRepository::new(&db);

        repo.save(&Contact::new("u1", "Carol", "Zeta")).unwrap();
        repo.save(&Contact::new("u1", "Alice", "Young")).unwrap();

        let names: Vec<String> = repo
            .list()
            .unwrap()
            .iter()
            .map(Contact::display_name)
            .collect();
        assert_eq!(names, vec!["Alice Young", "Carol Zeta"]);
    }

    #[test]
    fn group_save_get_delete() {
        let db = setup();
        let repo = GroupRepository::new(&db);

        let mut group = Group::new("u1", "Family");
        group.member_ids.push(ContactId::new());
        repo.save(&group).unwrap();

        let fetched = repo.get(&group.id).unwrap().unwrap();
        assert_eq!(fetched, group);

        repo.delete(&group.id).unwrap();
        assert!(repo.get(&group.id).unwrap().is_none());

        let rows = outbox_rows(&db);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "group");
        assert_eq!(rows[1].2, "delete");
    }
}
