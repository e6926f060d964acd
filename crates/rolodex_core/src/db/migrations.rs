//! Database migrations.

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version.
const CURRENT_VERSION: i32 = 2;

/// Runs all pending migrations.
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;
    if version < CURRENT_VERSION {
        tracing::debug!(from = version, to = CURRENT_VERSION, "migrating schema");
    }

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    debug_assert!(get_version(conn)? == CURRENT_VERSION);
    Ok(())
}

/// Gets the current schema version.
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Version 1: initial schema.
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS contacts (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL DEFAULT '',
            given_name TEXT NOT NULL DEFAULT '',
            family_name TEXT NOT NULL DEFAULT '',
            emails TEXT NOT NULL DEFAULT '[]',
            phones TEXT NOT NULL DEFAULT '[]',
            note TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT,
            version INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_contacts_updated ON contacts(updated_at DESC);
        CREATE INDEX IF NOT EXISTS idx_contacts_deleted ON contacts(deleted_at);

        CREATE TABLE IF NOT EXISTS groups (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL DEFAULT '',
            name TEXT NOT NULL DEFAULT '',
            member_ids TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT,
            version INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_groups_updated ON groups(updated_at DESC);

        CREATE TABLE IF NOT EXISTS outbox (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            op TEXT NOT NULL,
            payload TEXT NOT NULL,
            client_time TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'queued',
            try_count INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_outbox_status ON outbox(status);

        CREATE TABLE IF NOT EXISTS sync_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sync_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            success INTEGER NOT NULL,
            push_attempted INTEGER NOT NULL DEFAULT 0,
            push_sent INTEGER NOT NULL DEFAULT 0,
            push_applied INTEGER NOT NULL DEFAULT 0,
            push_conflicts INTEGER NOT NULL DEFAULT 0,
            push_errors INTEGER NOT NULL DEFAULT 0,
            pull_contacts_upserted INTEGER NOT NULL DEFAULT 0,
            pull_contacts_deleted INTEGER NOT NULL DEFAULT 0,
            pull_groups_upserted INTEGER NOT NULL DEFAULT 0,
            pull_groups_deleted INTEGER NOT NULL DEFAULT 0,
            error TEXT,
            watermark_before TEXT,
            watermark_after TEXT,
            duration_ms INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_sync_log_started ON sync_log(started_at DESC);

        INSERT INTO schema_version (version) VALUES (1);
        COMMIT;",
    )?;
    Ok(())
}

/// Version 2: advisory conflict flags and the outbox dedup index.
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;
        ALTER TABLE contacts ADD COLUMN conflict INTEGER NOT NULL DEFAULT 0;
        ALTER TABLE groups ADD COLUMN conflict INTEGER NOT NULL DEFAULT 0;
        CREATE INDEX IF NOT EXISTS idx_outbox_entity ON outbox(entity, entity_id);
        INSERT INTO schema_version (version) VALUES (2);
        COMMIT;",
    )?;
    Ok(())
}
