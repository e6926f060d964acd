//! # Rolodex Core
//!
//! Replica-side data model and SQLite store for the Rolodex
//! offline-first contacts application.
//!
//! This crate provides:
//! - `Contact` and `Group` entities with soft-delete tombstones and
//!   advisory version/conflict fields
//! - The outbox item model (pending local mutation queue rows)
//! - The sync log entry model (one append-only row per sync cycle)
//! - A rusqlite-backed `Database` with versioned migrations
//! - Repositories that mutate a record and enqueue the matching
//!   outbox row inside one transaction
//!
//! ## Key Invariants
//!
//! - Records are never hard-deleted; deletion sets `deleted_at`
//! - Every repository mutation and its outbox row commit atomically
//! - `updated_at` is the authoritative mutation timestamp used by
//!   last-write-wins merging

mod db;
mod error;
mod models;

pub use db::{migrations, ContactRepository, Database, GroupRepository};
pub use error::{CoreError, Result};
pub use models::{
    Contact, ContactId, Group, GroupId, OutboxItem, OutboxStatus, PullStats, PushStats,
    SyncLogEntry,
};
