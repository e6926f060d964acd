//! # Rolodex Sync Engine
//!
//! Offline-first synchronization engine for the Rolodex contact store.
//!
//! This crate provides:
//! - Outbox deduplication and bounded batch selection
//! - Push processing with per-item server verdicts
//! - Delta pull with last-write-wins merge, deletes included
//! - A push-then-pull orchestrator with a monotonic watermark
//! - An append-only cycle log for diagnostics
//! - HTTP transport abstraction
//!
//! ## Architecture
//!
//! The engine implements a **push-then-pull** synchronization model:
//! 1. Drain the local outbox in deduplicated batches
//! 2. Fetch remote changes since the watermark
//! 3. Merge them last-write-wins inside one transaction
//!
//! Local edits keep flowing while offline; the outbox holds their net
//! effect until a cycle can transmit it.
//!
//! ## Key Invariants
//!
//! - The watermark only advances, and only to a server-supplied time
//!   returned with a successfully merged delta
//! - A pull is all-or-nothing from the replica's point of view
//! - At most one cycle runs at a time per engine instance
//! - Every cycle writes exactly one log entry
//! - Failed items return to the queue; nothing is silently dropped

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod db_store;
mod diagnostics;
mod error;
mod http;
mod orchestrator;
mod outbox;
mod pull;
mod push;
mod transport;

pub use config::{BackoffPolicy, SyncConfig};
pub use db_store::DatabaseStore;
pub use diagnostics::{
    DiagnosticEvent, Diagnostics, NullDiagnostics, RecordingDiagnostics, TracingDiagnostics,
};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpResponse, HttpTransport, LoopbackClient, LoopbackServer};
pub use orchestrator::{
    CycleOutcome, EngineStores, MemorySyncLog, MemoryWatermark, SyncLogStore, SyncOrchestrator,
    SyncPhase, WatermarkStore,
};
pub use outbox::{select_batch, BatchPlan, MemoryOutbox, OutboxStore};
pub use pull::{DeltaPuller, MemoryReplica, MergePlan, PullOutcome, ReplicaStore};
pub use push::{PushOutcome, PushProcessor};
pub use transport::{AccessToken, MockTransport, StaticTokenSource, SyncTransport, TokenSource};
