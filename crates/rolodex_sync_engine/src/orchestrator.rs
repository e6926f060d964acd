//! Cycle orchestration: push, then pull, then log.

use crate::config::SyncConfig;
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::error::{SyncError, SyncResult};
use crate::outbox::OutboxStore;
use crate::pull::{DeltaPuller, ReplicaStore};
use crate::push::PushProcessor;
use crate::transport::{SyncTransport, TokenSource};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rolodex_core::{PullStats, PushStats, SyncLogEntry};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Phase of the cycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No cycle has run yet.
    Idle,
    /// Draining the outbox.
    PushPhase,
    /// Fetching and merging the remote delta.
    PullPhase,
    /// The last cycle completed cleanly.
    Success,
    /// The last cycle failed in some phase.
    Failed,
}

/// Holds the sync watermark.
pub trait WatermarkStore: Send + Sync {
    /// Returns the current watermark, `None` before the first sync.
    fn watermark(&self) -> SyncResult<Option<DateTime<Utc>>>;

    /// Persists a new watermark.
    ///
    /// The orchestrator guarantees monotonicity; the store just writes.
    fn set_watermark(&self, at: DateTime<Utc>) -> SyncResult<()>;
}

/// Append-only history of cycle outcomes.
pub trait SyncLogStore: Send + Sync {
    /// Appends one entry and returns its id. Entries are never mutated.
    fn append(&self, entry: &SyncLogEntry) -> SyncResult<i64>;

    /// Returns the most recent entries, newest first.
    fn recent(&self, limit: usize, failures_only: bool) -> SyncResult<Vec<SyncLogEntry>>;
}

/// The stores one engine instance operates on.
///
/// Usually all four point at the same database adapter; tests mix
/// in-memory doubles freely.
#[derive(Clone)]
pub struct EngineStores {
    /// The outbox queue.
    pub outbox: Arc<dyn OutboxStore>,
    /// The replica record store.
    pub replica: Arc<dyn ReplicaStore>,
    /// The watermark scalar.
    pub watermark: Arc<dyn WatermarkStore>,
    /// The cycle log.
    pub log: Arc<dyn SyncLogStore>,
}

impl EngineStores {
    /// Builds the set from one adapter implementing all four roles.
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: OutboxStore + ReplicaStore + WatermarkStore + SyncLogStore + 'static,
    {
        Self {
            outbox: store.clone(),
            replica: store.clone(),
            watermark: store.clone(),
            log: store,
        }
    }
}

/// Aggregate result of one cycle, mirrored into the log.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    /// Whether every phase completed cleanly.
    pub success: bool,
    /// Push phase counters.
    pub push: PushStats,
    /// Pull phase counters.
    pub pull: PullStats,
    /// Joined error messages when the cycle failed.
    pub error: Option<String>,
    /// The watermark after the cycle.
    pub watermark: Option<DateTime<Utc>>,
    /// Id of the log entry this cycle wrote.
    pub log_id: i64,
    /// Wall-clock duration.
    pub duration: Duration,
}

/// Runs push-then-pull cycles against one local store.
///
/// Single-flight: a `run_cycle` call while another is in progress on
/// the same instance fails with [`SyncError::SyncInFlight`] instead of
/// interleaving. Instances in other processes sharing the store are
/// not coordinated.
pub struct SyncOrchestrator<T: SyncTransport> {
    config: SyncConfig,
    transport: T,
    tokens: Arc<dyn TokenSource>,
    stores: EngineStores,
    diagnostics: Arc<dyn Diagnostics>,
    phase: Mutex<SyncPhase>,
    in_flight: Mutex<()>,
}

impl<T: SyncTransport> SyncOrchestrator<T> {
    /// Creates an orchestrator.
    pub fn new(
        config: SyncConfig,
        transport: T,
        tokens: Arc<dyn TokenSource>,
        stores: EngineStores,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            config,
            transport,
            tokens,
            stores,
            diagnostics,
            phase: Mutex::new(SyncPhase::Idle),
            in_flight: Mutex::new(()),
        }
    }

    /// Returns the phase the engine is in (or last finished in).
    pub fn phase(&self) -> SyncPhase {
        *self.phase.lock()
    }

    /// Returns the configuration, including the backoff policy the
    /// caller should consult before scheduling a retry.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Runs one full cycle and logs the outcome.
    ///
    /// Phase failures are captured in the returned outcome and the log
    /// entry rather than propagated; `Err` here means the cycle could
    /// not run at all (already in flight, or the local store refused
    /// the watermark read or log write).
    pub fn run_cycle(&self) -> SyncResult<CycleOutcome> {
        let _guard = self
            .in_flight
            .try_lock()
            .ok_or(SyncError::SyncInFlight)?;

        let started_at = Utc::now();
        let timer = Instant::now();
        let watermark_before = self.stores.watermark.watermark()?;
        let mut watermark_after = watermark_before;

        let mut push = PushStats::default();
        let mut pull = PullStats::default();
        let mut errors: Vec<String> = Vec::new();

        let token = if self.config.base_url.trim().is_empty() {
            Err(SyncError::MissingEndpoint)
        } else {
            self.tokens.access_token().ok_or(SyncError::MissingToken)
        };

        match token {
            Err(err) => {
                // Precondition failure: no I/O, no outbox mutation.
                errors.push(err.to_string());
            }
            Ok(token) => {
                self.set_phase(SyncPhase::PushPhase);
                let processor = PushProcessor::new(
                    &self.transport,
                    self.stores.outbox.as_ref(),
                    self.diagnostics.as_ref(),
                    self.config.batch_size,
                );
                match processor.push_all(&token) {
                    Ok(outcome) => {
                        push = outcome.stats;
                        if let Some(message) = outcome.failure {
                            errors.push(format!("push: {message}"));
                        }

                        // Pull runs even after push errors; partial
                        // forward progress beats none.
                        self.set_phase(SyncPhase::PullPhase);
                        let puller = DeltaPuller::new(
                            &self.transport,
                            self.stores.replica.as_ref(),
                            self.diagnostics.as_ref(),
                        );
                        match puller.pull(&token, watermark_before) {
                            Ok(outcome) => {
                                pull = outcome.stats;
                                let advances = watermark_before
                                    .is_none_or(|before| outcome.server_time > before);
                                if advances {
                                    match self.stores.watermark.set_watermark(outcome.server_time)
                                    {
                                        Ok(()) => watermark_after = Some(outcome.server_time),
                                        Err(err) => errors.push(format!("watermark: {err}")),
                                    }
                                }
                            }
                            Err(err) => errors.push(format!("pull: {err}")),
                        }
                    }
                    Err(err) => {
                        // Local store failure mid-push is fatal to the
                        // cycle; the pull is skipped.
                        errors.push(format!("push: {err}"));
                    }
                }
            }
        }

        let success = errors.is_empty();
        self.set_phase(if success {
            SyncPhase::Success
        } else {
            SyncPhase::Failed
        });

        let error = if errors.is_empty() {
            None
        } else {
            Some(errors.join("; "))
        };
        let entry = SyncLogEntry {
            id: 0,
            started_at,
            finished_at: Utc::now(),
            success,
            push,
            pull,
            error: error.clone(),
            watermark_before,
            watermark_after,
            duration_ms: timer.elapsed().as_millis() as i64,
        };
        let log_id = self.stores.log.append(&entry)?;

        self.diagnostics.record(DiagnosticEvent::CycleFinished {
            success,
            error: error.clone(),
        });

        Ok(CycleOutcome {
            success,
            push,
            pull,
            error,
            watermark: watermark_after,
            log_id,
            duration: timer.elapsed(),
        })
    }

    fn set_phase(&self, phase: SyncPhase) {
        *self.phase.lock() = phase;
        self.diagnostics.record(DiagnosticEvent::PhaseChanged(phase));
    }
}

/// In-memory watermark for engine tests.
#[derive(Default)]
pub struct MemoryWatermark {
    value: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryWatermark {
    /// Creates an unset watermark.
    pub fn new() -> Self {
        Self::default()
    }
}

impl WatermarkStore for MemoryWatermark {
    fn watermark(&self) -> SyncResult<Option<DateTime<Utc>>> {
        Ok(*self.value.lock())
    }

    fn set_watermark(&self, at: DateTime<Utc>) -> SyncResult<()> {
        *self.value.lock() = Some(at);
        Ok(())
    }
}

/// In-memory cycle log for engine tests.
#[derive(Default)]
pub struct MemorySyncLog {
    entries: Mutex<Vec<SyncLogEntry>>,
}

impl MemorySyncLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every entry in append order.
    pub fn entries(&self) -> Vec<SyncLogEntry> {
        self.entries.lock().clone()
    }
}

impl SyncLogStore for MemorySyncLog {
    fn append(&self, entry: &SyncLogEntry) -> SyncResult<i64> {
        let mut entries = self.entries.lock();
        let mut entry = entry.clone();
        entry.id = entries.len() as i64 + 1;
        let id = entry.id;
        entries.push(entry);
        Ok(id)
    }

    fn recent(&self, limit: usize, failures_only: bool) -> SyncResult<Vec<SyncLogEntry>> {
        Ok(self
            .entries
            .lock()
            .iter()
            .rev()
            .filter(|entry| !failures_only || !entry.success)
            .take(limit)
            .cloned()
            .collect())
    }
}
