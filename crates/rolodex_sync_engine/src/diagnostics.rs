//! Injected diagnostics capability.
//!
//! The engine never logs directly; it reports structured events to a
//! [`Diagnostics`] sink handed in at construction. Production callers
//! pass [`TracingDiagnostics`], tests pass a recording double, and
//! embedders that want silence pass [`NullDiagnostics`].

use crate::orchestrator::SyncPhase;
use parking_lot::Mutex;

/// A structured event emitted during a sync cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    /// A cycle entered a new phase.
    PhaseChanged(SyncPhase),
    /// A push batch was transmitted.
    BatchPushed {
        /// Items in the batch.
        size: usize,
        /// Items the server confirmed applied.
        applied: usize,
    },
    /// A push batch failed in transit.
    BatchFailed {
        /// Items in the batch.
        size: usize,
        /// Transport error message.
        message: String,
    },
    /// A pulled delta was merged into the replica.
    DeltaMerged {
        /// Records inserted or updated.
        upserts: u32,
        /// Tombstones applied.
        deletes: u32,
    },
    /// The cycle finished.
    CycleFinished {
        /// Whether both phases completed cleanly.
        success: bool,
        /// Error message when the cycle failed.
        error: Option<String>,
    },
}

/// Sink for engine diagnostics.
pub trait Diagnostics: Send + Sync {
    /// Records one event.
    fn record(&self, event: DiagnosticEvent);
}

/// Diagnostics sink that forwards to `tracing`.
#[derive(Debug, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn record(&self, event: DiagnosticEvent) {
        match event {
            DiagnosticEvent::PhaseChanged(phase) => {
                tracing::debug!(?phase, "sync phase changed");
            }
            DiagnosticEvent::BatchPushed { size, applied } => {
                tracing::debug!(size, applied, "push batch acknowledged");
            }
            DiagnosticEvent::BatchFailed { size, message } => {
                tracing::warn!(size, %message, "push batch failed");
            }
            DiagnosticEvent::DeltaMerged { upserts, deletes } => {
                tracing::debug!(upserts, deletes, "delta merged");
            }
            DiagnosticEvent::CycleFinished { success, error } => {
                if success {
                    tracing::info!("sync cycle finished");
                } else {
                    tracing::warn!(error = error.as_deref(), "sync cycle failed");
                }
            }
        }
    }
}

/// Diagnostics sink that discards every event.
#[derive(Debug, Default)]
pub struct NullDiagnostics;

impl Diagnostics for NullDiagnostics {
    fn record(&self, _event: DiagnosticEvent) {}
}

/// Diagnostics sink that keeps every event for later inspection.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingDiagnostics {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the events recorded so far.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().clone()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn record(&self, event: DiagnosticEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_keeps_events_in_order() {
        let recorder = RecordingDiagnostics::new();
        recorder.record(DiagnosticEvent::PhaseChanged(SyncPhase::PushPhase));
        recorder.record(DiagnosticEvent::CycleFinished {
            success: true,
            error: None,
        });

        let events = recorder.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], DiagnosticEvent::PhaseChanged(SyncPhase::PushPhase));
    }

    #[test]
    fn null_sink_discards() {
        NullDiagnostics.record(DiagnosticEvent::CycleFinished {
            success: false,
            error: Some("x".into()),
        });
    }
}
