//! Push phase: drains the outbox in deduplicated batches.

use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::error::SyncResult;
use crate::outbox::{select_batch, OutboxStore};
use crate::transport::{AccessToken, SyncTransport};
use chrono::Utc;
use rolodex_core::{OutboxItem, PushStats};
use rolodex_sync_protocol::{format_instant, PushItem, PushRequest};
use std::collections::HashSet;

/// The result of one push phase.
#[derive(Debug, Default)]
pub struct PushOutcome {
    /// Aggregate counters.
    pub stats: PushStats,
    /// The transport failure that stopped the batch loop, if any.
    ///
    /// Item-level rejections are counters, not failures; only a batch
    /// that never reached the server sets this.
    pub failure: Option<String>,
}

/// Drives batch selection and transmission until the outbox drains.
pub struct PushProcessor<'a> {
    transport: &'a dyn SyncTransport,
    outbox: &'a dyn OutboxStore,
    diagnostics: &'a dyn Diagnostics,
    batch_size: usize,
}

impl<'a> PushProcessor<'a> {
    /// Creates a processor over the given transport and outbox.
    pub fn new(
        transport: &'a dyn SyncTransport,
        outbox: &'a dyn OutboxStore,
        diagnostics: &'a dyn Diagnostics,
        batch_size: usize,
    ) -> Self {
        Self {
            transport,
            outbox,
            diagnostics,
            batch_size,
        }
    }

    /// Pushes every queued mutation, batch by batch.
    ///
    /// Stops at the first transport failure: later batches must not be
    /// applied out of order ahead of a failed one. Items the server
    /// does not confirm go to `error` and are re-selected next cycle.
    pub fn push_all(&self, token: &AccessToken) -> SyncResult<PushOutcome> {
        let mut outcome = PushOutcome::default();

        let requeued = self.outbox.requeue_errors()?;
        if requeued > 0 {
            tracing::debug!(requeued, "re-queued failed outbox items");
        }

        loop {
            let queued = self.outbox.queued_items()?;
            let plan = select_batch(&queued, self.batch_size);
            if plan.is_empty() {
                break;
            }

            // Superseded items never transmit; a later mutation for the
            // same record carries their net effect.
            if !plan.superseded.is_empty() {
                self.outbox.mark_done(&plan.superseded)?;
            }
            if plan.batch.is_empty() {
                continue;
            }

            let ids = plan.batch_ids();
            let size = ids.len();
            outcome.stats.attempted += size as u32;
            self.outbox.mark_sending(&ids)?;

            let request = PushRequest {
                client_time: format_instant(Utc::now()),
                batch: plan.batch.iter().map(to_push_item).collect(),
            };

            match self.transport.push(token, &request) {
                Err(err) => {
                    self.outbox.mark_error(&ids)?;
                    outcome.stats.errors += size as u32;
                    let message = err.to_string();
                    self.diagnostics.record(DiagnosticEvent::BatchFailed {
                        size,
                        message: message.clone(),
                    });
                    outcome.failure = Some(message);
                    break;
                }
                Ok(response) => {
                    outcome.stats.sent += size as u32;

                    let applied: HashSet<i64> = response.applied_ids.iter().copied().collect();
                    let (done, rejected): (Vec<i64>, Vec<i64>) =
                        ids.iter().copied().partition(|id| applied.contains(id));
                    self.outbox.mark_done(&done)?;
                    self.outbox.mark_error(&rejected)?;

                    outcome.stats.applied += done.len() as u32;
                    outcome.stats.conflicts += response.conflicts;
                    outcome.stats.errors +=
                        (rejected.len() as u32).saturating_sub(response.conflicts);

                    self.diagnostics.record(DiagnosticEvent::BatchPushed {
                        size,
                        applied: done.len(),
                    });
                }
            }
        }

        Ok(outcome)
    }
}

fn to_push_item(item: &OutboxItem) -> PushItem {
    PushItem {
        id: item.id,
        entity: item.entity,
        entity_id: item.entity_id.clone(),
        op: item.op,
        version: item.payload.version(),
        payload: item.payload.clone(),
    }
}
