//! Outbox access and batch selection.

use crate::error::SyncResult;
use parking_lot::Mutex;
use rolodex_core::{OutboxItem, OutboxStatus};
use std::collections::BTreeMap;

/// Access to the durable outbox queue.
///
/// Every status transition a single call performs must be atomic: a
/// batch is never observably half `sending`.
pub trait OutboxStore: Send + Sync {
    /// Makes `error` items from previous cycles eligible again.
    ///
    /// Called once at the start of a push phase; returns the number of
    /// items re-queued.
    fn requeue_errors(&self) -> SyncResult<usize>;

    /// Returns all `queued` items in `(client_time, id)` order.
    fn queued_items(&self) -> SyncResult<Vec<OutboxItem>>;

    /// Marks the given items `sending` and increments their try count.
    fn mark_sending(&self, ids: &[i64]) -> SyncResult<()>;

    /// Marks the given items `done`.
    fn mark_done(&self, ids: &[i64]) -> SyncResult<()>;

    /// Marks the given items `error`.
    fn mark_error(&self, ids: &[i64]) -> SyncResult<()>;
}

/// The outcome of one round of batch selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchPlan {
    /// Deduplicated items in transmission order, at most `batch_size`.
    pub batch: Vec<OutboxItem>,
    /// Items superseded by a batched item for the same key.
    ///
    /// These never transmit: a later mutation for the same record
    /// carries their net effect. The push phase retires them as `done`
    /// so they are not selected again.
    pub superseded: Vec<i64>,
}

impl BatchPlan {
    /// Returns true when nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty() && self.superseded.is_empty()
    }

    /// The ids of the batched items, in transmission order.
    pub fn batch_ids(&self) -> Vec<i64> {
        self.batch.iter().map(|item| item.id).collect()
    }
}

/// Collapses queued mutations to their net effect and selects a batch.
///
/// Groups items by `(entity, entityId)`; within a group the
/// chronologically last item wins. A trailing delete dominates every
/// earlier insert or update for that key, and a trailing update
/// supersedes earlier ones, so each key contributes at most one item.
/// The surviving items are re-sorted by `(client_time, id)` and
/// truncated to `batch_size`; keys cut off by truncation are left
/// untouched for the next round.
pub fn select_batch(items: &[OutboxItem], batch_size: usize) -> BatchPlan {
    let mut groups: BTreeMap<(String, String), Vec<&OutboxItem>> = BTreeMap::new();
    for item in items {
        if item.status != OutboxStatus::Queued {
            continue;
        }
        let (entity, entity_id) = item.dedup_key();
        groups
            .entry((entity.as_str().to_string(), entity_id.to_string()))
            .or_default()
            .push(item);
    }

    let mut winners: Vec<(&OutboxItem, Vec<i64>)> = Vec::with_capacity(groups.len());
    for mut group in groups.into_values() {
        group.sort_by_key(|item| (item.client_time, item.id));
        let winner = match group.pop() {
            Some(item) => item,
            None => continue,
        };
        let losers = group.iter().map(|item| item.id).collect();
        winners.push((winner, losers));
    }

    winners.sort_by_key(|(winner, _)| (winner.client_time, winner.id));
    winners.truncate(batch_size);

    let mut plan = BatchPlan::default();
    for (winner, losers) in winners {
        plan.batch.push(winner.clone());
        plan.superseded.extend(losers);
    }
    plan
}

/// In-memory outbox for engine tests.
#[derive(Default)]
pub struct MemoryOutbox {
    items: Mutex<Vec<OutboxItem>>,
    next_id: Mutex<i64>,
}

impl MemoryOutbox {
    /// Creates an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a pre-built item, assigning the next id.
    pub fn enqueue(&self, mut item: OutboxItem) -> i64 {
        let mut next_id = self.next_id.lock();
        *next_id += 1;
        item.id = *next_id;
        let id = item.id;
        self.items.lock().push(item);
        id
    }

    /// Returns a snapshot of every item.
    pub fn items(&self) -> Vec<OutboxItem> {
        self.items.lock().clone()
    }

    /// Returns the status of the item with the given id.
    pub fn status_of(&self, id: i64) -> Option<OutboxStatus> {
        self.items
            .lock()
            .iter()
            .find(|item| item.id == id)
            .map(|item| item.status)
    }

    fn set_status(&self, ids: &[i64], status: OutboxStatus, bump_tries: bool) {
        let mut items = self.items.lock();
        for item in items.iter_mut() {
            if ids.contains(&item.id) {
                item.status = status;
                if bump_tries {
                    item.try_count += 1;
                }
            }
        }
    }
}

impl OutboxStore for MemoryOutbox {
    fn requeue_errors(&self) -> SyncResult<usize> {
        let mut items = self.items.lock();
        let mut count = 0;
        for item in items.iter_mut() {
            if item.status == OutboxStatus::Error {
                item.status = OutboxStatus::Queued;
                count += 1;
            }
        }
        Ok(count)
    }

    fn queued_items(&self) -> SyncResult<Vec<OutboxItem>> {
        let mut queued: Vec<OutboxItem> = self
            .items
            .lock()
            .iter()
            .filter(|item| item.status == OutboxStatus::Queued)
            .cloned()
            .collect();
        queued.sort_by_key(|item| (item.client_time, item.id));
        Ok(queued)
    }

    fn mark_sending(&self, ids: &[i64]) -> SyncResult<()> {
        self.set_status(ids, OutboxStatus::Sending, true);
        Ok(())
    }

    fn mark_done(&self, ids: &[i64]) -> SyncResult<()> {
        self.set_status(ids, OutboxStatus::Done, false);
        Ok(())
    }

    fn mark_error(&self, ids: &[i64]) -> SyncResult<()> {
        self.set_status(ids, OutboxStatus::Error, false);
        Ok(())
    }
}
