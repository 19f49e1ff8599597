//! Pending remote operations.
//!
//! # Responsibility
//! - Queue one coalesced remote operation per task.
//! - Track failed attempts so repeated failures can be reported.
//!
//! # Invariants
//! - At most one pending operation per task id.
//! - A delete supersedes any earlier write; a later write supersedes a delete.

use crate::model::task::TaskId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOp {
    /// Create or replace the remote row.
    Upsert,
    /// Update an existing remote row.
    Update,
    Delete,
}

impl SyncOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upsert => "upsert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    fn coalesce(previous: Self, next: Self) -> Self {
        match (previous, next) {
            (_, Self::Delete) => Self::Delete,
            (Self::Upsert, Self::Update) => Self::Upsert,
            (Self::Delete, _) => Self::Upsert,
            (_, next) => next,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOp {
    pub id: TaskId,
    pub op: SyncOp,
    #[serde(default)]
    pub attempts: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncOutbox {
    pending: BTreeMap<TaskId, PendingOp>,
}

impl SyncOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds an outbox from persisted entries, coalescing duplicates.
    pub fn from_pending(entries: impl IntoIterator<Item = PendingOp>) -> Self {
        let mut outbox = Self::new();
        for entry in entries {
            outbox.enqueue(entry.id, entry.op);
            if let Some(stored) = outbox.pending.get_mut(&entry.id) {
                stored.attempts = stored.attempts.max(entry.attempts);
            }
        }
        outbox
    }

    /// Queues `op` for `id`, merging it with any pending operation.
    ///
    /// A merge that changes the operation resets the attempt counter.
    pub fn enqueue(&mut self, id: TaskId, op: SyncOp) {
        self.pending
            .entry(id)
            .and_modify(|pending| {
                let merged = SyncOp::coalesce(pending.op, op);
                if merged != pending.op {
                    pending.attempts = 0;
                }
                pending.op = merged;
            })
            .or_insert(PendingOp {
                id,
                op,
                attempts: 0,
            });
    }

    pub fn get(&self, id: TaskId) -> Option<&PendingOp> {
        self.pending.get(&id)
    }

    /// Pending operations ordered by task id.
    pub fn pending(&self) -> Vec<PendingOp> {
        self.pending.values().copied().collect()
    }

    /// Drops the entry for `id` after the remote acknowledged it.
    pub fn complete(&mut self, id: TaskId) -> Option<PendingOp> {
        self.pending.remove(&id)
    }

    /// Records a failed attempt and returns the new attempt count.
    pub fn record_failure(&mut self, id: TaskId) -> u32 {
        match self.pending.get_mut(&id) {
            Some(pending) => {
                pending.attempts = pending.attempts.saturating_add(1);
                pending.attempts
            }
            None => 0,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
