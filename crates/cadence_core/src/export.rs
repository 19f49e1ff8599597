//! Read-only projection of today's agenda for widgets and summaries.
//!
//! # Responsibility
//! - Reduce today's occurrences to the handful of fields a widget renders.
//!
//! # Invariants
//! - Never mutates the store.
//! - Entry order matches `TaskStore::query_for_date`.

use crate::ledger::CompletionLedger;
use crate::model::task::TaskId;
use crate::store::TaskStore;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Resolves tag ids to display names.
pub trait TagLookup {
    fn tag_name(&self, tag_id: &str) -> Option<String>;
}

impl TagLookup for BTreeMap<String, String> {
    fn tag_name(&self, tag_id: &str) -> Option<String> {
        self.get(tag_id).cloned()
    }
}

impl TagLookup for HashMap<String, String> {
    fn tag_name(&self, tag_id: &str) -> Option<String> {
        self.get(tag_id).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayEntry {
    pub id: TaskId,
    pub title: String,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub is_completed_today: bool,
    pub tag_id: Option<String>,
    pub tag_name: Option<String>,
}

/// Projects the occurrences of `today`.
pub fn today_entries(store: &TaskStore, today: NaiveDate, tags: &dyn TagLookup) -> Vec<TodayEntry> {
    store
        .query_for_date(today, today)
        .into_iter()
        .map(|task| TodayEntry {
            id: task.id,
            title: task.title.clone(),
            scheduled_time: task.scheduled_time,
            is_completed_today: CompletionLedger::is_completed_on(task, today),
            tag_id: task.tag_id.clone(),
            tag_name: task.tag_id.as_deref().and_then(|tag| tags.tag_name(tag)),
        })
        .collect()
}
