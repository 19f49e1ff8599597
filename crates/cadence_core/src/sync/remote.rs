//! Remote store collaborator contract.
//!
//! # Responsibility
//! - Define the narrow surface the engine needs from the backend.
//! - Provide an in-process implementation for hosts without a backend and
//!   for tests.
//!
//! # Invariants
//! - `delete` reports success as a boolean; a `false` keeps the local record
//!   soft-deleted for retry.
//! - Rows are opaque JSON objects keyed by `id`.

use crate::model::task::TaskId;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RemoteResult<T> = Result<T, RemoteError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    Unavailable(String),
    Rejected { id: Option<TaskId>, reason: String },
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "remote store unavailable: {reason}"),
            Self::Rejected {
                id: Some(id),
                reason,
            } => write!(f, "remote store rejected {id}: {reason}"),
            Self::Rejected { id: None, reason } => write!(f, "remote store rejected request: {reason}"),
        }
    }
}

impl Error for RemoteError {}

/// Backend operations consumed by the engine.
pub trait RemoteStore {
    fn upsert(&mut self, row: &Value) -> RemoteResult<()>;
    fn update(&mut self, id: TaskId, row: &Value) -> RemoteResult<()>;
    fn delete(&mut self, id: TaskId) -> bool;
    fn query_all(&self, user_id: &str) -> RemoteResult<Vec<Value>>;
}

/// Map-backed remote store with switchable failures.
#[derive(Debug, Default)]
pub struct InMemoryRemoteStore {
    rows: BTreeMap<String, Value>,
    failing_deletes: BTreeSet<TaskId>,
    offline: bool,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a raw row, bypassing validation.
    pub fn insert_raw(&mut self, key: impl Into<String>, row: Value) {
        self.rows.insert(key.into(), row);
    }

    pub fn row(&self, id: TaskId) -> Option<&Value> {
        self.rows.get(&id.to_string())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Makes `delete(id)` report failure until cleared.
    pub fn fail_deletes_for(&mut self, id: TaskId) {
        self.failing_deletes.insert(id);
    }

    pub fn clear_failures(&mut self) {
        self.failing_deletes.clear();
        self.offline = false;
    }

    /// Makes every call fail.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    fn check_online(&self) -> RemoteResult<()> {
        if self.offline {
            return Err(RemoteError::Unavailable("offline".to_string()));
        }
        Ok(())
    }
}

impl RemoteStore for InMemoryRemoteStore {
    fn upsert(&mut self, row: &Value) -> RemoteResult<()> {
        self.check_online()?;
        let id = row
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| RemoteError::Rejected {
                id: None,
                reason: "row has no id".to_string(),
            })?;
        self.rows.insert(id.to_string(), row.clone());
        Ok(())
    }

    fn update(&mut self, id: TaskId, row: &Value) -> RemoteResult<()> {
        self.check_online()?;
        let key = id.to_string();
        if !self.rows.contains_key(&key) {
            return Err(RemoteError::Rejected {
                id: Some(id),
                reason: "no such row".to_string(),
            });
        }
        self.rows.insert(key, row.clone());
        Ok(())
    }

    fn delete(&mut self, id: TaskId) -> bool {
        if self.offline || self.failing_deletes.contains(&id) {
            return false;
        }
        self.rows.remove(&id.to_string());
        true
    }

    fn query_all(&self, user_id: &str) -> RemoteResult<Vec<Value>> {
        self.check_online()?;
        Ok(self
            .rows
            .values()
            .filter(|row| {
                row.get("userId")
                    .and_then(Value::as_str)
                    .map_or(true, |owner| owner == user_id)
            })
            .cloned()
            .collect())
    }
}
