//! Whole-collection snapshot persistence.
//!
//! # Responsibility
//! - Store the entire task collection as one versioned JSON blob under a
//!   fixed key.
//! - Decode snapshots leniently: one bad record never loses the rest.
//!
//! # Invariants
//! - Writes replace the whole blob in one statement; there are no partial
//!   updates.
//! - Snapshots written by a newer envelope version are rejected, not guessed at.

use crate::db::DbError;
use crate::model::task::Task;
use crate::sync::PendingOp;
use chrono::Utc;
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Envelope version written by this build.
pub const SNAPSHOT_VERSION: u32 = 1;

pub type RepoResult<T> = Result<T, RepoError>;

/// Snapshot persistence failures.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Encode(serde_json::Error),
    InvalidData(String),
    UnsupportedVersion { found: u32, supported: u32 },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Encode(err) => write!(f, "failed to encode snapshot: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted snapshot: {message}"),
            Self::UnsupportedVersion { found, supported } => write!(
                f,
                "snapshot version {found} is newer than supported {supported}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::InvalidData(_) | Self::UnsupportedVersion { .. } => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Persisted form of the task store plus its unsent remote operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub version: u32,
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub pending_sync: Vec<PendingOp>,
}

impl TaskSnapshot {
    pub fn new(tasks: Vec<Task>, pending_sync: Vec<PendingOp>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            tasks,
            pending_sync,
        }
    }

    /// Encodes the envelope as JSON text.
    pub fn encode(&self) -> RepoResult<String> {
        serde_json::to_string(self).map_err(RepoError::Encode)
    }

    /// Decodes an envelope, dropping individual records that fail to parse.
    pub fn decode(payload: &str) -> RepoResult<Self> {
        let envelope: Value = serde_json::from_str(payload)
            .map_err(|err| RepoError::InvalidData(format!("payload is not JSON: {err}")))?;

        let version = envelope
            .get("version")
            .and_then(Value::as_u64)
            .and_then(|version| u32::try_from(version).ok())
            .ok_or_else(|| RepoError::InvalidData("missing snapshot version".to_string()))?;
        if version > SNAPSHOT_VERSION {
            return Err(RepoError::UnsupportedVersion {
                found: version,
                supported: SNAPSHOT_VERSION,
            });
        }

        let records = envelope
            .get("tasks")
            .and_then(Value::as_array)
            .ok_or_else(|| RepoError::InvalidData("missing task list".to_string()))?;
        let mut tasks = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            match serde_json::from_value::<Task>(record.clone()) {
                Ok(task) => tasks.push(task),
                Err(err) => warn!(
                    "event=snapshot_decode module=repo status=skipped record_index={} error={}",
                    index, err
                ),
            }
        }

        let pending_sync = envelope
            .get("pending_sync")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| serde_json::from_value::<PendingOp>(entry.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            version: SNAPSHOT_VERSION,
            tasks,
            pending_sync,
        })
    }
}

/// Local persistence collaborator.
pub trait SnapshotRepository {
    fn load_snapshot(&self, key: &str) -> RepoResult<Option<TaskSnapshot>>;
    fn save_snapshot(&self, key: &str, snapshot: &TaskSnapshot) -> RepoResult<()>;
}

/// SQLite-backed snapshot repository.
pub struct SqliteSnapshotRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSnapshotRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SnapshotRepository for SqliteSnapshotRepository<'_> {
    fn load_snapshot(&self, key: &str) -> RepoResult<Option<TaskSnapshot>> {
        let payload = self
            .conn
            .query_row(
                "SELECT payload FROM snapshots WHERE key = ?1;",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        let Some(payload) = payload else {
            info!("event=snapshot_load module=repo status=empty key={key}");
            return Ok(None);
        };
        let snapshot = TaskSnapshot::decode(&payload)?;
        info!(
            "event=snapshot_load module=repo status=ok key={} tasks={} pending_sync={}",
            key,
            snapshot.tasks.len(),
            snapshot.pending_sync.len()
        );
        Ok(Some(snapshot))
    }

    fn save_snapshot(&self, key: &str, snapshot: &TaskSnapshot) -> RepoResult<()> {
        let payload = snapshot.encode()?;
        self.conn.execute(
            "INSERT OR REPLACE INTO snapshots (key, payload, updated_at) VALUES (?1, ?2, ?3);",
            params![key, payload, Utc::now().timestamp_millis()],
        )?;
        info!(
            "event=snapshot_save module=repo status=ok key={} tasks={} bytes={}",
            key,
            snapshot.tasks.len(),
            payload.len()
        );
        Ok(())
    }
}
