//! Recurring-task scheduling engine.
//!
//! Recurrence evaluation, per-day completion tracking, task storage and
//! completion statistics. Persistence, remote sync and notifications are
//! reached through narrow collaborator traits.

pub mod calendar;
pub mod config;
pub mod db;
pub mod export;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod notify;
pub mod recurrence;
pub mod repo;
pub mod service;
pub mod stats;
pub mod store;
pub mod sync;

pub use calendar::{Calendar, Clock, FixedClock, SystemClock, WeekStart};
pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use export::{TagLookup, TodayEntry};
pub use ledger::CompletionLedger;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::task::{
    Recurrence, RecurrenceFrequency, ReminderRule, Task, TaskId, TaskValidationError,
    WeekdayBucket,
};
pub use notify::{plan_reminders, AlertKind, Notifier, PlannedAlert};
pub use recurrence::{next_occurrence, occurs_on};
pub use repo::{RepoError, SnapshotRepository, SqliteSnapshotRepository, TaskSnapshot};
pub use service::{FlushReport, OutgoingOp, PullReport, TaskService, TaskServiceError};
pub use stats::{
    expected_occurrences, ActivityCount, MissedReport, MonthlyBreakdown, MonthlySummary,
    StatsAggregator,
};
pub use store::{CascadePlan, EditOutcome, Occurrence, StoreError, TaskStore};
pub use sync::{InMemoryRemoteStore, RemoteError, RemoteStore, SyncOp, SyncOutbox};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
