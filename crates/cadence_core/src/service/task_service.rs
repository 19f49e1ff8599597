//! Task use-case service.
//!
//! # Responsibility
//! - Load, repair and persist the task collection through a snapshot
//!   repository.
//! - Route every mutation through the store and ledger, then queue the
//!   remote side effect and refresh reminders.
//! - Expose queries, statistics and the widget projection relative to the
//!   injected clock.
//!
//! # Invariants
//! - Every successful mutation is followed by a whole-collection save.
//! - Local state is never rolled back because a remote call failed.
//! - A cascade delete removes either the whole series locally or nothing.
//! - Marking a recurring task complete is only accepted on a day it occurs;
//!   un-marking is always accepted.
//! - A soft-deleted record accepts no further mutation, so its queued remote
//!   delete is never turned back into an upsert.

use crate::calendar::{Calendar, Clock, SystemClock};
use crate::config::{ConfigError, CoreConfig};
use crate::export::{today_entries, TagLookup, TodayEntry};
use crate::ledger::CompletionLedger;
use crate::model::task::{Recurrence, Task, TaskId};
use crate::notify::{self, Notifier};
use crate::repo::{RepoError, SnapshotRepository, TaskSnapshot};
use crate::stats::{MissedReport, MonthlyBreakdown, MonthlySummary, StatsAggregator};
use crate::store::{CascadePlan, EditOutcome, Occurrence, StoreError, TaskStore};
use crate::sync::{decode_rows, encode_row, RemoteError, RemoteStore, SyncOp, SyncOutbox};
use chrono::NaiveDate;
use log::{error, info, warn};
use serde_json::Value;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, TaskServiceError>;

#[derive(Debug)]
pub enum TaskServiceError {
    Config(ConfigError),
    Store(StoreError),
    Repo(RepoError),
    Remote(RemoteError),
    /// The task does not occur on the day it was to be marked complete.
    NotAnOccurrence { id: TaskId, day: NaiveDate },
    /// Recurring tasks and their instances are removed by cascade only.
    CascadeRequired(TaskId),
    /// The task is soft-deleted and waiting for its remote delete.
    SoftDeleted(TaskId),
    /// At least one remote delete of a cascade was not confirmed.
    CascadeAborted {
        parent_id: TaskId,
        unconfirmed: Vec<TaskId>,
    },
}

impl Display for TaskServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Remote(err) => write!(f, "{err}"),
            Self::NotAnOccurrence { id, day } => {
                write!(f, "task {id} does not occur on {day}")
            }
            Self::CascadeRequired(id) => {
                write!(f, "task {id} belongs to a recurring series; delete the series")
            }
            Self::SoftDeleted(id) => write!(f, "task {id} is deleted"),
            Self::CascadeAborted {
                parent_id,
                unconfirmed,
            } => write!(
                f,
                "cascade delete of {parent_id} aborted; {} remote deletes unconfirmed",
                unconfirmed.len()
            ),
        }
    }
}

impl Error for TaskServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Remote(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for TaskServiceError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<StoreError> for TaskServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<RepoError> for TaskServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<RemoteError> for TaskServiceError {
    fn from(value: RemoteError) -> Self {
        Self::Remote(value)
    }
}

/// One queued remote operation with the row to send.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingOp {
    pub id: TaskId,
    pub op: SyncOp,
    pub attempts: u32,
    /// Current row for upserts/updates; `None` for deletes.
    pub row: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushReport {
    pub sent: usize,
    pub purged: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PullReport {
    pub merged: usize,
    pub skipped: usize,
    pub kept_local: usize,
    pub corrected: usize,
}

/// Persisted, synced facade over the task store.
pub struct TaskService<R: SnapshotRepository, C: Clock = SystemClock> {
    repo: R,
    clock: C,
    config: CoreConfig,
    store: TaskStore,
    outbox: SyncOutbox,
    notifier: Option<Box<dyn Notifier>>,
    user_id: Option<String>,
}

impl<R: SnapshotRepository> TaskService<R, SystemClock> {
    /// Opens the service on the wall clock.
    pub fn open(repo: R, config: CoreConfig) -> ServiceResult<Self> {
        Self::open_with_clock(repo, SystemClock, config)
    }
}

impl<R: SnapshotRepository, C: Clock> TaskService<R, C> {
    /// Loads the snapshot, runs the repair pass and re-queues pending work.
    ///
    /// # Side effects
    /// - Saves the snapshot again when the repair pass corrected records.
    pub fn open_with_clock(repo: R, clock: C, config: CoreConfig) -> ServiceResult<Self> {
        config.validate()?;
        let calendar = config.calendar()?;
        let snapshot = repo
            .load_snapshot(&config.snapshot_key)?
            .unwrap_or_else(|| TaskSnapshot::new(Vec::new(), Vec::new()));

        let report = TaskStore::validate_and_repair(snapshot.tasks);
        let store = TaskStore::from_tasks(calendar, report.tasks);
        let mut outbox = SyncOutbox::from_pending(snapshot.pending_sync);
        for id in &report.corrected {
            outbox.enqueue(*id, change_op(store.get(*id)));
        }
        for id in store.pending_deletes() {
            if outbox.get(id).map(|pending| pending.op) != Some(SyncOp::Delete) {
                outbox.enqueue(id, SyncOp::Delete);
            }
        }

        let service = Self {
            repo,
            clock,
            config,
            store,
            outbox,
            notifier: None,
            user_id: None,
        };
        if !report.corrected.is_empty() {
            service.persist()?;
        }
        info!(
            "event=service_open module=service status=ok tasks={} corrected={} pending_sync={}",
            service.store.len(),
            report.corrected.len(),
            service.outbox.len()
        );
        Ok(service)
    }

    /// Attaches a notifier and schedules alerts for every live task.
    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self.refresh_all_reminders();
        self
    }

    /// Sets the owner id written into outgoing rows.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn set_clock(&mut self, clock: C) {
        self.clock = clock;
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn outbox(&self) -> &SyncOutbox {
        &self.outbox
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn calendar(&self) -> &Calendar {
        self.store.calendar()
    }

    /// Local calendar day of the injected clock.
    pub fn today(&self) -> NaiveDate {
        self.calendar().day_of(self.clock.now())
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.store.get(id)
    }

    /// Adds a task and queues its upload.
    ///
    /// A task without a target date is scheduled for today.
    pub fn add_task(&mut self, mut task: Task) -> ServiceResult<Task> {
        if task.target_date.is_none() {
            task = task.on(self.today());
        }
        let task = self.store.add(task)?;
        self.outbox.enqueue(task.id, SyncOp::Upsert);
        self.persist()?;
        self.refresh_reminders(task.id);
        Ok(task)
    }

    /// Toggles completion of `id` on `day` and returns the new state.
    ///
    /// # Errors
    /// - `NotAnOccurrence` when a recurring task would be marked complete on
    ///   a day its rule does not produce.
    /// - `SoftDeleted` when the task is waiting for its remote delete.
    pub fn toggle_completion(&mut self, id: TaskId, day: NaiveDate) -> ServiceResult<bool> {
        let today = self.today();
        let task = self.live_task(id, "task_toggle")?;
        let marking = !CompletionLedger::is_completed_on(task, day);
        if marking && task.is_recurring() && !self.store.appears_on(task, day, today) {
            warn!(
                "event=task_toggle module=service status=rejected task_id={} day={} reason=not_an_occurrence",
                id, day
            );
            return Err(TaskServiceError::NotAnOccurrence { id, day });
        }

        let (completed, _) = self.store.toggle_completion(id, day, self.clock.now())?;
        self.outbox.enqueue(id, SyncOp::Update);
        self.persist()?;
        self.refresh_reminders(id);
        Ok(completed)
    }

    pub fn toggle_today(&mut self, id: TaskId) -> ServiceResult<bool> {
        let today = self.today();
        self.toggle_completion(id, today)
    }

    pub fn edit_task(&mut self, updated: Task) -> ServiceResult<EditOutcome> {
        self.live_task(updated.id, "task_edit")?;
        let outcome = self.store.edit_in_place(updated)?;
        if let Some(task) = &outcome.task {
            self.outbox.enqueue(task.id, SyncOp::Update);
        }
        for instance in &outcome.updated_instances {
            self.outbox
                .enqueue(instance.id, change_op(self.store.get(instance.id)));
        }
        for removed in &outcome.removed_instances {
            self.outbox.enqueue(removed.id, SyncOp::Delete);
        }
        self.persist()?;

        let touched = outcome
            .task
            .iter()
            .chain(&outcome.updated_instances)
            .chain(&outcome.removed_instances)
            .map(|task| task.id)
            .collect::<Vec<_>>();
        for id in touched {
            self.refresh_reminders(id);
        }
        Ok(outcome)
    }

    pub fn promote_to_recurring(
        &mut self,
        id: TaskId,
        recurrence: Recurrence,
    ) -> ServiceResult<Task> {
        self.live_task(id, "task_promote")?;
        let task = self.store.promote_to_recurring(id, recurrence)?;
        self.outbox.enqueue(id, SyncOp::Update);
        self.persist()?;
        self.refresh_reminders(id);
        Ok(task)
    }

    /// Soft-deletes a one-off task and queues its remote delete.
    ///
    /// # Errors
    /// - `CascadeRequired` for recurring tasks and materialized instances.
    pub fn delete_task(&mut self, id: TaskId) -> ServiceResult<Task> {
        let task = self.store.get(id).ok_or(StoreError::NotFound(id))?;
        if task.is_recurring() || task.is_instance() {
            return Err(TaskServiceError::CascadeRequired(id));
        }
        let task = self.store.soft_delete(id)?;
        self.outbox.enqueue(id, SyncOp::Delete);
        self.persist()?;
        self.cancel_reminders(id);
        Ok(task)
    }

    pub fn cascade_plan(&self, id: TaskId) -> ServiceResult<CascadePlan> {
        Ok(self.store.cascade_plan(id)?)
    }

    /// Deletes a recurring series through `remote`, then locally.
    ///
    /// Every remote delete is attempted. If any is not confirmed, nothing is
    /// removed locally and `CascadeAborted` lists the unconfirmed ids.
    pub fn cascade_delete(
        &mut self,
        id: TaskId,
        remote: &mut dyn RemoteStore,
    ) -> ServiceResult<Vec<Task>> {
        let plan = self.store.cascade_plan(id)?;
        let confirmed = plan
            .task_ids
            .iter()
            .copied()
            .filter(|task_id| remote.delete(*task_id))
            .collect::<Vec<_>>();
        self.confirm_cascade(id, &confirmed)
    }

    /// Applies a cascade whose remote deletes were performed by the host.
    pub fn confirm_cascade(
        &mut self,
        id: TaskId,
        confirmed: &[TaskId],
    ) -> ServiceResult<Vec<Task>> {
        let plan = self.store.cascade_plan(id)?;
        let confirmed = confirmed.iter().copied().collect::<BTreeSet<_>>();
        let unconfirmed = plan
            .task_ids
            .iter()
            .copied()
            .filter(|task_id| !confirmed.contains(task_id))
            .collect::<Vec<_>>();
        if !unconfirmed.is_empty() {
            warn!(
                "event=task_cascade_delete module=service status=aborted parent_id={} unconfirmed={}",
                plan.parent_id,
                unconfirmed.len()
            );
            return Err(TaskServiceError::CascadeAborted {
                parent_id: plan.parent_id,
                unconfirmed,
            });
        }

        let removed = self.store.apply_cascade(&plan);
        for task in &removed {
            self.outbox.complete(task.id);
            self.cancel_reminders(task.id);
        }
        self.persist()?;
        Ok(removed)
    }

    /// Returns the queued remote operations with their current rows.
    pub fn pending_sync(&self) -> Vec<OutgoingOp> {
        self.outbox
            .pending()
            .into_iter()
            .map(|pending| OutgoingOp {
                id: pending.id,
                op: pending.op,
                attempts: pending.attempts,
                row: match pending.op {
                    SyncOp::Delete => None,
                    SyncOp::Upsert | SyncOp::Update => self.store.get(pending.id).map(|task| {
                        encode_row(task, self.user_id.as_deref(), self.store.calendar())
                    }),
                },
            })
            .collect()
    }

    /// Records the remote outcome of one queued operation.
    ///
    /// A confirmed delete purges the soft-deleted record; a failed one keeps
    /// it for the next pass.
    pub fn acknowledge_sync(&mut self, id: TaskId, success: bool) -> ServiceResult<()> {
        self.apply_ack(id, success);
        self.persist()?;
        Ok(())
    }

    /// Sends every queued operation to `remote`.
    pub fn flush_sync(&mut self, remote: &mut dyn RemoteStore) -> ServiceResult<FlushReport> {
        let mut report = FlushReport::default();
        for outgoing in self.pending_sync() {
            let success = match (outgoing.op, &outgoing.row) {
                (SyncOp::Delete, _) => remote.delete(outgoing.id),
                (_, None) => true,
                (SyncOp::Upsert, Some(row)) => remote.upsert(row).is_ok(),
                (SyncOp::Update, Some(row)) => remote
                    .update(outgoing.id, row)
                    .or_else(|_| remote.upsert(row))
                    .is_ok(),
            };
            match (success, outgoing.op) {
                (true, SyncOp::Delete) => report.purged += 1,
                (true, _) => report.sent += 1,
                (false, _) => report.failed += 1,
            }
            self.apply_ack(outgoing.id, success);
        }
        self.persist()?;
        info!(
            "event=sync_flush module=service status=ok sent={} purged={} failed={}",
            report.sent, report.purged, report.failed
        );
        Ok(report)
    }

    /// Loads remote rows for `user_id` and merges them by id.
    ///
    /// Local soft-deletes and records with queued local changes win over the
    /// remote copy.
    pub fn pull_remote(
        &mut self,
        remote: &dyn RemoteStore,
        user_id: &str,
    ) -> ServiceResult<PullReport> {
        let rows = remote.query_all(user_id)?;
        self.ingest_rows(&rows)
    }

    /// Merges already-fetched remote rows.
    pub fn ingest_rows(&mut self, rows: &[Value]) -> ServiceResult<PullReport> {
        let (tasks, skipped) = decode_rows(rows, self.store.calendar());
        let repair = TaskStore::validate_and_repair(tasks);
        let corrected = repair.corrected.iter().copied().collect::<BTreeSet<_>>();
        let mut report = PullReport {
            skipped,
            ..PullReport::default()
        };

        let mut merged_ids = Vec::new();
        for task in repair.tasks {
            let id = task.id;
            let local_wins = self
                .store
                .get(id)
                .is_some_and(|local| local.is_deleted || self.outbox.get(id).is_some());
            if local_wins {
                report.kept_local += 1;
                continue;
            }
            match self.store.upsert(task) {
                Ok(()) => {
                    report.merged += 1;
                    merged_ids.push(id);
                    if corrected.contains(&id) {
                        report.corrected += 1;
                        self.outbox.enqueue(id, change_op(self.store.get(id)));
                    }
                }
                Err(err) => {
                    report.skipped += 1;
                    warn!(
                        "event=sync_pull module=service status=skipped task_id={} error={}",
                        id, err
                    );
                }
            }
        }

        self.persist()?;
        for id in merged_ids {
            self.refresh_reminders(id);
        }
        info!(
            "event=sync_pull module=service status=ok merged={} skipped={} kept_local={} corrected={}",
            report.merged, report.skipped, report.kept_local, report.corrected
        );
        Ok(report)
    }

    fn live_task(&self, id: TaskId, event: &str) -> ServiceResult<&Task> {
        let task = self.store.get(id).ok_or(StoreError::NotFound(id))?;
        if !task.is_active() {
            warn!(
                "event={} module=service status=rejected task_id={} reason=soft_deleted",
                event, id
            );
            return Err(TaskServiceError::SoftDeleted(id));
        }
        Ok(task)
    }

    pub fn tasks_for_date(&self, date: NaiveDate) -> Vec<&Task> {
        self.store.query_for_date(date, self.today())
    }

    pub fn tasks_for_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<Occurrence<'_>> {
        self.store.query_for_range(start, end, self.today())
    }

    pub fn today_tasks(&self) -> Vec<&Task> {
        self.store.query_today(self.today())
    }

    pub fn monthly_breakdown(&self, year: i32, month: u32) -> MonthlyBreakdown {
        StatsAggregator::new(&self.store).monthly_breakdown(year, month, self.today())
    }

    pub fn monthly_summary(&self, year: i32, month: u32) -> MonthlySummary {
        StatsAggregator::new(&self.store).monthly_summary(
            year,
            month,
            self.today(),
            self.config.top_activities_limit,
        )
    }

    pub fn missed_for_week(&self, week_start: NaiveDate) -> Vec<MissedReport> {
        StatsAggregator::new(&self.store).missed_for_week(week_start, self.today())
    }

    /// Missed report for the week containing today.
    pub fn missed_this_week(&self) -> Vec<MissedReport> {
        let today = self.today();
        let start = self.calendar().start_of_week(today);
        StatsAggregator::new(&self.store).missed_for_week(start, today)
    }

    pub fn today_export(&self, tags: &dyn TagLookup) -> Vec<TodayEntry> {
        today_entries(&self.store, self.today(), tags)
    }

    /// Writes the whole collection and the sync queue.
    pub fn persist(&self) -> ServiceResult<()> {
        let snapshot = TaskSnapshot::new(self.store.snapshot(), self.outbox.pending());
        self.repo
            .save_snapshot(&self.config.snapshot_key, &snapshot)
            .map_err(|err| {
                error!(
                    "event=snapshot_save module=service status=error error={}",
                    err
                );
                TaskServiceError::from(err)
            })
    }

    fn apply_ack(&mut self, id: TaskId, success: bool) {
        let Some(pending) = self.outbox.get(id).copied() else {
            return;
        };
        if success {
            self.outbox.complete(id);
            if pending.op == SyncOp::Delete {
                self.store.confirm_deleted(id);
            }
            return;
        }

        let attempts = self.outbox.record_failure(id);
        if attempts >= self.config.delete_retry_warn_threshold && pending.op == SyncOp::Delete {
            warn!(
                "event=sync_delete module=service status=retrying task_id={} attempts={}",
                id, attempts
            );
        } else {
            info!(
                "event=sync_op module=service status=failed task_id={} op={} attempts={}",
                id,
                pending.op.as_str(),
                attempts
            );
        }
    }

    fn refresh_reminders(&mut self, id: TaskId) {
        let Some(notifier) = self.notifier.as_mut() else {
            return;
        };
        match self.store.get(id) {
            Some(task) => {
                notify::reschedule(
                    notifier.as_mut(),
                    task,
                    self.store.calendar(),
                    self.clock.now(),
                    self.config.reminder_horizon_days,
                );
            }
            None => notifier.cancel(id),
        }
    }

    fn cancel_reminders(&mut self, id: TaskId) {
        if let Some(notifier) = self.notifier.as_mut() {
            notifier.cancel(id);
        }
    }

    fn refresh_all_reminders(&mut self) {
        let ids = self.store.iter().map(|task| task.id).collect::<Vec<_>>();
        for id in ids {
            self.refresh_reminders(id);
        }
    }
}

/// Operation to queue after a record changed locally.
///
/// Soft-deleted records keep their pending delete.
fn change_op(task: Option<&Task>) -> SyncOp {
    match task {
        Some(task) if !task.is_active() => SyncOp::Delete,
        _ => SyncOp::Update,
    }
}
