//! In-memory task collection with a derived weekday index.
//!
//! # Responsibility
//! - Own every task record, keyed by id, and keep the weekday index in step
//!   with each write.
//! - Answer date and range queries by delegating occurrence tests to the
//!   recurrence matcher and completion tests to the ledger.
//! - Carry out structural edits: promotion, demotion, instance propagation,
//!   soft delete and cascade delete.
//!
//! # Invariants
//! - The weekday index holds each live id exactly once, under
//!   `Task::derived_weekday()`.
//! - Every write validates the record first; a rejected write changes nothing.
//! - Recurring records never carry one-off completion flags once written.
//! - A cascade removes a recurring parent and all of its instances together,
//!   or nothing.

use crate::calendar::Calendar;
use crate::ledger::CompletionLedger;
use crate::model::task::{
    Recurrence, RecurrenceFrequency, Task, TaskId, TaskValidationError, WeekdayBucket,
};
use crate::recurrence::task_occurs_on;
use chrono::{DateTime, NaiveDate, Utc};
use log::{info, warn};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Validation(TaskValidationError),
    NotFound(TaskId),
    DuplicateId(TaskId),
    /// Frequency changes on recurring tasks go through delete + recreate.
    FrequencyChange {
        id: TaskId,
        from: RecurrenceFrequency,
        to: RecurrenceFrequency,
    },
    /// Recurring tasks have no soft-delete state; use a cascade.
    RecurringSoftDelete(TaskId),
    /// Cascade requested on a task that is neither recurring nor an instance.
    NotRecurring(TaskId),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::DuplicateId(id) => write!(f, "task already exists: {id}"),
            Self::FrequencyChange { id, from, to } => write!(
                f,
                "cannot change recurrence of {id} from {} to {}; delete and recreate instead",
                from.as_str(),
                to.as_str()
            ),
            Self::RecurringSoftDelete(id) => {
                write!(f, "recurring task {id} must be cascade-deleted")
            }
            Self::NotRecurring(id) => write!(f, "task {id} is not part of a recurring series"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for StoreError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

/// One task occurring on one day of a range query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Occurrence<'a> {
    pub date: NaiveDate,
    pub task: &'a Task,
}

/// Result of an in-place edit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EditOutcome {
    /// The stored record after the edit.
    pub task: Option<Task>,
    /// Instances that received propagated title/time changes.
    pub updated_instances: Vec<Task>,
    /// Instances dropped because their parent stopped recurring.
    pub removed_instances: Vec<Task>,
}

/// Records selected for an all-or-nothing cascade delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadePlan {
    pub parent_id: TaskId,
    pub task_ids: Vec<TaskId>,
}

/// Output of the post-load repair pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RepairReport {
    pub tasks: Vec<Task>,
    /// Ids whose records were corrected and must be re-synced.
    pub corrected: Vec<TaskId>,
}

/// Single-writer task collection.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    calendar: Calendar,
    tasks: BTreeMap<TaskId, Task>,
    weekday_index: BTreeMap<WeekdayBucket, BTreeSet<TaskId>>,
}

impl TaskStore {
    pub fn new(calendar: Calendar) -> Self {
        Self {
            calendar,
            tasks: BTreeMap::new(),
            weekday_index: BTreeMap::new(),
        }
    }

    /// Builds a store from records already passed through
    /// [`TaskStore::validate_and_repair`].
    ///
    /// Only records that cannot be repaired (nil id, blank title) fail
    /// validation at this point; they are dropped and logged.
    pub fn from_tasks(calendar: Calendar, tasks: Vec<Task>) -> Self {
        let mut store = Self::new(calendar);
        for task in tasks {
            if let Err(err) = task.validate() {
                warn!(
                    "event=store_load module=store status=skipped task_id={} error={}",
                    task.id, err
                );
                continue;
            }
            store.put(task);
        }
        store
    }

    /// Repairs records that would otherwise fail validation or carry
    /// contradictory completion state.
    ///
    /// Invalid optional fields are cleared (reversed time window, rule on an
    /// instance, recurrence end before the anchor) and one-off completion
    /// flags on recurring records are reset. Every touched record is listed
    /// in `corrected`.
    pub fn validate_and_repair(tasks: Vec<Task>) -> RepairReport {
        let mut corrected = Vec::new();
        let tasks = tasks
            .into_iter()
            .map(|mut task| {
                let cleared = task.clear_invalid_optional_fields();
                if task.enforce_recurrence_exclusivity() | cleared {
                    corrected.push(task.id);
                }
                task
            })
            .collect::<Vec<_>>();
        if !corrected.is_empty() {
            warn!(
                "event=store_repair module=store status=repaired count={}",
                corrected.len()
            );
        }
        RepairReport { tasks, corrected }
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Returns a copy of the whole collection, ordered by id.
    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.values().cloned().collect()
    }

    /// Returns the records filed under `weekday`, including soft-deleted ones.
    pub fn bucket(&self, weekday: WeekdayBucket) -> Vec<&Task> {
        self.weekday_index
            .get(&weekday)
            .map(|ids| ids.iter().filter_map(|id| self.tasks.get(id)).collect())
            .unwrap_or_default()
    }

    /// Ids of soft-deleted records awaiting remote confirmation.
    pub fn pending_deletes(&self) -> Vec<TaskId> {
        self.tasks
            .values()
            .filter(|task| task.is_deleted)
            .map(|task| task.id)
            .collect()
    }

    /// Inserts a new record, assigning an id when it is nil.
    pub fn add(&mut self, mut task: Task) -> StoreResult<Task> {
        if task.id.is_nil() {
            task.id = Uuid::new_v4();
        }
        if self.tasks.contains_key(&task.id) {
            return Err(StoreError::DuplicateId(task.id));
        }
        task.weekday = task.derived_weekday();
        task.enforce_recurrence_exclusivity();
        task.validate()?;

        info!(
            "event=task_add module=store status=ok task_id={} recurring={} weekday={}",
            task.id,
            task.is_recurring(),
            task.weekday.as_str()
        );
        self.put(task.clone());
        Ok(task)
    }

    /// Inserts or replaces a record as-is (after validation). Used by sync
    /// merges where the remote copy is authoritative.
    pub fn upsert(&mut self, mut task: Task) -> StoreResult<()> {
        task.weekday = task.derived_weekday();
        task.enforce_recurrence_exclusivity();
        task.validate()?;
        self.put(task);
        Ok(())
    }

    /// Returns whether `task` appears on `date`.
    ///
    /// `today` decides which week legacy records without a target date belong to.
    pub fn appears_on(&self, task: &Task, date: NaiveDate, today: NaiveDate) -> bool {
        if !task.is_active() {
            return false;
        }
        if task.is_recurring() {
            return task_occurs_on(task, &self.calendar, date);
        }
        match task.target_date {
            Some(target) => target == date,
            None => {
                WeekdayBucket::of(date) == task.weekday
                    && self.calendar.week_instance(task.weekday.into(), today) == date
            }
        }
    }

    /// Returns the tasks appearing on `date`, timed tasks first by time of
    /// day, then untimed tasks by creation.
    ///
    /// A recurring parent is hidden on days where one of its materialized
    /// instances is present.
    pub fn query_for_date(&self, date: NaiveDate, today: NaiveDate) -> Vec<&Task> {
        let mut matches = self
            .tasks
            .values()
            .filter(|task| self.appears_on(task, date, today))
            .collect::<Vec<_>>();

        let materialized = matches
            .iter()
            .filter_map(|task| task.parent_recurring_task_id)
            .collect::<HashSet<_>>();
        if !materialized.is_empty() {
            matches.retain(|task| !(task.is_recurring() && materialized.contains(&task.id)));
        }

        matches.sort_by(|a, b| self.agenda_order(a, b));
        matches
    }

    /// Walks `start..=end` and returns every occurrence in day order.
    pub fn query_for_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        today: NaiveDate,
    ) -> Vec<Occurrence<'_>> {
        if end < start {
            return Vec::new();
        }
        start
            .iter_days()
            .take_while(|day| *day <= end)
            .flat_map(|date| {
                self.query_for_date(date, today)
                    .into_iter()
                    .map(move |task| Occurrence { date, task })
            })
            .collect()
    }

    pub fn query_today(&self, today: NaiveDate) -> Vec<&Task> {
        self.query_for_date(today, today)
    }

    /// Toggles completion of `id` on `day` through the ledger.
    pub fn toggle_completion(
        &mut self,
        id: TaskId,
        day: NaiveDate,
        now: DateTime<Utc>,
    ) -> StoreResult<(bool, Task)> {
        let task = self.tasks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let completed = CompletionLedger::toggle(task, day, now);
        info!(
            "event=task_toggle module=store status=ok task_id={} day={} completed={}",
            id, day, completed
        );
        Ok((completed, task.clone()))
    }

    /// Replaces the editable fields of an existing record.
    ///
    /// Identity, creation time, completion state and the soft-delete flag are
    /// kept from the stored record. Recurring-to-one-off edits drop all
    /// materialized instances; edits of a recurring task push title and
    /// time-of-day changes to its instances.
    pub fn edit_in_place(&mut self, updated: Task) -> StoreResult<EditOutcome> {
        let existing = self
            .tasks
            .get(&updated.id)
            .cloned()
            .ok_or(StoreError::NotFound(updated.id))?;

        let mut next = updated;
        next.created_at = existing.created_at;
        next.is_deleted = existing.is_deleted;
        next.is_completed = existing.is_completed;
        next.completed_at = existing.completed_at;
        next.completed_dates = existing.completed_dates.clone();
        next.weekday = next.derived_weekday();

        let mut outcome = EditOutcome::default();
        match (existing.recurrence, next.recurrence) {
            (Some(old), Some(new)) if old.frequency != new.frequency => {
                return Err(StoreError::FrequencyChange {
                    id: existing.id,
                    from: old.frequency,
                    to: new.frequency,
                });
            }
            (Some(_), Some(_)) => {
                next.validate()?;
                outcome.updated_instances = self.propagate_to_instances(&existing, &next);
            }
            (Some(_), None) => {
                next.completed_dates.clear();
                next.is_completed = false;
                next.completed_at = None;
                next.validate()?;
                outcome.removed_instances = self.remove_instances_of(existing.id);
            }
            (None, Some(_)) => {
                next.enforce_recurrence_exclusivity();
                next.validate()?;
            }
            (None, None) => next.validate()?,
        }

        if next.weekday != existing.weekday {
            info!(
                "event=task_rebucket module=store status=ok task_id={} from={} to={}",
                next.id,
                existing.weekday.as_str(),
                next.weekday.as_str()
            );
        }
        info!(
            "event=task_edit module=store status=ok task_id={} instances_updated={} instances_removed={}",
            next.id,
            outcome.updated_instances.len(),
            outcome.removed_instances.len()
        );
        self.put(next.clone());
        outcome.task = Some(next);
        Ok(outcome)
    }

    /// Turns a record into a recurring task in place.
    pub fn promote_to_recurring(
        &mut self,
        id: TaskId,
        recurrence: Recurrence,
    ) -> StoreResult<Task> {
        let mut task = self.tasks.get(&id).cloned().ok_or(StoreError::NotFound(id))?;
        task.recurrence = Some(recurrence);
        task.enforce_recurrence_exclusivity();
        task.validate()?;

        info!(
            "event=task_promote module=store status=ok task_id={} frequency={}",
            id,
            recurrence.frequency.as_str()
        );
        self.put(task.clone());
        Ok(task)
    }

    /// Flags a one-off record as deleted pending remote confirmation.
    pub fn soft_delete(&mut self, id: TaskId) -> StoreResult<Task> {
        let task = self.tasks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if task.is_recurring() {
            return Err(StoreError::RecurringSoftDelete(id));
        }
        task.soft_delete();
        info!("event=task_soft_delete module=store status=ok task_id={id}");
        Ok(task.clone())
    }

    /// Purges a record after its remote deletion succeeded.
    pub fn confirm_deleted(&mut self, id: TaskId) -> Option<Task> {
        let removed = self.remove(id);
        if removed.is_some() {
            info!("event=task_purge module=store status=ok task_id={id}");
        }
        removed
    }

    /// Collects the recurring parent of `id` and all of its instances.
    pub fn cascade_plan(&self, id: TaskId) -> StoreResult<CascadePlan> {
        let task = self.tasks.get(&id).ok_or(StoreError::NotFound(id))?;
        if !task.is_recurring() && !task.is_instance() {
            return Err(StoreError::NotRecurring(id));
        }
        let parent_id = task.series_id();
        let task_ids = self
            .tasks
            .values()
            .filter(|candidate| {
                candidate.id == parent_id || candidate.parent_recurring_task_id == Some(parent_id)
            })
            .map(|candidate| candidate.id)
            .collect();
        Ok(CascadePlan {
            parent_id,
            task_ids,
        })
    }

    /// Removes every record of a cascade plan.
    pub fn apply_cascade(&mut self, plan: &CascadePlan) -> Vec<Task> {
        let removed = plan
            .task_ids
            .iter()
            .filter_map(|id| self.remove(*id))
            .collect::<Vec<_>>();
        info!(
            "event=task_cascade_delete module=store status=ok parent_id={} removed={}",
            plan.parent_id,
            removed.len()
        );
        removed
    }

    fn agenda_order(&self, a: &Task, b: &Task) -> Ordering {
        let by_time = match (a.scheduled_time, b.scheduled_time) {
            (Some(left), Some(right)) => self
                .calendar
                .time_of_day(left)
                .cmp(&self.calendar.time_of_day(right)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_time
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    }

    fn propagate_to_instances(&mut self, before: &Task, after: &Task) -> Vec<Task> {
        let title_changed = before.title != after.title;
        let start_changed = before.scheduled_time.map(|t| self.calendar.time_of_day(t))
            != after.scheduled_time.map(|t| self.calendar.time_of_day(t));
        let end_changed = before.end_time.map(|t| self.calendar.time_of_day(t))
            != after.end_time.map(|t| self.calendar.time_of_day(t));
        if !title_changed && !start_changed && !end_changed {
            return Vec::new();
        }

        let calendar = self.calendar;
        let mut updated = Vec::new();
        for instance in self
            .tasks
            .values_mut()
            .filter(|task| task.parent_recurring_task_id == Some(after.id))
        {
            let day = instance
                .target_date
                .or_else(|| instance.scheduled_time.map(|t| calendar.day_of(t)))
                .unwrap_or_else(|| calendar.day_of(instance.created_at));
            if title_changed {
                instance.title = after.title.clone();
            }
            if start_changed {
                instance.scheduled_time = after
                    .scheduled_time
                    .map(|t| calendar.at(day, calendar.time_of_day(t)));
            }
            if end_changed {
                instance.end_time = after
                    .end_time
                    .map(|t| calendar.at(day, calendar.time_of_day(t)));
            }
            updated.push(instance.clone());
        }
        updated
    }

    fn remove_instances_of(&mut self, parent_id: TaskId) -> Vec<Task> {
        let ids = self
            .tasks
            .values()
            .filter(|task| task.parent_recurring_task_id == Some(parent_id))
            .map(|task| task.id)
            .collect::<Vec<_>>();
        ids.into_iter().filter_map(|id| self.remove(id)).collect()
    }

    fn put(&mut self, task: Task) {
        if let Some(previous) = self.tasks.get(&task.id) {
            let previous_bucket = previous.weekday;
            if previous_bucket != task.weekday {
                self.unindex(task.id, previous_bucket);
            }
        }
        self.weekday_index
            .entry(task.weekday)
            .or_default()
            .insert(task.id);
        self.tasks.insert(task.id, task);
    }

    fn remove(&mut self, id: TaskId) -> Option<Task> {
        let task = self.tasks.remove(&id)?;
        self.unindex(id, task.weekday);
        Some(task)
    }

    fn unindex(&mut self, id: TaskId, bucket: WeekdayBucket) {
        if let Some(ids) = self.weekday_index.get_mut(&bucket) {
            ids.remove(&id);
            if ids.is_empty() {
                self.weekday_index.remove(&bucket);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{StoreError, TaskStore};
    use crate::calendar::{Calendar, WeekStart};
    use crate::model::task::{Recurrence, RecurrenceFrequency, Task, WeekdayBucket};
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn store() -> TaskStore {
        TaskStore::new(Calendar::utc(WeekStart::Monday))
    }

    #[test]
    fn add_assigns_missing_id_and_bucket() {
        let mut store = store();
        let mut task = Task::new("dentist", at(2025, 1, 1, 8, 0)).on(date(2025, 1, 10));
        task.id = uuid::Uuid::nil();
        let stored = store.add(task).unwrap();
        assert!(!stored.id.is_nil());
        assert_eq!(store.bucket(WeekdayBucket::Friday).len(), 1);
        assert!(store.bucket(WeekdayBucket::Wednesday).is_empty());
    }

    #[test]
    fn legacy_records_only_show_in_the_current_week() {
        let mut store = store();
        let mut legacy = Task::new("legacy", at(2024, 12, 1, 8, 0));
        legacy.weekday = WeekdayBucket::Tuesday;
        store.add(legacy).unwrap();

        let today = date(2025, 1, 8);
        assert_eq!(store.query_for_date(date(2025, 1, 7), today).len(), 1);
        assert!(store.query_for_date(date(2025, 1, 14), today).is_empty());
        assert!(store.query_for_date(date(2025, 1, 8), today).is_empty());
    }

    #[test]
    fn materialized_instance_hides_its_parent_on_that_day() {
        let mut store = store();
        let mut parent = Task::new("run", at(2025, 1, 1, 8, 0)).on(date(2025, 1, 6));
        parent.recurrence = Some(Recurrence::new(RecurrenceFrequency::Weekly));
        let parent = store.add(parent).unwrap();

        let mut instance = Task::new("run", at(2025, 1, 1, 8, 0)).on(date(2025, 1, 13));
        instance.parent_recurring_task_id = Some(parent.id);
        let instance = store.add(instance).unwrap();

        let today = date(2025, 1, 6);
        let on_13th = store.query_for_date(date(2025, 1, 13), today);
        assert_eq!(on_13th.len(), 1);
        assert_eq!(on_13th[0].id, instance.id);
        let on_20th = store.query_for_date(date(2025, 1, 20), today);
        assert_eq!(on_20th[0].id, parent.id);
    }

    #[test]
    fn frequency_changes_are_rejected() {
        let mut store = store();
        let mut task = Task::new("review", at(2025, 1, 1, 8, 0)).on(date(2025, 1, 6));
        task.recurrence = Some(Recurrence::new(RecurrenceFrequency::Weekly));
        let mut stored = store.add(task).unwrap();

        stored.recurrence = Some(Recurrence::new(RecurrenceFrequency::Daily));
        let err = store.edit_in_place(stored).unwrap_err();
        assert!(matches!(err, StoreError::FrequencyChange { .. }));
    }

    #[test]
    fn editing_target_date_moves_bucket_and_keeps_state() {
        let mut store = store();
        let task = Task::new("call mom", at(2025, 1, 1, 8, 0)).on(date(2025, 1, 6));
        let stored = store.add(task).unwrap();
        store
            .toggle_completion(stored.id, date(2025, 1, 6), at(2025, 1, 6, 9, 0))
            .unwrap();

        let mut edit = stored.clone();
        edit.target_date = Some(date(2025, 1, 9));
        edit.is_completed = false;
        let outcome = store.edit_in_place(edit).unwrap();
        let edited = outcome.task.unwrap();

        assert_eq!(edited.weekday, WeekdayBucket::Thursday);
        assert_eq!(edited.created_at, stored.created_at);
        assert!(edited.is_completed);
        assert!(store.bucket(WeekdayBucket::Monday).is_empty());
        assert_eq!(store.bucket(WeekdayBucket::Thursday).len(), 1);
    }

    #[test]
    fn soft_delete_rejects_recurring_tasks() {
        let mut store = store();
        let mut task = Task::new("water", at(2025, 1, 1, 8, 0));
        task.recurrence = Some(Recurrence::new(RecurrenceFrequency::Daily));
        let stored = store.add(task).unwrap();
        assert_eq!(
            store.soft_delete(stored.id).unwrap_err(),
            StoreError::RecurringSoftDelete(stored.id)
        );
    }

    #[test]
    fn cascade_plan_rejects_plain_one_off_tasks() {
        let mut store = store();
        let stored = store
            .add(Task::new("once", at(2025, 1, 1, 8, 0)).on(date(2025, 1, 2)))
            .unwrap();
        assert_eq!(
            store.cascade_plan(stored.id).unwrap_err(),
            StoreError::NotRecurring(stored.id)
        );
    }

    #[test]
    fn validate_and_repair_reports_corrected_ids() {
        let mut broken = Task::new("habit", at(2025, 1, 1, 8, 0));
        broken.recurrence = Some(Recurrence::new(RecurrenceFrequency::Daily));
        broken.is_completed = true;
        let healthy = Task::new("once", at(2025, 1, 1, 8, 0));

        let report = TaskStore::validate_and_repair(vec![broken.clone(), healthy]);
        assert_eq!(report.corrected, vec![broken.id]);
        assert!(report.tasks.iter().all(|task| !task.is_recurring() || !task.is_completed));
    }

    #[test]
    fn repaired_records_survive_loading() {
        let parent_id = uuid::Uuid::new_v4();
        let mut instance = Task::new("run", at(2025, 1, 1, 8, 0)).on(date(2025, 1, 13));
        instance.parent_recurring_task_id = Some(parent_id);
        instance.recurrence = Some(Recurrence::new(RecurrenceFrequency::Weekly));

        let mut reversed = Task::new("meeting", at(2025, 1, 1, 8, 0)).on(date(2025, 1, 9));
        reversed.scheduled_time = Some(at(2025, 1, 9, 10, 0));
        reversed.end_time = Some(at(2025, 1, 9, 9, 0));

        let mut ended_early = Task::new("stretch", at(2025, 1, 1, 8, 0)).on(date(2025, 1, 6));
        ended_early.recurrence = Some(Recurrence::until(
            RecurrenceFrequency::Daily,
            date(2025, 1, 1),
        ));

        let report = TaskStore::validate_and_repair(vec![
            instance.clone(),
            reversed.clone(),
            ended_early.clone(),
        ]);
        assert_eq!(
            report.corrected,
            vec![instance.id, reversed.id, ended_early.id]
        );
        assert!(report.tasks.iter().all(|task| task.validate().is_ok()));

        let store = TaskStore::from_tasks(Calendar::utc(WeekStart::Monday), report.tasks);
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(instance.id).unwrap().recurrence, None);
        assert_eq!(store.get(reversed.id).unwrap().end_time, None);
        assert_eq!(
            store.get(ended_early.id).unwrap().recurrence,
            Some(Recurrence::new(RecurrenceFrequency::Daily))
        );
    }
}
