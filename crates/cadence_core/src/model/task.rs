//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record shared by one-off and recurring tasks.
//! - Provide lifecycle helpers for soft-delete semantics.
//! - Validate structural invariants before a record is stored.
//!
//! # Invariants
//! - `id` is stable and never reused for another task.
//! - When `recurrence` is set, `is_completed == false` and `completed_at` is
//!   `None`; completion lives only in `completed_dates`.
//! - `completed_dates` stores calendar days, never instants.
//! - A materialized instance (`parent_recurring_task_id` set) carries no
//!   recurrence rule of its own.

use crate::calendar::Calendar;
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for every task record.
pub type TaskId = Uuid;

/// Weekday bucket a task is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekdayBucket {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl WeekdayBucket {
    pub const ALL: [WeekdayBucket; 7] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
        Self::Sunday,
    ];

    /// Returns the bucket for the weekday of `day`.
    pub fn of(day: NaiveDate) -> Self {
        day.weekday().into()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
            Self::Sunday => "sunday",
        }
    }

    /// Parses the lowercase wire label (`monday` .. `sunday`).
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|bucket| bucket.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

impl From<Weekday> for WeekdayBucket {
    fn from(value: Weekday) -> Self {
        match value {
            Weekday::Mon => Self::Monday,
            Weekday::Tue => Self::Tuesday,
            Weekday::Wed => Self::Wednesday,
            Weekday::Thu => Self::Thursday,
            Weekday::Fri => Self::Friday,
            Weekday::Sat => Self::Saturday,
            Weekday::Sun => Self::Sunday,
        }
    }
}

impl From<WeekdayBucket> for Weekday {
    fn from(value: WeekdayBucket) -> Self {
        match value {
            WeekdayBucket::Monday => Weekday::Mon,
            WeekdayBucket::Tuesday => Weekday::Tue,
            WeekdayBucket::Wednesday => Weekday::Wed,
            WeekdayBucket::Thursday => Weekday::Thu,
            WeekdayBucket::Friday => Weekday::Fri,
            WeekdayBucket::Saturday => Weekday::Sat,
            WeekdayBucket::Sunday => Weekday::Sun,
        }
    }
}

/// Recurrence frequency of a repeating task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceFrequency {
    Daily,
    Weekly,
    Biweekly,
    /// Same weekday and same weekday-ordinal ("2nd Tuesday") each month.
    Monthly,
    Yearly,
}

impl RecurrenceFrequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "biweekly" => Some(Self::Biweekly),
            "monthly" => Some(Self::Monthly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }
}

/// Recurrence rule attached to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub frequency: RecurrenceFrequency,
    /// Last day (inclusive) on which the task may occur.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl Recurrence {
    pub fn new(frequency: RecurrenceFrequency) -> Self {
        Self {
            frequency,
            end_date: None,
        }
    }

    pub fn until(frequency: RecurrenceFrequency, end_date: NaiveDate) -> Self {
        Self {
            frequency,
            end_date: Some(end_date),
        }
    }
}

/// Advance-alert rule. Passed through to the notification collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderRule {
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    OneDay,
}

impl ReminderRule {
    /// Minutes between the advance alert and the scheduled time.
    pub fn lead_minutes(self) -> i64 {
        match self {
            Self::FiveMinutes => 5,
            Self::FifteenMinutes => 15,
            Self::ThirtyMinutes => 30,
            Self::OneHour => 60,
            Self::OneDay => 24 * 60,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FiveMinutes => "five_minutes",
            Self::FifteenMinutes => "fifteen_minutes",
            Self::ThirtyMinutes => "thirty_minutes",
            Self::OneHour => "one_hour",
            Self::OneDay => "one_day",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "five_minutes" => Some(Self::FiveMinutes),
            "fifteen_minutes" => Some(Self::FifteenMinutes),
            "thirty_minutes" => Some(Self::ThirtyMinutes),
            "one_hour" => Some(Self::OneHour),
            "one_day" => Some(Self::OneDay),
            _ => None,
        }
    }
}

/// Model-level validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    NilId,
    BlankTitle,
    InvalidTimeWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    RecurrenceEndsBeforeStart {
        start: NaiveDate,
        end: NaiveDate,
    },
    RecurringInstance(TaskId),
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "task id must not be nil"),
            Self::BlankTitle => write!(f, "task title must not be blank"),
            Self::InvalidTimeWindow { start, end } => write!(
                f,
                "end_time ({}) must be >= scheduled_time ({})",
                end.to_rfc3339(),
                start.to_rfc3339()
            ),
            Self::RecurrenceEndsBeforeStart { start, end } => write!(
                f,
                "recurrence end date ({end}) must be >= target date ({start})"
            ),
            Self::RecurringInstance(id) => write!(
                f,
                "materialized instance {id} must not carry a recurrence rule"
            ),
        }
    }
}

impl Error for TaskValidationError {}

/// Canonical task record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Derived from `target_date` when present; legacy records only have this.
    pub weekday: WeekdayBucket,
    pub created_at: DateTime<Utc>,
    /// Explicit start/target day. Also the recurrence anchor when set.
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
    #[serde(default)]
    pub parent_recurring_task_id: Option<TaskId>,
    /// One-off completion flag.
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Recurring completion ledger.
    #[serde(default)]
    pub completed_dates: BTreeSet<NaiveDate>,
    /// Soft-delete tombstone awaiting remote confirmation.
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub reminder: Option<ReminderRule>,
    #[serde(default)]
    pub tag_id: Option<String>,
    /// Email attachment metadata, carried through unexamined.
    #[serde(default)]
    pub email_fields: BTreeMap<String, serde_json::Value>,
}

impl Task {
    /// Creates an undated one-off task with a generated id.
    ///
    /// The weekday bucket is the UTC day of `created_at` until [`Task::on`]
    /// dates it; `TaskService::add_task` dates undated tasks to today.
    pub fn new(title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: None,
            weekday: WeekdayBucket::of(created_at.date_naive()),
            created_at,
            target_date: None,
            scheduled_time: None,
            end_time: None,
            recurrence: None,
            parent_recurring_task_id: None,
            is_completed: false,
            completed_at: None,
            completed_dates: BTreeSet::new(),
            is_deleted: false,
            reminder: None,
            tag_id: None,
            email_fields: BTreeMap::new(),
        }
    }

    /// Creates a task with a caller-provided id.
    ///
    /// Used by import/sync paths where identity already exists remotely.
    pub fn with_id(
        id: TaskId,
        title: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, TaskValidationError> {
        if id.is_nil() {
            return Err(TaskValidationError::NilId);
        }
        let mut task = Self::new(title, created_at);
        task.id = id;
        Ok(task)
    }

    /// Sets the target day and refiles the weekday bucket accordingly.
    pub fn on(mut self, day: NaiveDate) -> Self {
        self.target_date = Some(day);
        self.weekday = WeekdayBucket::of(day);
        self
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// Whether this record is a materialized occurrence of a recurring task.
    pub fn is_instance(&self) -> bool {
        self.parent_recurring_task_id.is_some()
    }

    /// Returns the recurring-parent identity this record belongs to.
    pub fn series_id(&self) -> TaskId {
        self.parent_recurring_task_id.unwrap_or(self.id)
    }

    /// Reference day for recurrence evaluation: explicit target day, or the
    /// local day of creation.
    pub fn anchor_date(&self, calendar: &Calendar) -> NaiveDate {
        self.target_date
            .unwrap_or_else(|| calendar.day_of(self.created_at))
    }

    /// Weekday bucket implied by the record's fields.
    pub fn derived_weekday(&self) -> WeekdayBucket {
        self.target_date
            .map(WeekdayBucket::of)
            .unwrap_or(self.weekday)
    }

    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
    }

    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }

    /// Drops optional fields that would fail `validate`: an end time before
    /// the start, a rule on a materialized instance, and a recurrence end
    /// before the anchor.
    ///
    /// Returns `true` when something was dropped.
    pub fn clear_invalid_optional_fields(&mut self) -> bool {
        let mut cleared = false;
        if let (Some(start), Some(end)) = (self.scheduled_time, self.end_time) {
            if end < start {
                self.end_time = None;
                cleared = true;
            }
        }
        if self.is_instance() && self.recurrence.is_some() {
            self.recurrence = None;
            cleared = true;
        }
        if let (Some(start), Some(rule)) = (self.target_date, self.recurrence.as_mut()) {
            if rule.end_date.is_some_and(|end| end < start) {
                rule.end_date = None;
                cleared = true;
            }
        }
        cleared
    }

    /// Clears one-off completion fields on recurring records.
    ///
    /// Returns `true` when something had to be corrected.
    pub fn enforce_recurrence_exclusivity(&mut self) -> bool {
        if !self.is_recurring() {
            return false;
        }
        let violated = self.is_completed || self.completed_at.is_some();
        self.is_completed = false;
        self.completed_at = None;
        violated
    }

    /// Validates structural invariants.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.id.is_nil() {
            return Err(TaskValidationError::NilId);
        }
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::BlankTitle);
        }
        if let (Some(start), Some(end)) = (self.scheduled_time, self.end_time) {
            if end < start {
                return Err(TaskValidationError::InvalidTimeWindow { start, end });
            }
        }
        if let Some(recurrence) = self.recurrence {
            if self.is_instance() {
                return Err(TaskValidationError::RecurringInstance(self.id));
            }
            if let (Some(start), Some(end)) = (self.target_date, recurrence.end_date) {
                if end < start {
                    return Err(TaskValidationError::RecurrenceEndsBeforeStart { start, end });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Recurrence, RecurrenceFrequency, Task, TaskValidationError, WeekdayBucket};
    use chrono::{NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    #[test]
    fn on_refiles_weekday_bucket() {
        let created = Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap();
        let task = Task::new("water plants", created).on(NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
        assert_eq!(task.weekday, WeekdayBucket::Friday);
        assert_eq!(task.derived_weekday(), WeekdayBucket::Friday);
    }

    #[test]
    fn enforce_recurrence_exclusivity_reports_repairs() {
        let created = Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap();
        let mut task = Task::new("gym", created);
        task.is_completed = true;
        assert!(!task.enforce_recurrence_exclusivity());
        assert!(task.is_completed);

        task.recurrence = Some(Recurrence::new(RecurrenceFrequency::Daily));
        task.completed_at = Some(created);
        assert!(task.enforce_recurrence_exclusivity());
        assert!(!task.is_completed);
        assert_eq!(task.completed_at, None);
        assert!(!task.enforce_recurrence_exclusivity());
    }

    #[test]
    fn validate_rejects_recurring_instances_and_reversed_windows() {
        let created = Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap();
        let mut task = Task::new("standup", created);
        task.recurrence = Some(Recurrence::new(RecurrenceFrequency::Weekly));
        task.parent_recurring_task_id = Some(Uuid::new_v4());
        assert_eq!(task.validate(), Err(TaskValidationError::RecurringInstance(task.id)));

        task.parent_recurring_task_id = None;
        task.scheduled_time = Some(created);
        task.end_time = Some(created - chrono::TimeDelta::minutes(1));
        assert!(matches!(
            task.validate(),
            Err(TaskValidationError::InvalidTimeWindow { .. })
        ));
    }

    #[test]
    fn weekday_bucket_parse_is_case_insensitive() {
        assert_eq!(WeekdayBucket::parse("Tuesday"), Some(WeekdayBucket::Tuesday));
        assert_eq!(WeekdayBucket::parse("tue"), None);
    }
}
