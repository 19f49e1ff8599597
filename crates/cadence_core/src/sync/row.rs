//! Remote row codec.
//!
//! # Responsibility
//! - Encode task records into the camelCase row shape of the remote store.
//! - Decode remote rows one at a time, tolerating junk in optional fields.
//!
//! # Invariants
//! - A row missing or mangling `id`, `title`, `isCompleted`, `weekday` or
//!   `createdAt` is rejected as a whole.
//! - Any other field that fails to parse is treated as absent.
//! - Keys this codec does not know are carried through in `email_fields`.
//! - `completedDatesJson` holds a JSON array of `YYYY-MM-DD` strings.

use crate::calendar::Calendar;
use crate::model::task::{
    Recurrence, RecurrenceFrequency, ReminderRule, Task, TaskId, WeekdayBucket,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use log::warn;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const KNOWN_KEYS: &[&str] = &[
    "id",
    "userId",
    "title",
    "description",
    "isCompleted",
    "weekday",
    "createdAt",
    "isRecurring",
    "recurrenceFrequency",
    "recurrenceEndDate",
    "parentRecurringTaskId",
    "scheduledTime",
    "endTime",
    "targetDate",
    "reminderRule",
    "tagId",
    "completedDatesJson",
    "completedAt",
];

/// Reason a remote row was discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowDecodeError {
    NotAnObject,
    MissingField(&'static str),
    InvalidField { field: &'static str, value: String },
}

impl Display for RowDecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "row is not a JSON object"),
            Self::MissingField(field) => write!(f, "row is missing required field `{field}`"),
            Self::InvalidField { field, value } => {
                write!(f, "row field `{field}` has invalid value `{value}`")
            }
        }
    }
}

impl Error for RowDecodeError {}

/// Wire shape of one task row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRow {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_completed: bool,
    pub weekday: String,
    pub created_at: String,
    pub is_recurring: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence_frequency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence_end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_recurring_task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_rule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_dates_json: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl TaskRow {
    /// Projects a task into its wire row. Day values are sent as local
    /// midnight instants.
    pub fn from_task(task: &Task, user_id: Option<&str>, calendar: &Calendar) -> Self {
        let day_instant = |day: NaiveDate| format_instant(calendar.start_of_day(day));
        let completed_dates_json = task.is_recurring().then(|| {
            let days = task
                .completed_dates
                .iter()
                .map(|day| day.format("%Y-%m-%d").to_string())
                .collect::<Vec<_>>();
            Value::from(days).to_string()
        });

        Self {
            id: task.id.to_string(),
            user_id: user_id.map(str::to_string),
            title: task.title.clone(),
            description: task.description.clone(),
            is_completed: task.is_completed,
            weekday: task.weekday.as_str().to_string(),
            created_at: format_instant(task.created_at),
            is_recurring: task.is_recurring(),
            recurrence_frequency: task
                .recurrence
                .map(|rule| rule.frequency.as_str().to_string()),
            recurrence_end_date: task.recurrence.and_then(|rule| rule.end_date).map(day_instant),
            parent_recurring_task_id: task.parent_recurring_task_id.map(|id| id.to_string()),
            scheduled_time: task.scheduled_time.map(format_instant),
            end_time: task.end_time.map(format_instant),
            target_date: task.target_date.map(day_instant),
            reminder_rule: task.reminder.map(|rule| rule.as_str().to_string()),
            tag_id: task.tag_id.clone(),
            completed_dates_json,
            completed_at: task.completed_at.map(format_instant),
        }
    }
}

/// Encodes a task as a JSON row, merging pass-through fields back in.
pub fn encode_row(task: &Task, user_id: Option<&str>, calendar: &Calendar) -> Value {
    let row = TaskRow::from_task(task, user_id, calendar);
    let mut value = serde_json::to_value(row).unwrap_or_else(|_| Value::Object(Map::new()));
    if let Value::Object(map) = &mut value {
        for (key, extra) in &task.email_fields {
            map.entry(key.clone()).or_insert_with(|| extra.clone());
        }
    }
    value
}

/// Decodes one remote row.
pub fn decode_row(value: &Value, calendar: &Calendar) -> Result<Task, RowDecodeError> {
    let row = value.as_object().ok_or(RowDecodeError::NotAnObject)?;

    let id = required_str(row, "id")
        .and_then(|raw| parse_or_invalid("id", raw, |raw| Uuid::parse_str(raw).ok()))?;
    let title = required_str(row, "title")?.to_string();
    let is_completed = row
        .get("isCompleted")
        .ok_or(RowDecodeError::MissingField("isCompleted"))?;
    let is_completed = is_completed.as_bool().ok_or_else(|| RowDecodeError::InvalidField {
        field: "isCompleted",
        value: is_completed.to_string(),
    })?;
    let weekday = required_str(row, "weekday")
        .and_then(|raw| parse_or_invalid("weekday", raw, WeekdayBucket::parse))?;
    let created_at = row
        .get("createdAt")
        .ok_or(RowDecodeError::MissingField("createdAt"))?;
    let created_at = parse_instant(created_at).ok_or_else(|| RowDecodeError::InvalidField {
        field: "createdAt",
        value: created_at.to_string(),
    })?;

    let mut task = Task::with_id(id, title, created_at).map_err(|_| RowDecodeError::InvalidField {
        field: "id",
        value: id.to_string(),
    })?;
    task.weekday = weekday;
    task.is_completed = is_completed;
    task.description = optional_str(row, "description").map(str::to_string);
    task.scheduled_time = row.get("scheduledTime").and_then(parse_instant);
    task.end_time = row.get("endTime").and_then(parse_instant);
    task.target_date = row
        .get("targetDate")
        .and_then(|value| parse_day(value, calendar));
    task.parent_recurring_task_id = optional_str(row, "parentRecurringTaskId")
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .filter(|parent: &TaskId| !parent.is_nil());
    task.reminder = optional_str(row, "reminderRule").and_then(ReminderRule::parse);
    task.tag_id = optional_str(row, "tagId").map(str::to_string);

    let is_recurring = row
        .get("isRecurring")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let frequency = optional_str(row, "recurrenceFrequency").and_then(RecurrenceFrequency::parse);
    if let (true, Some(frequency)) = (is_recurring, frequency) {
        task.recurrence = Some(Recurrence {
            frequency,
            end_date: row
                .get("recurrenceEndDate")
                .and_then(|value| parse_day(value, calendar)),
        });
        task.completed_dates = optional_str(row, "completedDatesJson")
            .map(parse_completed_dates)
            .unwrap_or_default();
    }
    if task.recurrence.is_some() && task.is_instance() {
        task.parent_recurring_task_id = None;
    }
    if task.is_completed && !task.is_recurring() {
        task.completed_at = row.get("completedAt").and_then(parse_instant);
    }

    task.email_fields = row
        .iter()
        .filter(|(key, _)| !KNOWN_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect::<BTreeMap<_, _>>();
    task.weekday = task.derived_weekday();
    Ok(task)
}

/// Decodes a batch, skipping rows that fail individually.
///
/// Returns the decoded tasks and the number of skipped rows.
pub fn decode_rows(rows: &[Value], calendar: &Calendar) -> (Vec<Task>, usize) {
    let mut tasks = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for (index, row) in rows.iter().enumerate() {
        match decode_row(row, calendar) {
            Ok(task) => tasks.push(task),
            Err(err) => {
                skipped += 1;
                warn!(
                    "event=row_decode module=sync status=skipped row_index={} error={}",
                    index, err
                );
            }
        }
    }
    (tasks, skipped)
}

fn required_str<'a>(
    row: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, RowDecodeError> {
    let value = row.get(field).ok_or(RowDecodeError::MissingField(field))?;
    value.as_str().ok_or_else(|| RowDecodeError::InvalidField {
        field,
        value: value.to_string(),
    })
}

fn parse_or_invalid<T>(
    field: &'static str,
    raw: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Result<T, RowDecodeError> {
    parse(raw).ok_or_else(|| RowDecodeError::InvalidField {
        field,
        value: raw.to_string(),
    })
}

fn optional_str<'a>(row: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    row.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accepts RFC 3339 strings, offset-less ISO date-times (read as UTC) and
/// epoch milliseconds.
fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => {
            let raw = raw.trim();
            DateTime::parse_from_rfc3339(raw)
                .map(|instant| instant.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                        .ok()
                        .map(|naive| naive.and_utc())
                })
        }
        Value::Number(number) => number.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn parse_day(value: &Value, calendar: &Calendar) -> Option<NaiveDate> {
    if let Some(raw) = value.as_str() {
        if let Ok(day) = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
            return Some(day);
        }
    }
    parse_instant(value).map(|instant| calendar.day_of(instant))
}

fn parse_completed_dates(raw: &str) -> BTreeSet<NaiveDate> {
    let Ok(entries) = serde_json::from_str::<Vec<Value>>(raw) else {
        warn!("event=row_decode module=sync status=degraded field=completedDatesJson");
        return BTreeSet::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let raw = entry.as_str()?.trim();
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
                parse_instant(entry).map(|instant| instant.date_naive())
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{decode_row, decode_rows, encode_row, RowDecodeError};
    use crate::calendar::Calendar;
    use crate::model::task::{Recurrence, RecurrenceFrequency, ReminderRule, Task, WeekdayBucket};
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn encode_uses_camel_case_and_ledger_json() {
        let created = Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap();
        let mut task = Task::new("stretch", created).on(date(2025, 1, 6));
        task.recurrence = Some(Recurrence::new(RecurrenceFrequency::Weekly));
        task.completed_dates.insert(date(2025, 1, 13));
        task.email_fields
            .insert("emailSubject".to_string(), json!("Re: plan"));

        let row = encode_row(&task, Some("user-1"), &Calendar::default());
        assert_eq!(row["userId"], "user-1");
        assert_eq!(row["isRecurring"], true);
        assert_eq!(row["recurrenceFrequency"], "weekly");
        assert_eq!(row["completedDatesJson"], "[\"2025-01-13\"]");
        assert_eq!(row["emailSubject"], "Re: plan");
        assert!(row.get("scheduledTime").is_none());
    }

    #[test]
    fn decode_reads_required_and_optional_fields() {
        let row = json!({
            "id": "6f1c1b8e-2f43-4a8e-9a55-0b7b1f0f5d11",
            "title": "swim",
            "isCompleted": true,
            "weekday": "tuesday",
            "createdAt": "2025-01-01T08:00:00Z",
            "isRecurring": true,
            "recurrenceFrequency": "weekly",
            "targetDate": "2025-01-07T00:00:00.000Z",
            "reminderRule": "one_hour",
            "completedDatesJson": "[\"2025-01-07\",\"2025-01-14T09:30:00Z\",\"junk\"]",
            "emailThreadId": 42
        });
        let task = decode_row(&row, &Calendar::default()).unwrap();

        assert_eq!(task.weekday, WeekdayBucket::Tuesday);
        assert_eq!(task.target_date, Some(date(2025, 1, 7)));
        assert_eq!(task.reminder, Some(ReminderRule::OneHour));
        assert_eq!(task.completed_dates.len(), 2);
        assert_eq!(task.email_fields.get("emailThreadId"), Some(&json!(42)));
        assert!(!task.email_fields.contains_key("title"));
    }

    #[test]
    fn bad_optional_fields_become_absent() {
        let row = json!({
            "id": "6f1c1b8e-2f43-4a8e-9a55-0b7b1f0f5d11",
            "title": "swim",
            "isCompleted": false,
            "weekday": "monday",
            "createdAt": "2025-01-01T08:00:00Z",
            "scheduledTime": "tomorrow-ish",
            "isRecurring": true,
            "recurrenceFrequency": "fortnightly"
        });
        let task = decode_row(&row, &Calendar::default()).unwrap();
        assert_eq!(task.scheduled_time, None);
        assert_eq!(task.recurrence, None);
    }

    #[test]
    fn missing_required_field_rejects_only_that_row() {
        let good = json!({
            "id": "6f1c1b8e-2f43-4a8e-9a55-0b7b1f0f5d11",
            "title": "swim",
            "isCompleted": false,
            "weekday": "monday",
            "createdAt": 1735718400000i64
        });
        let missing_title = json!({
            "id": "0b7b1f0f-2f43-4a8e-9a55-6f1c1b8e5d11",
            "isCompleted": false,
            "weekday": "monday",
            "createdAt": "2025-01-01T08:00:00Z"
        });

        assert_eq!(
            decode_row(&missing_title, &Calendar::default()).unwrap_err(),
            RowDecodeError::MissingField("title")
        );
        let (tasks, skipped) =
            decode_rows(&[good, missing_title, json!("nope")], &Calendar::default());
        assert_eq!(tasks.len(), 1);
        assert_eq!(skipped, 2);
    }
}
