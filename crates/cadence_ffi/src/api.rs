//! FFI use-case API for the mobile host.
//!
//! # Responsibility
//! - Expose task scheduling use cases to Dart via FRB.
//! - Translate engine errors into simple response envelopes.
//!
//! # Invariants
//! - Exported functions never panic across the FFI boundary.
//! - Every engine call runs under one process-wide lock, so mutations are
//!   serialized even when the host calls from several isolates.
//! - Ids, days and instants cross the boundary as strings (`uuid`,
//!   `YYYY-MM-DD`) and epoch milliseconds.

use cadence_core::db::open_db;
use cadence_core::service::OutgoingOp;
use cadence_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    CoreConfig, Recurrence, RecurrenceFrequency, ReminderRule, SqliteSnapshotRepository,
    SystemClock, Task, TaskId, TaskService, TaskServiceError,
};
use chrono::{DateTime, NaiveDate, Utc};
use log::warn;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

const ENGINE_DB_FILE_NAME: &str = "cadence_engine.sqlite3";
static ENGINE_DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static ENGINE_CONFIG: OnceLock<CoreConfig> = OnceLock::new();
static ENGINE_LOCK: Mutex<()> = Mutex::new(());

type EngineService<'conn> = TaskService<SqliteSnapshotRepository<'conn>, SystemClock>;

/// Minimal health-check API for FRB smoke integration.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes engine logging once per process.
///
/// # FFI contract
/// - `level`: `trace|debug|info|warn|error`, case-insensitive.
/// - `log_dir`: absolute directory for rolling logs.
/// - Returns an empty string on success, an error message otherwise.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Installs the engine config from a JSON document.
///
/// # FFI contract
/// - Must be called before the first task call to take effect.
/// - Re-applying an identical config is accepted; a different one is rejected.
/// - Returns an empty string on success, an error message otherwise.
#[flutter_rust_bridge::frb(sync)]
pub fn configure_engine(config_json: String) -> String {
    let config = match CoreConfig::from_json(&config_json) {
        Ok(config) => config,
        Err(err) => return format!("configure_engine failed: {err}"),
    };
    let active = ENGINE_CONFIG.get_or_init(|| config.clone());
    if *active == config {
        String::new()
    } else {
        "configure_engine failed: engine already configured with different settings".to_string()
    }
}

/// Task creation request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskAddRequest {
    pub title: String,
    pub description: Option<String>,
    /// `YYYY-MM-DD`; today in the engine calendar when absent.
    pub target_date: Option<String>,
    pub scheduled_epoch_ms: Option<i64>,
    pub end_epoch_ms: Option<i64>,
    /// `daily|weekly|biweekly|monthly|yearly`.
    pub recurrence: Option<String>,
    /// `YYYY-MM-DD`, inclusive.
    pub recurrence_end_date: Option<String>,
    /// `five_minutes|fifteen_minutes|thirty_minutes|one_hour|one_day`.
    pub reminder: Option<String>,
    pub tag_id: Option<String>,
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskActionResponse {
    pub ok: bool,
    pub task_id: Option<String>,
    /// Completion state after a toggle; `None` for other actions.
    pub completed: Option<bool>,
    pub message: String,
}

impl TaskActionResponse {
    fn success(message: impl Into<String>, task_id: TaskId, completed: Option<bool>) -> Self {
        Self {
            ok: true,
            task_id: Some(task_id.to_string()),
            completed,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            task_id: None,
            completed: None,
            message: message.into(),
        }
    }
}

/// One row of today's widget projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodayItem {
    pub task_id: String,
    pub title: String,
    pub scheduled_epoch_ms: Option<i64>,
    pub is_completed_today: bool,
    pub tag_id: Option<String>,
    pub tag_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagName {
    pub tag_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodayResponse {
    pub ok: bool,
    pub items: Vec<TodayItem>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityItem {
    pub series_id: String,
    pub title: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlySummaryResponse {
    pub ok: bool,
    pub total_completed: u32,
    pub recurring_completed: u32,
    pub one_off_completed: u32,
    pub top_activities: Vec<ActivityItem>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncIngestResponse {
    pub ok: bool,
    pub merged: u32,
    pub skipped: u32,
    pub kept_local: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesDeletePlanResponse {
    pub ok: bool,
    pub parent_id: Option<String>,
    /// Every record whose remote delete must be confirmed.
    pub task_ids: Vec<String>,
    pub message: String,
}

/// Adds a task.
#[flutter_rust_bridge::frb(sync)]
pub fn task_add(request: TaskAddRequest) -> TaskActionResponse {
    let task = match build_task(request) {
        Ok(task) => task,
        Err(err) => return TaskActionResponse::failure(format!("task_add failed: {err}")),
    };
    match with_task_service(|service| service.add_task(task)) {
        Ok(task) => TaskActionResponse::success("Task added.", task.id, None),
        Err(err) => TaskActionResponse::failure(format!("task_add failed: {err}")),
    }
}

/// Toggles completion on `day` (`YYYY-MM-DD`), or today when absent.
#[flutter_rust_bridge::frb(sync)]
pub fn task_toggle(task_id: String, day: Option<String>) -> TaskActionResponse {
    let id = match parse_task_id(&task_id) {
        Ok(id) => id,
        Err(err) => return TaskActionResponse::failure(format!("task_toggle failed: {err}")),
    };
    let day = match day.as_deref().map(parse_day).transpose() {
        Ok(day) => day,
        Err(err) => return TaskActionResponse::failure(format!("task_toggle failed: {err}")),
    };
    let result = with_task_service(|service| match day {
        Some(day) => service.toggle_completion(id, day),
        None => service.toggle_today(id),
    });
    match result {
        Ok(completed) => TaskActionResponse::success("Completion toggled.", id, Some(completed)),
        Err(err) => TaskActionResponse::failure(format!("task_toggle failed: {err}")),
    }
}

/// Soft-deletes a one-off task pending remote confirmation.
#[flutter_rust_bridge::frb(sync)]
pub fn task_delete(task_id: String) -> TaskActionResponse {
    let id = match parse_task_id(&task_id) {
        Ok(id) => id,
        Err(err) => return TaskActionResponse::failure(format!("task_delete failed: {err}")),
    };
    match with_task_service(|service| service.delete_task(id)) {
        Ok(task) => TaskActionResponse::success("Task deleted.", task.id, None),
        Err(err) => TaskActionResponse::failure(format!("task_delete failed: {err}")),
    }
}

/// Lists the records the host must delete remotely to remove a series.
#[flutter_rust_bridge::frb(sync)]
pub fn series_delete_plan(task_id: String) -> SeriesDeletePlanResponse {
    let failure = |message: String| SeriesDeletePlanResponse {
        ok: false,
        parent_id: None,
        task_ids: Vec::new(),
        message,
    };
    let id = match parse_task_id(&task_id) {
        Ok(id) => id,
        Err(err) => return failure(format!("series_delete_plan failed: {err}")),
    };
    match with_task_service(|service| service.cascade_plan(id)) {
        Ok(plan) => SeriesDeletePlanResponse {
            ok: true,
            parent_id: Some(plan.parent_id.to_string()),
            task_ids: plan.task_ids.iter().map(TaskId::to_string).collect(),
            message: format!("{} record(s) to delete.", plan.task_ids.len()),
        },
        Err(err) => failure(format!("series_delete_plan failed: {err}")),
    }
}

/// Removes a series locally once the host confirmed every remote delete.
///
/// Nothing is removed when any planned id is missing from `confirmed_ids`.
#[flutter_rust_bridge::frb(sync)]
pub fn series_delete_confirm(task_id: String, confirmed_ids: Vec<String>) -> TaskActionResponse {
    let id = match parse_task_id(&task_id) {
        Ok(id) => id,
        Err(err) => {
            return TaskActionResponse::failure(format!("series_delete_confirm failed: {err}"))
        }
    };
    let confirmed = confirmed_ids
        .iter()
        .filter_map(|raw| parse_task_id(raw).ok())
        .collect::<Vec<_>>();
    match with_task_service(|service| service.confirm_cascade(id, &confirmed)) {
        Ok(removed) => TaskActionResponse::success(
            format!("Series deleted ({} record(s)).", removed.len()),
            id,
            None,
        ),
        Err(err) => TaskActionResponse::failure(format!("series_delete_confirm failed: {err}")),
    }
}

/// Returns today's occurrences for widgets and summaries.
#[flutter_rust_bridge::frb(sync)]
pub fn today_entries(tag_names: Vec<TagName>) -> TodayResponse {
    let tags = tag_names
        .into_iter()
        .map(|tag| (tag.tag_id, tag.name))
        .collect::<BTreeMap<_, _>>();
    match with_task_service(|service| Ok(service.today_export(&tags))) {
        Ok(entries) => TodayResponse {
            ok: true,
            message: format!("{} task(s) today.", entries.len()),
            items: entries
                .into_iter()
                .map(|entry| TodayItem {
                    task_id: entry.id.to_string(),
                    title: entry.title,
                    scheduled_epoch_ms: entry.scheduled_time.map(|t| t.timestamp_millis()),
                    is_completed_today: entry.is_completed_today,
                    tag_id: entry.tag_id,
                    tag_name: entry.tag_name,
                })
                .collect(),
        },
        Err(err) => TodayResponse {
            ok: false,
            items: Vec::new(),
            message: format!("today_entries failed: {err}"),
        },
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn monthly_summary(year: i32, month: u32) -> MonthlySummaryResponse {
    match with_task_service(|service| Ok(service.monthly_summary(year, month))) {
        Ok(summary) => MonthlySummaryResponse {
            ok: true,
            total_completed: summary.total_completed,
            recurring_completed: summary.recurring_completed,
            one_off_completed: summary.one_off_completed,
            top_activities: summary
                .top_activities
                .into_iter()
                .map(|activity| ActivityItem {
                    series_id: activity.series_id.to_string(),
                    title: activity.title,
                    count: activity.count,
                })
                .collect(),
            message: String::new(),
        },
        Err(err) => MonthlySummaryResponse {
            ok: false,
            total_completed: 0,
            recurring_completed: 0,
            one_off_completed: 0,
            top_activities: Vec::new(),
            message: format!("monthly_summary failed: {err}"),
        },
    }
}

/// Merges remote rows fetched by the host (a JSON array of row objects).
#[flutter_rust_bridge::frb(sync)]
pub fn sync_ingest_rows(rows_json: String) -> SyncIngestResponse {
    let failure = |message: String| SyncIngestResponse {
        ok: false,
        merged: 0,
        skipped: 0,
        kept_local: 0,
        message,
    };
    let rows = match serde_json::from_str::<Vec<serde_json::Value>>(&rows_json) {
        Ok(rows) => rows,
        Err(err) => return failure(format!("sync_ingest_rows failed: invalid JSON: {err}")),
    };
    match with_task_service(|service| service.ingest_rows(&rows)) {
        Ok(report) => SyncIngestResponse {
            ok: true,
            merged: saturating_u32(report.merged),
            skipped: saturating_u32(report.skipped),
            kept_local: saturating_u32(report.kept_local),
            message: format!("Merged {} row(s).", report.merged),
        },
        Err(err) => failure(format!("sync_ingest_rows failed: {err}")),
    }
}

/// Returns queued remote operations as a JSON array of
/// `{id, op, attempts, row}` objects; `row` is null for deletes.
///
/// Operations stay queued until acknowledged with `sync_ack`.
#[flutter_rust_bridge::frb(sync)]
pub fn sync_pending_json() -> String {
    match with_task_service(|service| Ok(service.pending_sync())) {
        Ok(pending) => serde_json::Value::Array(pending.iter().map(outgoing_to_json).collect())
            .to_string(),
        Err(err) => {
            warn!("event=ffi_sync_pending module=ffi status=error error={err}");
            "[]".to_string()
        }
    }
}

/// Reports the remote outcome of one queued operation.
#[flutter_rust_bridge::frb(sync)]
pub fn sync_ack(task_id: String, success: bool) -> TaskActionResponse {
    let id = match parse_task_id(&task_id) {
        Ok(id) => id,
        Err(err) => return TaskActionResponse::failure(format!("sync_ack failed: {err}")),
    };
    match with_task_service(|service| service.acknowledge_sync(id, success)) {
        Ok(()) => TaskActionResponse::success("Acknowledged.", id, None),
        Err(err) => TaskActionResponse::failure(format!("sync_ack failed: {err}")),
    }
}

fn build_task(request: TaskAddRequest) -> Result<Task, String> {
    let now = Utc::now();
    let mut task = Task::new(request.title.trim(), now);
    if let Some(day) = request.target_date.as_deref() {
        task = task.on(parse_day(day)?);
    }
    task.description = request
        .description
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());
    task.scheduled_time = request.scheduled_epoch_ms.map(parse_epoch_ms).transpose()?;
    task.end_time = request.end_epoch_ms.map(parse_epoch_ms).transpose()?;
    if let Some(raw) = request.recurrence.as_deref() {
        let frequency = RecurrenceFrequency::parse(raw)
            .ok_or_else(|| format!("unsupported recurrence `{raw}`"))?;
        let end_date = request
            .recurrence_end_date
            .as_deref()
            .map(parse_day)
            .transpose()?;
        task.recurrence = Some(Recurrence {
            frequency,
            end_date,
        });
    }
    if let Some(raw) = request.reminder.as_deref() {
        task.reminder =
            Some(ReminderRule::parse(raw).ok_or_else(|| format!("unsupported reminder `{raw}`"))?);
    }
    task.tag_id = request.tag_id.filter(|tag| !tag.trim().is_empty());
    Ok(task)
}

fn outgoing_to_json(outgoing: &OutgoingOp) -> serde_json::Value {
    serde_json::json!({
        "id": outgoing.id.to_string(),
        "op": outgoing.op.as_str(),
        "attempts": outgoing.attempts,
        "row": outgoing.row.clone().unwrap_or(serde_json::Value::Null),
    })
}

fn parse_task_id(raw: &str) -> Result<TaskId, String> {
    TaskId::parse_str(raw.trim()).map_err(|err| format!("invalid task id `{raw}`: {err}"))
}

fn parse_day(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("invalid day `{raw}`: {err}"))
}

fn parse_epoch_ms(value: i64) -> Result<DateTime<Utc>, String> {
    DateTime::from_timestamp_millis(value).ok_or_else(|| format!("invalid epoch ms `{value}`"))
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn resolve_engine_db_path() -> PathBuf {
    ENGINE_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var("CADENCE_DB_PATH") {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(ENGINE_DB_FILE_NAME)
        })
        .clone()
}

fn with_task_service<T>(
    f: impl FnOnce(&mut EngineService<'_>) -> Result<T, TaskServiceError>,
) -> Result<T, String> {
    let _guard = ENGINE_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let config = ENGINE_CONFIG.get_or_init(CoreConfig::default).clone();
    let conn = open_db(resolve_engine_db_path())
        .map_err(|err| format!("engine DB open failed: {err}"))?;
    let repo = SqliteSnapshotRepository::new(&conn);
    let mut service =
        TaskService::open(repo, config).map_err(|err| format!("engine open failed: {err}"))?;
    f(&mut service).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, init_logging, ping, sync_ingest_rows, sync_pending_json, task_add,
        task_delete, task_toggle, today_entries, TagName, TaskAddRequest,
    };
    use chrono::Utc;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_bad_input() {
        assert!(!init_logging("info".to_string(), String::new()).is_empty());
        assert!(!init_logging("verbose".to_string(), "/tmp/logs".to_string()).is_empty());
    }

    #[test]
    fn added_task_shows_up_today_with_its_tag() {
        let title = unique_token("ffi-today");
        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
        let added = task_add(TaskAddRequest {
            title: title.clone(),
            target_date: Some(today.clone()),
            tag_id: Some("work".to_string()),
            ..TaskAddRequest::default()
        });
        assert!(added.ok, "{}", added.message);
        let id = added.task_id.unwrap();

        let toggled = task_toggle(id.clone(), Some(today));
        assert!(toggled.ok, "{}", toggled.message);
        assert_eq!(toggled.completed, Some(true));

        let response = today_entries(vec![TagName {
            tag_id: "work".to_string(),
            name: "Work".to_string(),
        }]);
        assert!(response.ok, "{}", response.message);
        let item = response
            .items
            .iter()
            .find(|item| item.task_id == id)
            .expect("added task should be listed today");
        assert!(item.is_completed_today);
        assert_eq!(item.tag_name.as_deref(), Some("Work"));
    }

    #[test]
    fn undated_task_is_scheduled_for_today() {
        let title = unique_token("ffi-undated");
        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
        let added = task_add(TaskAddRequest {
            title,
            ..TaskAddRequest::default()
        });
        assert!(added.ok, "{}", added.message);
        let id = added.task_id.unwrap();

        let response = today_entries(Vec::new());
        assert!(response.ok, "{}", response.message);
        assert!(response.items.iter().any(|item| item.task_id == id));

        let pending: serde_json::Value = serde_json::from_str(&sync_pending_json()).unwrap();
        let row = &pending
            .as_array()
            .unwrap()
            .iter()
            .find(|entry| entry["id"] == id.as_str())
            .expect("upload should be pending")["row"];
        assert!(row["targetDate"].as_str().unwrap().starts_with(&today));
    }

    #[test]
    fn add_rejects_unknown_recurrence() {
        let response = task_add(TaskAddRequest {
            title: "bad".to_string(),
            recurrence: Some("hourly".to_string()),
            ..TaskAddRequest::default()
        });
        assert!(!response.ok);
        assert!(response.message.contains("hourly"));
    }

    #[test]
    fn deleted_task_is_queued_for_remote_delete() {
        let added = task_add(TaskAddRequest {
            title: unique_token("ffi-delete"),
            ..TaskAddRequest::default()
        });
        let id = added.task_id.unwrap();
        assert!(task_delete(id.clone()).ok);

        let pending: serde_json::Value = serde_json::from_str(&sync_pending_json()).unwrap();
        let entry = pending
            .as_array()
            .unwrap()
            .iter()
            .find(|entry| entry["id"] == id.as_str())
            .expect("delete should be pending");
        assert_eq!(entry["op"], "delete");
        assert!(entry["row"].is_null());
    }

    #[test]
    fn ingest_rejects_non_array_payloads() {
        let response = sync_ingest_rows("{\"id\":1}".to_string());
        assert!(!response.ok);
        assert!(response.message.contains("invalid JSON"));
    }

    fn unique_token(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        format!("{prefix}-{nanos}")
    }
}
