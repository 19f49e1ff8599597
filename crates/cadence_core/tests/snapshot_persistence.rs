use cadence_core::db::{open_db, open_db_in_memory};
use cadence_core::{
    CoreConfig, FixedClock, Recurrence, RecurrenceFrequency, SnapshotRepository,
    SqliteSnapshotRepository, SyncOp, Task, TaskService, TaskSnapshot,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 8, 12, 0, 0).unwrap()
}

#[test]
fn mutations_survive_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cadence.db");

    let habit_id = {
        let conn = open_db(&path).unwrap();
        let repo = SqliteSnapshotRepository::new(&conn);
        let mut service =
            TaskService::open_with_clock(repo, FixedClock(now()), CoreConfig::default()).unwrap();

        let mut habit = Task::new("stretch", now()).on(date(2025, 1, 6));
        habit.recurrence = Some(Recurrence::new(RecurrenceFrequency::Daily));
        let habit = service.add_task(habit).unwrap();
        service.toggle_completion(habit.id, date(2025, 1, 7)).unwrap();
        habit.id
    };

    let conn = open_db(&path).unwrap();
    let repo = SqliteSnapshotRepository::new(&conn);
    let service =
        TaskService::open_with_clock(repo, FixedClock(now()), CoreConfig::default()).unwrap();

    let reloaded = service.get(habit_id).unwrap();
    assert!(reloaded.completed_dates.contains(&date(2025, 1, 7)));
    assert_eq!(service.outbox().get(habit_id).unwrap().op, SyncOp::Upsert);
}

#[test]
fn load_repairs_completed_recurring_records_and_requeues_them() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSnapshotRepository::new(&conn);

    let mut broken = Task::new("water plants", now()).on(date(2025, 1, 6));
    broken.recurrence = Some(Recurrence::new(RecurrenceFrequency::Weekly));
    broken.is_completed = true;
    broken.completed_at = Some(now());
    repo.save_snapshot(
        "tasks_snapshot",
        &TaskSnapshot::new(vec![broken.clone()], Vec::new()),
    )
    .unwrap();

    let service = TaskService::open_with_clock(
        SqliteSnapshotRepository::new(&conn),
        FixedClock(now()),
        CoreConfig::default(),
    )
    .unwrap();

    let repaired = service.get(broken.id).unwrap();
    assert!(!repaired.is_completed);
    assert_eq!(repaired.completed_at, None);
    assert_eq!(service.outbox().get(broken.id).unwrap().op, SyncOp::Update);

    let persisted = repo.load_snapshot("tasks_snapshot").unwrap().unwrap();
    assert!(!persisted.tasks[0].is_completed);
    assert_eq!(persisted.pending_sync.len(), 1);
}

#[test]
fn soft_deleted_records_are_requeued_for_remote_deletion() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSnapshotRepository::new(&conn);

    let mut pending = Task::new("old errand", now()).on(date(2025, 1, 7));
    pending.soft_delete();
    repo.save_snapshot(
        "tasks_snapshot",
        &TaskSnapshot::new(vec![pending.clone()], Vec::new()),
    )
    .unwrap();

    let service =
        TaskService::open_with_clock(repo, FixedClock(now()), CoreConfig::default()).unwrap();
    assert_eq!(service.outbox().get(pending.id).unwrap().op, SyncOp::Delete);
    assert!(service.tasks_for_date(date(2025, 1, 7)).is_empty());
}

#[test]
fn snapshot_key_comes_from_config() {
    let conn = open_db_in_memory().unwrap();
    let config = CoreConfig::from_json(r#"{"snapshot_key":"alt"}"#).unwrap();
    let mut service = TaskService::open_with_clock(
        SqliteSnapshotRepository::new(&conn),
        FixedClock(now()),
        config,
    )
    .unwrap();
    service.add_task(Task::new("note", now())).unwrap();

    let repo = SqliteSnapshotRepository::new(&conn);
    assert!(repo.load_snapshot("tasks_snapshot").unwrap().is_none());
    assert_eq!(repo.load_snapshot("alt").unwrap().unwrap().tasks.len(), 1);
}

#[test]
fn records_with_invalid_optional_fields_are_repaired_not_dropped() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSnapshotRepository::new(&conn);

    let mut reversed = Task::new("standup", now()).on(date(2025, 1, 9));
    reversed.scheduled_time = Some(Utc.with_ymd_and_hms(2025, 1, 9, 10, 0, 0).unwrap());
    reversed.end_time = Some(Utc.with_ymd_and_hms(2025, 1, 9, 9, 30, 0).unwrap());
    let mut deleted = reversed.clone();
    deleted.id = uuid::Uuid::new_v4();
    deleted.soft_delete();
    repo.save_snapshot(
        "tasks_snapshot",
        &TaskSnapshot::new(vec![reversed.clone(), deleted.clone()], Vec::new()),
    )
    .unwrap();

    {
        let mut service = TaskService::open_with_clock(
            SqliteSnapshotRepository::new(&conn),
            FixedClock(now()),
            CoreConfig::default(),
        )
        .unwrap();
        service
            .add_task(Task::new("unrelated", now()).on(date(2025, 1, 10)))
            .unwrap();
    }

    let service = TaskService::open_with_clock(
        SqliteSnapshotRepository::new(&conn),
        FixedClock(now()),
        CoreConfig::default(),
    )
    .unwrap();
    let repaired = service.get(reversed.id).unwrap();
    assert_eq!(repaired.end_time, None);
    assert_eq!(repaired.scheduled_time, reversed.scheduled_time);
    assert_eq!(service.outbox().get(reversed.id).unwrap().op, SyncOp::Update);
    assert!(service.get(deleted.id).unwrap().is_deleted);
    assert_eq!(service.outbox().get(deleted.id).unwrap().op, SyncOp::Delete);

    let persisted = repo.load_snapshot("tasks_snapshot").unwrap().unwrap();
    assert_eq!(persisted.tasks.len(), 3);
}
