//! Reminder planning and the notification collaborator contract.
//!
//! # Responsibility
//! - Work out when a task's next alerts should fire.
//! - Hand those alerts to a host-provided notifier.
//!
//! # Invariants
//! - Only future instants are planned.
//! - Deleted, untimed and already-completed occurrences get no alerts.
//! - Alerts are keyed by task id; cancelling a task cancels all of its alerts.

use crate::calendar::Calendar;
use crate::ledger::CompletionLedger;
use crate::model::task::{Task, TaskId};
use crate::recurrence::next_occurrence;
use chrono::{DateTime, Days, NaiveDate, TimeDelta, Utc};

/// Delivery side of reminders, implemented by the host.
pub trait Notifier {
    fn schedule(&mut self, task_id: TaskId, title: &str, body: &str, fire_at: DateTime<Utc>);
    fn cancel(&mut self, task_id: TaskId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// Fires `lead_minutes` before the start.
    Advance,
    StartingNow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAlert {
    pub task_id: TaskId,
    pub kind: AlertKind,
    pub title: String,
    pub body: String,
    pub fire_at: DateTime<Utc>,
}

/// Plans the alerts for the next upcoming start of `task`.
pub fn plan_reminders(
    task: &Task,
    calendar: &Calendar,
    now: DateTime<Utc>,
    horizon_days: u32,
) -> Vec<PlannedAlert> {
    if task.is_deleted {
        return Vec::new();
    }
    let Some(start) = next_start(task, calendar, now, horizon_days) else {
        return Vec::new();
    };

    let mut alerts = Vec::with_capacity(2);
    if let Some(rule) = task.reminder {
        let lead = rule.lead_minutes();
        let fire_at = start - TimeDelta::minutes(lead);
        if fire_at > now {
            alerts.push(PlannedAlert {
                task_id: task.id,
                kind: AlertKind::Advance,
                title: task.title.clone(),
                body: advance_body(lead),
                fire_at,
            });
        }
    }
    alerts.push(PlannedAlert {
        task_id: task.id,
        kind: AlertKind::StartingNow,
        title: task.title.clone(),
        body: "Starting now".to_string(),
        fire_at: start,
    });
    alerts
}

/// Cancels existing alerts of `task` and schedules the freshly planned ones.
///
/// Returns the number of alerts scheduled.
pub fn reschedule(
    notifier: &mut dyn Notifier,
    task: &Task,
    calendar: &Calendar,
    now: DateTime<Utc>,
    horizon_days: u32,
) -> usize {
    notifier.cancel(task.id);
    let alerts = plan_reminders(task, calendar, now, horizon_days);
    for alert in &alerts {
        notifier.schedule(alert.task_id, &alert.title, &alert.body, alert.fire_at);
    }
    alerts.len()
}

fn next_start(
    task: &Task,
    calendar: &Calendar,
    now: DateTime<Utc>,
    horizon_days: u32,
) -> Option<DateTime<Utc>> {
    let scheduled = task.scheduled_time?;
    let time = calendar.time_of_day(scheduled);

    let Some(recurrence) = task.recurrence else {
        if task.is_completed {
            return None;
        }
        let start = task
            .target_date
            .map_or(scheduled, |day| calendar.at(day, time));
        return (start > now).then_some(start);
    };

    let anchor = task.anchor_date(calendar);
    let mut from: NaiveDate = calendar.day_of(now);
    let last = from.checked_add_days(Days::new(u64::from(horizon_days)))?;
    while from <= last {
        let remaining = u32::try_from((last - from).num_days()).unwrap_or(0);
        let day = next_occurrence(&recurrence, anchor, from, remaining)?;
        let start = calendar.at(day, time);
        if start > now && !CompletionLedger::is_completed_on(task, day) {
            return Some(start);
        }
        from = day.succ_opt()?;
    }
    None
}

fn advance_body(lead_minutes: i64) -> String {
    match lead_minutes {
        m if m >= 24 * 60 && m % (24 * 60) == 0 => format!("Starts in {} day(s)", m / (24 * 60)),
        m if m >= 60 && m % 60 == 0 => format!("Starts in {} hour(s)", m / 60),
        m => format!("Starts in {m} minutes"),
    }
}

#[cfg(test)]
mod tests {
    use super::{plan_reminders, reschedule, AlertKind, Notifier};
    use crate::calendar::Calendar;
    use crate::model::task::{Recurrence, RecurrenceFrequency, ReminderRule, Task, TaskId};
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    #[derive(Default)]
    struct Recorder {
        scheduled: Vec<(TaskId, DateTime<Utc>)>,
        cancelled: Vec<TaskId>,
    }

    impl Notifier for Recorder {
        fn schedule(&mut self, task_id: TaskId, _title: &str, _body: &str, fire_at: DateTime<Utc>) {
            self.scheduled.push((task_id, fire_at));
        }

        fn cancel(&mut self, task_id: TaskId) {
            self.cancelled.push(task_id);
        }
    }

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, d, h, m, 0).unwrap()
    }

    #[test]
    fn one_off_gets_advance_and_start_alerts() {
        let mut task = Task::new("standup", at(1, 8, 0))
            .on(NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
        task.scheduled_time = Some(at(10, 9, 30));
        task.reminder = Some(ReminderRule::FifteenMinutes);

        let alerts = plan_reminders(&task, &Calendar::default(), at(9, 12, 0), 366);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].kind, AlertKind::Advance);
        assert_eq!(alerts[0].fire_at, at(10, 9, 15));
        assert_eq!(alerts[1].fire_at, at(10, 9, 30));
    }

    #[test]
    fn past_advance_alert_is_dropped() {
        let mut task = Task::new("standup", at(1, 8, 0))
            .on(NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
        task.scheduled_time = Some(at(10, 9, 30));
        task.reminder = Some(ReminderRule::OneHour);

        let alerts = plan_reminders(&task, &Calendar::default(), at(10, 9, 0), 366);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::StartingNow);
    }

    #[test]
    fn recurring_skips_passed_and_completed_occurrences() {
        let anchor = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let mut task = Task::new("gym", at(1, 8, 0)).on(anchor);
        task.recurrence = Some(Recurrence::new(RecurrenceFrequency::Daily));
        task.scheduled_time = Some(at(6, 7, 0));
        task.completed_dates
            .insert(NaiveDate::from_ymd_opt(2025, 1, 9).unwrap());

        // 08:00 on the 8th: today's start has passed, tomorrow is done.
        let alerts = plan_reminders(&task, &Calendar::default(), at(8, 8, 0), 366);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].fire_at, at(10, 7, 0));
    }

    #[test]
    fn reschedule_cancels_before_scheduling() {
        let mut task = Task::new("call", at(1, 8, 0));
        task.scheduled_time = Some(at(20, 18, 0));
        let mut recorder = Recorder::default();

        let count = reschedule(&mut recorder, &task, &Calendar::default(), at(2, 8, 0), 366);
        assert_eq!(count, 1);
        assert_eq!(recorder.cancelled, vec![task.id]);
        assert_eq!(recorder.scheduled, vec![(task.id, at(20, 18, 0))]);
    }
}
