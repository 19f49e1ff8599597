//! Per-task completion ledger.
//!
//! # Responsibility
//! - Toggle completion for one-off tasks (single flag) and recurring tasks
//!   (set of completed days).
//! - Answer "was this task completed on day D?".
//!
//! # Invariants
//! - Ledger entries are calendar days; membership is day equality.
//! - Every mutation of a recurring task leaves `is_completed == false` and
//!   `completed_at == None`.
//! - The ledger does not check whether a day is an actual occurrence; that
//!   decision belongs to the caller.

use crate::model::task::Task;
use chrono::{DateTime, NaiveDate, Utc};
use log::warn;

/// Stateless completion operations over task records.
pub struct CompletionLedger;

impl CompletionLedger {
    /// Flips completion of `task` on `day` and returns the new state.
    ///
    /// One-off tasks ignore `day` and flip their single flag, stamping
    /// `completed_at = now` when turning on. Recurring tasks add or remove
    /// `day` from the ledger.
    pub fn toggle(task: &mut Task, day: NaiveDate, now: DateTime<Utc>) -> bool {
        if task.is_recurring() {
            let completed = if task.completed_dates.remove(&day) {
                false
            } else {
                task.completed_dates.insert(day);
                true
            };
            Self::repair(task);
            return completed;
        }

        task.is_completed = !task.is_completed;
        task.completed_at = task.is_completed.then_some(now);
        task.is_completed
    }

    /// Returns whether `task` counts as completed on `day`.
    pub fn is_completed_on(task: &Task, day: NaiveDate) -> bool {
        if task.is_recurring() {
            task.completed_dates.contains(&day)
        } else {
            task.is_completed
        }
    }

    /// Re-asserts recurrence exclusivity on a recurring record.
    ///
    /// Returns `true` when the record had to be corrected.
    pub fn repair(task: &mut Task) -> bool {
        let repaired = task.enforce_recurrence_exclusivity();
        if repaired {
            warn!(
                "event=ledger_repair module=ledger status=repaired task_id={}",
                task.id
            );
        }
        repaired
    }
}

#[cfg(test)]
mod tests {
    use super::CompletionLedger;
    use crate::model::task::{Recurrence, RecurrenceFrequency, Task};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn recurring() -> Task {
        let created = Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap();
        let mut task = Task::new("stretch", created).on(date(2025, 1, 6));
        task.recurrence = Some(Recurrence::new(RecurrenceFrequency::Daily));
        task
    }

    #[test]
    fn one_off_toggle_stamps_and_clears_completed_at() {
        let now = Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap();
        let mut task = Task::new("file taxes", now).on(date(2025, 1, 6));

        assert!(CompletionLedger::toggle(&mut task, date(2025, 1, 6), now));
        assert_eq!(task.completed_at, Some(now));
        assert!(CompletionLedger::is_completed_on(&task, date(2025, 2, 1)));

        assert!(!CompletionLedger::toggle(&mut task, date(2025, 1, 6), now));
        assert_eq!(task.completed_at, None);
    }

    #[test]
    fn recurring_toggle_is_an_involution_per_day() {
        let now = Utc.with_ymd_and_hms(2025, 1, 8, 9, 0, 0).unwrap();
        let mut task = recurring();
        let before = task.clone();

        assert!(CompletionLedger::toggle(&mut task, date(2025, 1, 7), now));
        assert!(CompletionLedger::is_completed_on(&task, date(2025, 1, 7)));
        assert!(!CompletionLedger::is_completed_on(&task, date(2025, 1, 8)));

        assert!(!CompletionLedger::toggle(&mut task, date(2025, 1, 7), now));
        assert_eq!(task, before);
    }

    #[test]
    fn recurring_toggle_repairs_one_off_flags() {
        let now = Utc.with_ymd_and_hms(2025, 1, 8, 9, 0, 0).unwrap();
        let mut task = recurring();
        task.is_completed = true;
        task.completed_at = Some(now);

        CompletionLedger::toggle(&mut task, date(2025, 1, 8), now);
        assert!(!task.is_completed);
        assert_eq!(task.completed_at, None);
    }
}
