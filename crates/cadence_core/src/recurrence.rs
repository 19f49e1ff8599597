//! Recurrence rule evaluation.
//!
//! # Responsibility
//! - Answer "does a rule anchored at day A occur on day D?".
//! - Find the next occurrence on or after a given day.
//!
//! # Invariants
//! - Pure functions over calendar days; no clock access.
//! - Nothing occurs before the anchor or after the rule's end date.
//! - Monthly rules use "Nth weekday of the month" semantics. An anchor on a
//!   5th weekday therefore never recurs in months with only four of them.

use crate::calendar::Calendar;
use crate::model::task::{Recurrence, RecurrenceFrequency, Task};
use chrono::{Datelike, NaiveDate};

/// Returns whether `recurrence` anchored at `anchor` occurs on `candidate`.
pub fn occurs_on(recurrence: &Recurrence, anchor: NaiveDate, candidate: NaiveDate) -> bool {
    if candidate < anchor {
        return false;
    }
    if recurrence.end_date.is_some_and(|end| candidate > end) {
        return false;
    }

    let elapsed_days = (candidate - anchor).num_days();
    let same_weekday = candidate.weekday() == anchor.weekday();

    match recurrence.frequency {
        RecurrenceFrequency::Daily => true,
        RecurrenceFrequency::Weekly => same_weekday && elapsed_days % 7 == 0,
        RecurrenceFrequency::Biweekly => same_weekday && elapsed_days % 14 == 0,
        RecurrenceFrequency::Monthly => {
            same_weekday
                && Calendar::weekday_ordinal_in_month(candidate)
                    == Calendar::weekday_ordinal_in_month(anchor)
        }
        RecurrenceFrequency::Yearly => {
            candidate.month() == anchor.month() && candidate.day() == anchor.day()
        }
    }
}

/// Returns whether a recurring task occurs on `candidate`.
///
/// Always `false` for tasks without a recurrence rule.
pub fn task_occurs_on(task: &Task, calendar: &Calendar, candidate: NaiveDate) -> bool {
    match &task.recurrence {
        Some(recurrence) => occurs_on(recurrence, task.anchor_date(calendar), candidate),
        None => false,
    }
}

/// Returns the first occurrence on or after `from`, searching at most
/// `horizon_days` days ahead.
pub fn next_occurrence(
    recurrence: &Recurrence,
    anchor: NaiveDate,
    from: NaiveDate,
    horizon_days: u32,
) -> Option<NaiveDate> {
    let start = from.max(anchor);
    start
        .iter_days()
        .take(horizon_days as usize + 1)
        .take_while(|day| recurrence.end_date.map_or(true, |end| *day <= end))
        .find(|day| occurs_on(recurrence, anchor, *day))
}

#[cfg(test)]
mod tests {
    use super::{next_occurrence, occurs_on};
    use crate::model::task::{Recurrence, RecurrenceFrequency};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rule(frequency: RecurrenceFrequency) -> Recurrence {
        Recurrence::new(frequency)
    }

    #[test]
    fn weekly_matches_same_weekday_only() {
        let anchor = date(2025, 1, 6);
        assert!(occurs_on(&rule(RecurrenceFrequency::Weekly), anchor, date(2025, 1, 13)));
        assert!(!occurs_on(&rule(RecurrenceFrequency::Weekly), anchor, date(2025, 1, 10)));
        assert!(occurs_on(&rule(RecurrenceFrequency::Weekly), anchor, anchor));
    }

    #[test]
    fn biweekly_skips_alternate_weeks() {
        let anchor = date(2025, 1, 6);
        let biweekly = rule(RecurrenceFrequency::Biweekly);
        assert!(!occurs_on(&biweekly, anchor, date(2025, 1, 13)));
        assert!(occurs_on(&biweekly, anchor, date(2025, 1, 20)));
        assert!(occurs_on(&biweekly, anchor, date(2025, 2, 3)));
    }

    #[test]
    fn daily_ignores_weekday_but_not_anchor() {
        let daily = rule(RecurrenceFrequency::Daily);
        let anchor = date(2025, 1, 6);
        assert!(occurs_on(&daily, anchor, date(2025, 1, 11)));
        assert!(!occurs_on(&daily, anchor, date(2025, 1, 5)));
    }

    #[test]
    fn monthly_uses_weekday_ordinal() {
        let monthly = rule(RecurrenceFrequency::Monthly);
        // 2nd Monday of January 2025 and February 2025.
        let anchor = date(2025, 1, 13);
        assert!(occurs_on(&monthly, anchor, date(2025, 2, 10)));
        assert!(!occurs_on(&monthly, anchor, date(2025, 2, 17)));
        assert!(!occurs_on(&monthly, anchor, date(2025, 2, 13)));
    }

    #[test]
    fn monthly_fifth_weekday_skips_short_months() {
        let monthly = rule(RecurrenceFrequency::Monthly);
        // 5th Wednesday of January 2025; February 2025 has only four.
        let anchor = date(2025, 1, 29);
        let february = (1..=28).map(|d| date(2025, 2, d));
        assert!(february.into_iter().all(|day| !occurs_on(&monthly, anchor, day)));
        assert!(occurs_on(&monthly, anchor, date(2025, 4, 30)));
    }

    #[test]
    fn yearly_matches_month_and_day() {
        let yearly = rule(RecurrenceFrequency::Yearly);
        let anchor = date(2020, 3, 4);
        assert!(occurs_on(&yearly, anchor, date(2024, 3, 4)));
        assert!(!occurs_on(&yearly, anchor, date(2024, 3, 5)));
    }

    #[test]
    fn end_date_is_inclusive() {
        let until = Recurrence::until(RecurrenceFrequency::Daily, date(2025, 1, 10));
        let anchor = date(2025, 1, 6);
        assert!(occurs_on(&until, anchor, date(2025, 1, 10)));
        assert!(!occurs_on(&until, anchor, date(2025, 1, 11)));
    }

    #[test]
    fn next_occurrence_respects_anchor_and_end() {
        let weekly = rule(RecurrenceFrequency::Weekly);
        let anchor = date(2025, 1, 6);
        assert_eq!(next_occurrence(&weekly, anchor, date(2024, 12, 1), 30), Some(anchor));
        assert_eq!(
            next_occurrence(&weekly, anchor, date(2025, 1, 7), 30),
            Some(date(2025, 1, 13))
        );

        let ended = Recurrence::until(RecurrenceFrequency::Weekly, date(2025, 1, 12));
        assert_eq!(next_occurrence(&ended, anchor, date(2025, 1, 7), 30), None);
        assert_eq!(next_occurrence(&weekly, anchor, date(2025, 1, 7), 3), None);
    }
}
