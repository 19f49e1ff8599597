//! Completion statistics over the task store.
//!
//! # Responsibility
//! - Expected-occurrence counts in closed form.
//! - Month breakdowns, weekly missed-occurrence reports and month summaries
//!   built from store queries and the completion ledger.
//!
//! # Invariants
//! - Read-only: nothing here mutates the store.
//! - Future days are never reported as missed.
//! - Top activities are grouped by series identity, so an instance counts
//!   toward its recurring parent and distinct tasks sharing a title stay apart.

use crate::calendar::Calendar;
use crate::ledger::CompletionLedger;
use crate::model::task::{RecurrenceFrequency, Task, TaskId};
use crate::store::TaskStore;
use chrono::{Datelike, NaiveDate};
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Counts for one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MonthlyBreakdown {
    pub total: u32,
    pub completed: u32,
    pub incomplete: u32,
}

/// Missed occurrences of one task within a week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissedReport {
    pub task_id: TaskId,
    pub title: String,
    pub expected_count: u32,
    pub missed_count: u32,
    pub missed_dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityCount {
    pub series_id: TaskId,
    pub title: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MonthlySummary {
    pub total_completed: u32,
    pub recurring_completed: u32,
    pub one_off_completed: u32,
    pub top_activities: Vec<ActivityCount>,
}

/// Returns how many times `task` was due from its anchor up to `up_to`.
///
/// Recurring tasks use a closed form per frequency, clamped to the rule's end
/// date. Monthly and yearly counts are calendar months/years touched,
/// inclusive. One-off tasks count once if their day is on or before `up_to`.
pub fn expected_occurrences(task: &Task, calendar: &Calendar, up_to: NaiveDate) -> u32 {
    let anchor = task.anchor_date(calendar);
    let Some(recurrence) = task.recurrence else {
        return u32::from(anchor <= up_to);
    };

    let cutoff = recurrence.end_date.map_or(up_to, |end| end.min(up_to));
    if cutoff < anchor {
        return 0;
    }

    let days = (cutoff - anchor).num_days();
    let count = match recurrence.frequency {
        RecurrenceFrequency::Daily => days + 1,
        RecurrenceFrequency::Weekly => days / 7 + 1,
        RecurrenceFrequency::Biweekly => days / 14 + 1,
        RecurrenceFrequency::Monthly => {
            let months = |day: NaiveDate| i64::from(day.year()) * 12 + i64::from(day.month0());
            months(cutoff) - months(anchor) + 1
        }
        RecurrenceFrequency::Yearly => i64::from(cutoff.year() - anchor.year()) + 1,
    };
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Read-only statistics view over a task store.
pub struct StatsAggregator<'a> {
    store: &'a TaskStore,
}

impl<'a> StatsAggregator<'a> {
    pub fn new(store: &'a TaskStore) -> Self {
        Self { store }
    }

    /// Scans every day of the month against every task.
    ///
    /// Returns zeroed counts for an invalid month.
    pub fn monthly_breakdown(&self, year: i32, month: u32, today: NaiveDate) -> MonthlyBreakdown {
        let mut breakdown = MonthlyBreakdown::default();
        for day in Calendar::month_days(year, month) {
            for task in self.store.query_for_date(day, today) {
                breakdown.total += 1;
                if CompletionLedger::is_completed_on(task, day) {
                    breakdown.completed += 1;
                } else {
                    breakdown.incomplete += 1;
                }
            }
        }
        debug!(
            "event=stats_breakdown module=stats status=ok year={} month={} total={} completed={}",
            year, month, breakdown.total, breakdown.completed
        );
        breakdown
    }

    /// Reports, per task, the occurrences of the week starting at
    /// `week_start` that were due and not completed.
    ///
    /// Days after `today` count as expected but never as missed.
    pub fn missed_for_week(&self, week_start: NaiveDate, today: NaiveDate) -> Vec<MissedReport> {
        let mut reports: Vec<MissedReport> = Vec::new();
        let mut positions: BTreeMap<TaskId, usize> = BTreeMap::new();

        for day in Calendar::week_days(week_start) {
            for task in self.store.query_for_date(day, today) {
                let index = *positions.entry(task.id).or_insert_with(|| {
                    reports.push(MissedReport {
                        task_id: task.id,
                        title: task.title.clone(),
                        expected_count: 0,
                        missed_count: 0,
                        missed_dates: Vec::new(),
                    });
                    reports.len() - 1
                });
                let report = &mut reports[index];
                report.expected_count += 1;
                if day <= today && !CompletionLedger::is_completed_on(task, day) {
                    report.missed_count += 1;
                    report.missed_dates.push(day);
                }
            }
        }
        reports
    }

    /// Aggregates the distinct completed occurrences of a month.
    pub fn monthly_summary(
        &self,
        year: i32,
        month: u32,
        today: NaiveDate,
        top_limit: usize,
    ) -> MonthlySummary {
        let mut summary = MonthlySummary::default();
        let mut seen: BTreeSet<(TaskId, NaiveDate)> = BTreeSet::new();
        let mut per_series: BTreeMap<TaskId, u32> = BTreeMap::new();

        for day in Calendar::month_days(year, month) {
            for task in self.store.query_for_date(day, today) {
                if !CompletionLedger::is_completed_on(task, day) || !seen.insert((task.id, day)) {
                    continue;
                }
                summary.total_completed += 1;
                if task.is_recurring() || task.is_instance() {
                    summary.recurring_completed += 1;
                } else {
                    summary.one_off_completed += 1;
                }
                *per_series.entry(task.series_id()).or_default() += 1;
            }
        }

        let mut top = per_series
            .into_iter()
            .map(|(series_id, count)| ActivityCount {
                series_id,
                title: self.series_title(series_id),
                count,
            })
            .collect::<Vec<_>>();
        top.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.title.cmp(&b.title))
                .then_with(|| a.series_id.cmp(&b.series_id))
        });
        top.truncate(top_limit);
        summary.top_activities = top;

        debug!(
            "event=stats_summary module=stats status=ok year={} month={} completed={} recurring={} one_off={}",
            year,
            month,
            summary.total_completed,
            summary.recurring_completed,
            summary.one_off_completed
        );
        summary
    }

    /// Title of the series parent, or of any instance when the parent is gone.
    fn series_title(&self, series_id: TaskId) -> String {
        self.store
            .get(series_id)
            .or_else(|| {
                self.store
                    .iter()
                    .find(|task| task.parent_recurring_task_id == Some(series_id))
            })
            .map(|task| task.title.clone())
            .unwrap_or_default()
    }
}
