//! Injectable calendar and clock.
//!
//! # Responsibility
//! - Convert UTC instants into local calendar days and times of day.
//! - Provide the week/month arithmetic used by recurrence and statistics.
//! - Keep "now" explicit so date math is deterministic under test.
//!
//! # Invariants
//! - All day-level values are `NaiveDate` in the calendar's local offset.
//! - No function in this module reads the wall clock except `SystemClock`.

use chrono::{
    DateTime, Datelike, Days, FixedOffset, NaiveDate, NaiveTime, Offset, TimeDelta, Utc, Weekday,
};
use serde::{Deserialize, Serialize};

/// First day of the calendar week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekStart {
    /// ISO-8601 week (Monday .. Sunday).
    #[default]
    Monday,
    /// US-style week (Sunday .. Saturday).
    Sunday,
}

/// Source of the current instant.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a single instant, for tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Local calendar used for every day-level comparison in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    week_start: WeekStart,
    offset: FixedOffset,
}

impl Default for Calendar {
    fn default() -> Self {
        Self::utc(WeekStart::Monday)
    }
}

impl Calendar {
    /// Creates a calendar with the given week start and local offset.
    pub fn new(week_start: WeekStart, offset: FixedOffset) -> Self {
        Self { week_start, offset }
    }

    /// Creates a UTC calendar.
    pub fn utc(week_start: WeekStart) -> Self {
        Self {
            week_start,
            offset: Utc.fix(),
        }
    }

    pub fn week_start(&self) -> WeekStart {
        self.week_start
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Returns the local calendar day containing `instant`.
    pub fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// Returns the local time of day of `instant`.
    pub fn time_of_day(&self, instant: DateTime<Utc>) -> NaiveTime {
        instant.with_timezone(&self.offset).time()
    }

    /// Combines a local day and local time of day into a UTC instant.
    pub fn at(&self, day: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let local = day.and_time(time);
        (local - TimeDelta::seconds(i64::from(self.offset.local_minus_utc()))).and_utc()
    }

    /// Returns local midnight of `day` as a UTC instant.
    pub fn start_of_day(&self, day: NaiveDate) -> DateTime<Utc> {
        self.at(day, NaiveTime::MIN)
    }

    /// Returns the first day of the week containing `day`.
    pub fn start_of_week(&self, day: NaiveDate) -> NaiveDate {
        let back = match self.week_start {
            WeekStart::Monday => day.weekday().num_days_from_monday(),
            WeekStart::Sunday => day.weekday().num_days_from_sunday(),
        };
        day - Days::new(u64::from(back))
    }

    /// Returns the date of `weekday` inside the week that contains `reference`.
    pub fn week_instance(&self, weekday: Weekday, reference: NaiveDate) -> NaiveDate {
        let start = self.start_of_week(reference);
        let forward = match self.week_start {
            WeekStart::Monday => weekday.num_days_from_monday(),
            WeekStart::Sunday => weekday.num_days_from_sunday(),
        };
        start + Days::new(u64::from(forward))
    }

    /// Returns the seven days of the week beginning at `start`.
    pub fn week_days(start: NaiveDate) -> impl Iterator<Item = NaiveDate> {
        (0..7u64).map(move |offset| start + Days::new(offset))
    }

    /// Returns which occurrence of its weekday `day` is within its month
    /// (1 for the first Tuesday, 2 for the second, up to 5).
    pub fn weekday_ordinal_in_month(day: NaiveDate) -> u32 {
        (day.day() - 1) / 7 + 1
    }

    /// Returns the first day of the month, or `None` for an invalid month.
    pub fn first_of_month(year: i32, month: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, month, 1)
    }

    /// Returns the last day of the month, or `None` for an invalid month.
    pub fn last_of_month(year: i32, month: u32) -> Option<NaiveDate> {
        let first = Self::first_of_month(year, month)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        next.pred_opt().filter(|last| *last >= first)
    }

    /// Returns every day of the month in ascending order.
    ///
    /// An invalid month yields no days.
    pub fn month_days(year: i32, month: u32) -> Vec<NaiveDate> {
        let (Some(first), Some(last)) = (
            Self::first_of_month(year, month),
            Self::last_of_month(year, month),
        ) else {
            return Vec::new();
        };
        first.iter_days().take_while(|day| *day <= last).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Calendar, WeekStart};
    use chrono::{FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn day_of_respects_offset() {
        let tokyo = Calendar::new(WeekStart::Monday, FixedOffset::east_opt(9 * 3600).unwrap());
        let instant = Utc.with_ymd_and_hms(2025, 1, 5, 20, 0, 0).unwrap();
        assert_eq!(tokyo.day_of(instant), date(2025, 1, 6));
        assert_eq!(Calendar::default().day_of(instant), date(2025, 1, 5));
    }

    #[test]
    fn at_inverts_day_and_time() {
        let cal = Calendar::new(WeekStart::Monday, FixedOffset::west_opt(5 * 3600).unwrap());
        let time = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        let instant = cal.at(date(2025, 3, 4), time);
        assert_eq!(instant, Utc.with_ymd_and_hms(2025, 3, 4, 14, 30, 0).unwrap());
        assert_eq!(cal.day_of(instant), date(2025, 3, 4));
        assert_eq!(cal.time_of_day(instant), time);
    }

    #[test]
    fn start_of_week_follows_week_start() {
        // 2025-01-08 is a Wednesday.
        let wed = date(2025, 1, 8);
        assert_eq!(Calendar::utc(WeekStart::Monday).start_of_week(wed), date(2025, 1, 6));
        assert_eq!(Calendar::utc(WeekStart::Sunday).start_of_week(wed), date(2025, 1, 5));
    }

    #[test]
    fn week_instance_stays_inside_reference_week() {
        let cal = Calendar::utc(WeekStart::Monday);
        assert_eq!(cal.week_instance(Weekday::Fri, date(2025, 1, 6)), date(2025, 1, 10));
        assert_eq!(cal.week_instance(Weekday::Mon, date(2025, 1, 12)), date(2025, 1, 6));
    }

    #[test]
    fn weekday_ordinal_counts_from_first_day() {
        assert_eq!(Calendar::weekday_ordinal_in_month(date(2025, 1, 13)), 2);
        assert_eq!(Calendar::weekday_ordinal_in_month(date(2025, 1, 7)), 1);
        assert_eq!(Calendar::weekday_ordinal_in_month(date(2025, 1, 29)), 5);
    }

    #[test]
    fn month_days_handles_leap_years_and_bad_months() {
        assert_eq!(Calendar::month_days(2024, 2).len(), 29);
        assert_eq!(Calendar::month_days(2025, 2).len(), 28);
        assert_eq!(Calendar::month_days(2025, 12).len(), 31);
        assert!(Calendar::month_days(2025, 13).is_empty());
    }
}
