//! Period and skip algebra.
//!
//! # Responsibility
//! - Derive the canonical window (first/end day, timeline, names) for a
//!   period and a reference date.
//! - Derive actionable and due dates from template offsets.
//!
//! # Invariants
//! - Weeks start on Monday and use ISO week numbering, so a week that
//!   straddles New Year belongs to the ISO week-year of its Thursday.
//! - Quarters start on months 1, 4, 7 and 10.
//! - Two dates yield the same `timeline` iff they fall in the same window.
//! - Everything here is pure; nothing reads the store.

pub mod gen_params;
pub mod period;
pub mod skip_rule;

pub use gen_params::RecurringTaskGenParams;
pub use period::RecurringTaskPeriod;
pub use skip_rule::RecurringTaskSkipRule;

use jiff::civil::{Date, Weekday};
use jiff::tz::TimeZone;
use jiff::{Timestamp, ToSpan};
use period::quarter_of;

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Canonical window for one period evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub period: RecurringTaskPeriod,
    /// Inclusive first day of the window.
    pub first_day: Date,
    /// Inclusive last day of the window.
    pub end_day: Date,
    /// Stable identifier of the window, e.g. `2024-D337` or `2025-W01`.
    pub timeline: String,
    /// Human-readable window label.
    pub full_name: String,
    pub actionable_date: Option<Date>,
    pub due_date: Option<Date>,
}

impl Schedule {
    /// Bare window for `period` containing `right_now`, without offsets.
    pub fn for_period(period: RecurringTaskPeriod, right_now: Date) -> Self {
        let (first_day, end_day) = window_bounds(period, right_now);
        Self {
            period,
            first_day,
            end_day,
            timeline: timeline_for(period, first_day),
            full_name: full_name_for(period, first_day),
            actionable_date: None,
            due_date: Some(end_day),
        }
    }

    /// Window for `params.period` containing `right_now`, with offsets applied.
    pub fn for_date(params: &RecurringTaskGenParams, right_now: Date) -> Self {
        let mut schedule = Self::for_period(params.period, right_now);
        schedule.actionable_date = schedule.derive_actionable(params);
        schedule.due_date = Some(schedule.derive_due(params));
        schedule
    }

    pub fn contains_date(&self, date: Date) -> bool {
        self.first_day <= date && date <= self.end_day
    }

    /// Membership by local-date equivalence in `timezone`.
    pub fn contains_timestamp(&self, timestamp: Timestamp, timezone: &TimeZone) -> bool {
        self.contains_date(local_date(timestamp, timezone))
    }

    /// Whether the window is materialized under `skip_rule`.
    pub fn should_keep(&self, skip_rule: Option<&RecurringTaskSkipRule>) -> bool {
        skip_rule.map_or(true, |rule| rule.should_keep(self.period, self.first_day))
    }

    /// Last second of the window in `timezone`, used as the instance anchor.
    pub fn window_end_timestamp(&self, timezone: &TimeZone) -> Result<Timestamp, jiff::Error> {
        self.end_day
            .at(23, 59, 59, 0)
            .to_zoned(timezone.clone())
            .map(|zoned| zoned.timestamp())
    }

    fn derive_actionable(&self, params: &RecurringTaskGenParams) -> Option<Date> {
        let day = params.actionable_from_day;
        let month = params.actionable_from_month;
        if day.is_none() && month.is_none() {
            return None;
        }
        let date = match self.period {
            RecurringTaskPeriod::Daily => self.first_day,
            RecurringTaskPeriod::Weekly => add_days(self.first_day, day.unwrap_or(1)),
            RecurringTaskPeriod::Monthly => clamp_day(self.first_day, day.unwrap_or(1)),
            RecurringTaskPeriod::Quarterly | RecurringTaskPeriod::Yearly => {
                let month_start = add_months(self.first_day, month.unwrap_or(1));
                clamp_day(month_start, day.unwrap_or(1))
            }
        };
        Some(date.min(self.end_day))
    }

    fn derive_due(&self, params: &RecurringTaskGenParams) -> Date {
        let day = params.due_at_day;
        let month = params.due_at_month;
        let date = match self.period {
            RecurringTaskPeriod::Daily => self.end_day,
            RecurringTaskPeriod::Weekly => day.map_or(self.end_day, |d| add_days(self.first_day, d)),
            RecurringTaskPeriod::Monthly => day.map_or(self.end_day, |d| clamp_day(self.first_day, d)),
            RecurringTaskPeriod::Quarterly | RecurringTaskPeriod::Yearly => {
                let last_month = if self.period == RecurringTaskPeriod::Quarterly { 3 } else { 12 };
                let month_start = add_months(self.first_day, month.unwrap_or(last_month));
                day.map_or(month_start.last_of_month(), |d| clamp_day(month_start, d))
            }
        };
        date.min(self.end_day)
    }
}

/// Local calendar date of `timestamp` in `timezone`.
pub fn local_date(timestamp: Timestamp, timezone: &TimeZone) -> Date {
    timestamp.to_zoned(timezone.clone()).date()
}

/// Resolves an IANA name; `UTC` never needs the tz database.
pub fn parse_timezone(name: &str) -> Result<TimeZone, jiff::Error> {
    match name.trim() {
        "UTC" | "Etc/UTC" | "utc" => Ok(TimeZone::UTC),
        other => TimeZone::get(other),
    }
}

fn window_bounds(period: RecurringTaskPeriod, date: Date) -> (Date, Date) {
    match period {
        RecurringTaskPeriod::Daily => (date, date),
        RecurringTaskPeriod::Weekly => {
            let offset = i64::from(date.weekday().to_monday_zero_offset());
            let first = date.saturating_sub(offset.days());
            (first, first.saturating_add(6.days()))
        }
        RecurringTaskPeriod::Monthly => (date.first_of_month(), date.last_of_month()),
        RecurringTaskPeriod::Quarterly => {
            let quarter_start_month = i64::from((quarter_of(date) - 1) * 3);
            let first = date.first_of_year().saturating_add(quarter_start_month.months());
            let end = first.saturating_add(2.months()).last_of_month();
            (first, end)
        }
        RecurringTaskPeriod::Yearly => (date.first_of_year(), date.last_of_year()),
    }
}

fn timeline_for(period: RecurringTaskPeriod, first_day: Date) -> String {
    match period {
        RecurringTaskPeriod::Daily => {
            format!("{}-D{:03}", first_day.year(), first_day.day_of_year())
        }
        RecurringTaskPeriod::Weekly => {
            let iso = first_day.iso_week_date();
            format!("{}-W{:02}", iso.year(), iso.week())
        }
        RecurringTaskPeriod::Monthly => format!("{}-M{:02}", first_day.year(), first_day.month()),
        RecurringTaskPeriod::Quarterly => {
            format!("{}-Q{}", first_day.year(), quarter_of(first_day))
        }
        RecurringTaskPeriod::Yearly => format!("{}", first_day.year()),
    }
}

fn full_name_for(period: RecurringTaskPeriod, first_day: Date) -> String {
    match period {
        RecurringTaskPeriod::Daily => format!("{} {first_day}", weekday_name(first_day.weekday())),
        RecurringTaskPeriod::Weekly => {
            let iso = first_day.iso_week_date();
            format!("W{:02} {}", iso.week(), iso.year())
        }
        RecurringTaskPeriod::Monthly => format!("{} {}", month_name(first_day), first_day.year()),
        RecurringTaskPeriod::Quarterly => {
            format!("Q{} {}", quarter_of(first_day), first_day.year())
        }
        RecurringTaskPeriod::Yearly => format!("{}", first_day.year()),
    }
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Monday => "Mon",
        Weekday::Tuesday => "Tue",
        Weekday::Wednesday => "Wed",
        Weekday::Thursday => "Thu",
        Weekday::Friday => "Fri",
        Weekday::Saturday => "Sat",
        Weekday::Sunday => "Sun",
    }
}

fn month_name(date: Date) -> &'static str {
    let index = usize::try_from(date.month() - 1).unwrap_or(0);
    MONTH_NAMES[index.min(11)]
}

/// `first + (day - 1)` days.
fn add_days(first: Date, day: u8) -> Date {
    first.saturating_add(i64::from(day.saturating_sub(1)).days())
}

/// Month `month` (1-based) counted from the month of `first`.
fn add_months(first: Date, month: u8) -> Date {
    first
        .first_of_month()
        .saturating_add(i64::from(month.saturating_sub(1)).months())
}

/// Day `day` of the month of `month_start`, clamped to its last day.
fn clamp_day(month_start: Date, day: u8) -> Date {
    let last = i64::from(month_start.days_in_month());
    let day = i64::from(day).clamp(1, last);
    month_start.first_of_month().saturating_add((day - 1).days())
}

#[cfg(test)]
mod tests {
    use super::{RecurringTaskGenParams, RecurringTaskPeriod, Schedule};
    use crate::model::inbox_task::Eisen;
    use jiff::civil::date;
    use jiff::tz::TimeZone;

    fn params(period: RecurringTaskPeriod) -> RecurringTaskGenParams {
        RecurringTaskGenParams::simple(period, Eisen::Regular, None)
    }

    #[test]
    fn daily_window_uses_day_of_year_timeline() {
        let schedule = Schedule::for_date(&params(RecurringTaskPeriod::Daily), date(2024, 12, 2));
        assert_eq!(schedule.timeline, "2024-D337");
        assert_eq!(schedule.first_day, date(2024, 12, 2));
        assert_eq!(schedule.end_day, date(2024, 12, 2));
        assert_eq!(schedule.due_date, Some(date(2024, 12, 2)));
        assert_eq!(schedule.actionable_date, None);
    }

    #[test]
    fn weekly_window_starts_monday_and_follows_iso_year() {
        let schedule = Schedule::for_date(&params(RecurringTaskPeriod::Weekly), date(2024, 12, 4));
        assert_eq!(schedule.first_day, date(2024, 12, 2));
        assert_eq!(schedule.end_day, date(2024, 12, 8));
        assert_eq!(schedule.timeline, "2024-W49");

        let boundary =
            Schedule::for_date(&params(RecurringTaskPeriod::Weekly), date(2024, 12, 31));
        assert_eq!(boundary.first_day, date(2024, 12, 30));
        assert_eq!(boundary.timeline, "2025-W01");
        let next_year = Schedule::for_date(&params(RecurringTaskPeriod::Weekly), date(2025, 1, 2));
        assert_eq!(next_year.timeline, boundary.timeline);
    }

    #[test]
    fn quarterly_and_yearly_windows() {
        let quarter =
            Schedule::for_date(&params(RecurringTaskPeriod::Quarterly), date(2024, 8, 15));
        assert_eq!(quarter.first_day, date(2024, 7, 1));
        assert_eq!(quarter.end_day, date(2024, 9, 30));
        assert_eq!(quarter.timeline, "2024-Q3");

        let year = Schedule::for_date(&params(RecurringTaskPeriod::Yearly), date(2024, 8, 15));
        assert_eq!(year.first_day, date(2024, 1, 1));
        assert_eq!(year.end_day, date(2024, 12, 31));
        assert_eq!(year.timeline, "2024");
    }

    #[test]
    fn monthly_due_day_is_clamped_to_month_end() {
        let monthly = params(RecurringTaskPeriod::Monthly).with_due_at(None, Some(31));
        let schedule = Schedule::for_date(&monthly, date(2024, 2, 10));
        assert_eq!(schedule.timeline, "2024-M02");
        assert_eq!(schedule.due_date, Some(date(2024, 2, 29)));
    }

    #[test]
    fn offsets_derive_actionable_and_due_dates() {
        let weekly = params(RecurringTaskPeriod::Weekly)
            .with_actionable_from(None, Some(2))
            .with_due_at(None, Some(5));
        let schedule = Schedule::for_date(&weekly, date(2024, 12, 4));
        assert_eq!(schedule.actionable_date, Some(date(2024, 12, 3)));
        assert_eq!(schedule.due_date, Some(date(2024, 12, 6)));

        let quarterly = params(RecurringTaskPeriod::Quarterly)
            .with_actionable_from(Some(2), None)
            .with_due_at(Some(2), Some(31));
        let schedule = Schedule::for_date(&quarterly, date(2024, 4, 20));
        assert_eq!(schedule.actionable_date, Some(date(2024, 5, 1)));
        assert_eq!(schedule.due_date, Some(date(2024, 5, 31)));

        let yearly = params(RecurringTaskPeriod::Yearly).with_due_at(Some(2), None);
        let schedule = Schedule::for_date(&yearly, date(2023, 6, 1));
        assert_eq!(schedule.due_date, Some(date(2023, 2, 28)));
    }

    #[test]
    fn equal_timelines_iff_window_contains_date() {
        let tz = TimeZone::UTC;
        for period in RecurringTaskPeriod::ALL {
            let anchor = Schedule::for_period(period, date(2024, 12, 2));
            for offset in -40..40_i64 {
                let other_date = date(2024, 12, 2)
                    .checked_add(jiff::Span::new().days(offset))
                    .unwrap();
                let other = Schedule::for_period(period, other_date);
                assert_eq!(
                    anchor.timeline == other.timeline,
                    anchor.contains_date(other_date),
                    "period={period} date={other_date}"
                );
            }
            let ts = anchor.window_end_timestamp(&tz).unwrap();
            assert!(anchor.contains_timestamp(ts, &tz));
        }
    }
}
