//! Recurrence periods and their calendar ordinals.

use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Ordered recurrence period: `Daily < Weekly < Monthly < Quarterly < Yearly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurringTaskPeriod {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

const UNIX_EPOCH_DATE: Date = Date::constant(1970, 1, 1);

impl RecurringTaskPeriod {
    pub const ALL: [Self; 5] = [
        Self::Daily,
        Self::Weekly,
        Self::Monthly,
        Self::Quarterly,
        Self::Yearly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "quarterly" => Some(Self::Quarterly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }

    /// Periods strictly shorter than this one, shortest first.
    pub fn sub_periods(self) -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(move |period| *period < self)
    }

    /// Index of the window containing `date` within its natural unit.
    ///
    /// Daily counts days since 1970-01-01, weekly uses the ISO week number,
    /// monthly the month, quarterly the quarter and yearly the year.
    pub fn ordinal(self, date: Date) -> i64 {
        match self {
            Self::Daily => date
                .since(UNIX_EPOCH_DATE)
                .map_or(0, |span| i64::from(span.get_days())),
            Self::Weekly => i64::from(date.iso_week_date().week()),
            Self::Monthly => i64::from(date.month()),
            Self::Quarterly => i64::from(quarter_of(date)),
            Self::Yearly => i64::from(date.year()),
        }
    }
}

impl Display for RecurringTaskPeriod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quarter number 1..=4 of `date`.
pub fn quarter_of(date: Date) -> i8 {
    (date.month() - 1) / 3 + 1
}

#[cfg(test)]
mod tests {
    use super::RecurringTaskPeriod;
    use jiff::civil::date;

    #[test]
    fn periods_are_ordered() {
        assert!(RecurringTaskPeriod::Daily < RecurringTaskPeriod::Weekly);
        assert!(RecurringTaskPeriod::Quarterly < RecurringTaskPeriod::Yearly);
        let subs: Vec<_> = RecurringTaskPeriod::Monthly.sub_periods().collect();
        assert_eq!(
            subs,
            vec![RecurringTaskPeriod::Daily, RecurringTaskPeriod::Weekly]
        );
    }

    #[test]
    fn ordinals_use_natural_units() {
        let day = date(2024, 12, 2);
        assert_eq!(RecurringTaskPeriod::Daily.ordinal(date(1970, 1, 3)), 2);
        assert_eq!(RecurringTaskPeriod::Weekly.ordinal(day), 49);
        assert_eq!(RecurringTaskPeriod::Monthly.ordinal(day), 12);
        assert_eq!(RecurringTaskPeriod::Quarterly.ordinal(day), 4);
        assert_eq!(RecurringTaskPeriod::Yearly.ordinal(day), 2024);
    }
}
