//! Vacations suppress generation of skippable recurring work.

use crate::model::entity::{EntityKind, EntityTag};
use crate::model::validation::{normalize_name, InputValidationError, ValidationResult};
use crate::schedule::Schedule;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vacation {
    pub name: String,
    /// Inclusive.
    pub start_date: Date,
    /// Inclusive.
    pub end_date: Date,
}

impl Vacation {
    pub fn new(name: &str, start_date: Date, end_date: Date) -> ValidationResult<Self> {
        if start_date > end_date {
            return Err(InputValidationError::new(
                "end_date",
                format!("{end_date} is before start {start_date}"),
            ));
        }
        Ok(Self {
            name: normalize_name("name", name)?,
            start_date,
            end_date,
        })
    }

    /// Whether the whole window of `schedule` lies inside the vacation.
    pub fn covers(&self, schedule: &Schedule) -> bool {
        self.start_date <= schedule.first_day && schedule.end_day <= self.end_date
    }
}

impl EntityKind for Vacation {
    const TAG: EntityTag = EntityTag::Vacation;

    fn snippet(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::Vacation;
    use crate::schedule::{RecurringTaskPeriod, Schedule};
    use jiff::civil::date;

    #[test]
    fn covers_only_whole_windows() {
        let vacation = Vacation::new("Beach", date(2024, 12, 2), date(2024, 12, 8)).unwrap();
        let week = Schedule::for_period(RecurringTaskPeriod::Weekly, date(2024, 12, 4));
        let month = Schedule::for_period(RecurringTaskPeriod::Monthly, date(2024, 12, 4));
        assert!(vacation.covers(&week));
        assert!(!vacation.covers(&month));
    }
}
