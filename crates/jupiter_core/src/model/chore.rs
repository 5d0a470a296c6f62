//! Chore template.

use crate::model::entity::{EntityId, EntityKind, EntityTag};
use crate::model::validation::{normalize_name, InputValidationError, ValidationResult};
use crate::schedule::RecurringTaskGenParams;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chore {
    pub name: String,
    pub project_ref_id: EntityId,
    pub gen_params: RecurringTaskGenParams,
    pub suspended: bool,
    /// Generated even during vacations.
    pub must_do: bool,
    pub start_at_date: Date,
    pub end_at_date: Option<Date>,
}

impl Chore {
    /// Builds a chore; `start_at_date` defaults to `today`.
    pub fn new(
        name: &str,
        project_ref_id: EntityId,
        gen_params: RecurringTaskGenParams,
        must_do: bool,
        start_at_date: Option<Date>,
        end_at_date: Option<Date>,
        today: Date,
    ) -> ValidationResult<Self> {
        let chore = Self {
            name: normalize_name("name", name)?,
            project_ref_id,
            gen_params,
            suspended: false,
            must_do,
            start_at_date: start_at_date.unwrap_or(today),
            end_at_date,
        };
        chore.validate()?;
        if let Some(end) = chore.end_at_date {
            if end < today {
                return Err(InputValidationError::new(
                    "end_at_date",
                    format!("{end} is before today {today}"),
                ));
            }
        }
        Ok(chore)
    }

    pub fn validate(&self) -> ValidationResult<()> {
        self.gen_params.validate()?;
        if let Some(end) = self.end_at_date {
            if self.start_at_date >= end {
                return Err(InputValidationError::new(
                    "end_at_date",
                    format!("{end} must be after start {}", self.start_at_date),
                ));
            }
        }
        Ok(())
    }
}

impl EntityKind for Chore {
    const TAG: EntityTag = EntityTag::Chore;

    fn snippet(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::Chore;
    use crate::model::inbox_task::Eisen;
    use crate::schedule::{RecurringTaskGenParams, RecurringTaskPeriod};
    use jiff::civil::date;

    fn params() -> RecurringTaskGenParams {
        RecurringTaskGenParams::simple(RecurringTaskPeriod::Weekly, Eisen::Regular, None)
    }

    #[test]
    fn end_must_follow_start_and_today() {
        let today = date(2024, 12, 2);
        assert!(Chore::new("Vacuum", 1, params(), false, None, Some(today), today).is_err());
        assert!(Chore::new("Vacuum", 1, params(), false, None, Some(date(2024, 12, 1)), date(2024, 11, 1)).is_ok());
        let err = Chore::new(
            "Vacuum",
            1,
            params(),
            false,
            Some(date(2024, 10, 1)),
            Some(date(2024, 11, 1)),
            today,
        )
        .unwrap_err();
        assert_eq!(err.field, "end_at_date");
    }
}
