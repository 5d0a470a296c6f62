//! Habit template.

use crate::model::entity::{EntityId, EntityKind, EntityTag};
use crate::model::validation::{normalize_name, InputValidationError, ValidationResult};
use crate::schedule::{RecurringTaskGenParams, RecurringTaskPeriod};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub name: String,
    pub project_ref_id: EntityId,
    pub gen_params: RecurringTaskGenParams,
    pub suspended: bool,
    /// Instances per window; `None` means one unnumbered instance.
    pub repeats_in_period_count: Option<u32>,
}

impl Habit {
    pub fn new(
        name: &str,
        project_ref_id: EntityId,
        gen_params: RecurringTaskGenParams,
        repeats_in_period_count: Option<u32>,
    ) -> ValidationResult<Self> {
        let habit = Self {
            name: normalize_name("name", name)?,
            project_ref_id,
            gen_params,
            suspended: false,
            repeats_in_period_count,
        };
        habit.validate()?;
        Ok(habit)
    }

    pub fn validate(&self) -> ValidationResult<()> {
        self.gen_params.validate()?;
        validate_repeats(self.gen_params.period, self.repeats_in_period_count)
    }

    /// Repeat indexes materialized per window.
    pub fn repeat_indexes(&self) -> Vec<Option<u32>> {
        match self.repeats_in_period_count {
            Some(count) => (0..count).map(Some).collect(),
            None => vec![None],
        }
    }
}

impl EntityKind for Habit {
    const TAG: EntityTag = EntityTag::Habit;

    fn snippet(&self) -> String {
        self.name.clone()
    }
}

/// `repeats` needs a period longer than a day and at least two instances.
pub fn validate_repeats(period: RecurringTaskPeriod, repeats: Option<u32>) -> ValidationResult<()> {
    match repeats {
        None => Ok(()),
        Some(_) if period == RecurringTaskPeriod::Daily => Err(InputValidationError::new(
            "repeats_in_period_count",
            "not allowed for a daily period",
        )),
        Some(count) if count < 2 => Err(InputValidationError::new(
            "repeats_in_period_count",
            format!("must be at least 2, got {count}"),
        )),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::Habit;
    use crate::model::inbox_task::Eisen;
    use crate::schedule::{RecurringTaskGenParams, RecurringTaskPeriod};

    #[test]
    fn repeats_expand_to_indexes() {
        let params = RecurringTaskGenParams::simple(RecurringTaskPeriod::Weekly, Eisen::Regular, None);
        let habit = Habit::new("Run", 1, params, Some(3)).unwrap();
        assert_eq!(habit.repeat_indexes(), vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn repeats_are_rejected_for_daily_and_single_counts() {
        let daily = RecurringTaskGenParams::simple(RecurringTaskPeriod::Daily, Eisen::Regular, None);
        let err = Habit::new("Stretch", 1, daily, Some(3)).unwrap_err();
        assert_eq!(err.field, "repeats_in_period_count");

        let weekly = RecurringTaskGenParams::simple(RecurringTaskPeriod::Weekly, Eisen::Regular, None);
        let err = Habit::new("Swim", 1, weekly.clone(), Some(1)).unwrap_err();
        assert_eq!(err.field, "repeats_in_period_count");

        assert!(Habit::new("Swim", 1, weekly, None).is_ok());
    }
}
