//! Recurring task generation parameters.

use crate::model::inbox_task::{Difficulty, Eisen};
use crate::model::validation::{InputValidationError, ValidationResult};
use crate::schedule::period::RecurringTaskPeriod;
use crate::schedule::skip_rule::RecurringTaskSkipRule;
use jiff::civil::Time;
use serde::{Deserialize, Serialize};

/// Value bundle describing how instances of a template are scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringTaskGenParams {
    pub period: RecurringTaskPeriod,
    pub eisen: Eisen,
    pub difficulty: Option<Difficulty>,
    pub actionable_from_day: Option<u8>,
    pub actionable_from_month: Option<u8>,
    /// Carried to clients; dates are day-granular so it does not move `due_date`.
    pub due_at_time: Option<Time>,
    pub due_at_day: Option<u8>,
    pub due_at_month: Option<u8>,
    pub skip_rule: Option<RecurringTaskSkipRule>,
}

impl RecurringTaskGenParams {
    /// Params with no offsets and no skip rule.
    pub fn simple(period: RecurringTaskPeriod, eisen: Eisen, difficulty: Option<Difficulty>) -> Self {
        Self {
            period,
            eisen,
            difficulty,
            actionable_from_day: None,
            actionable_from_month: None,
            due_at_time: None,
            due_at_day: None,
            due_at_month: None,
            skip_rule: None,
        }
    }

    pub fn with_skip_rule(mut self, skip_rule: RecurringTaskSkipRule) -> Self {
        self.skip_rule = Some(skip_rule);
        self
    }

    pub fn with_due_at(mut self, due_at_month: Option<u8>, due_at_day: Option<u8>) -> Self {
        self.due_at_month = due_at_month;
        self.due_at_day = due_at_day;
        self
    }

    pub fn with_actionable_from(
        mut self,
        actionable_from_month: Option<u8>,
        actionable_from_day: Option<u8>,
    ) -> Self {
        self.actionable_from_month = actionable_from_month;
        self.actionable_from_day = actionable_from_day;
        self
    }

    /// Validates offsets against the period and the skip rule compatibility.
    ///
    /// Out-of-range days fail here; in-range days larger than a given
    /// month are clamped later by the schedule.
    pub fn validate(&self) -> ValidationResult<()> {
        let (max_day, max_month) = match self.period {
            RecurringTaskPeriod::Daily => (0, 0),
            RecurringTaskPeriod::Weekly => (7, 0),
            RecurringTaskPeriod::Monthly => (31, 0),
            RecurringTaskPeriod::Quarterly => (31, 3),
            RecurringTaskPeriod::Yearly => (31, 12),
        };

        check_offset("actionable_from_day", self.actionable_from_day, max_day, self.period)?;
        check_offset("due_at_day", self.due_at_day, max_day, self.period)?;
        check_offset(
            "actionable_from_month",
            self.actionable_from_month,
            max_month,
            self.period,
        )?;
        check_offset("due_at_month", self.due_at_month, max_month, self.period)?;

        let has_actionable = self.actionable_from_day.is_some() || self.actionable_from_month.is_some();
        let has_due = self.due_at_day.is_some() || self.due_at_month.is_some();
        if has_actionable && has_due {
            let actionable = (
                self.actionable_from_month.unwrap_or(1),
                self.actionable_from_day.unwrap_or(1),
            );
            let due = (
                self.due_at_month.unwrap_or(max_month.max(1)),
                self.due_at_day.unwrap_or(max_day.max(1)),
            );
            if actionable > due {
                return Err(InputValidationError::new(
                    "actionable_from_day",
                    "actionable offset must not be after the due offset",
                ));
            }
        }

        if let Some(skip_rule) = &self.skip_rule {
            skip_rule.validate_for(self.period)?;
        }
        Ok(())
    }
}

fn check_offset(
    field: &'static str,
    value: Option<u8>,
    max: u8,
    period: RecurringTaskPeriod,
) -> ValidationResult<()> {
    match value {
        None => Ok(()),
        Some(_) if max == 0 => Err(InputValidationError::new(
            field,
            format!("not allowed for a {period} period"),
        )),
        Some(value) if value < 1 || value > max => Err(InputValidationError::new(
            field,
            format!("must be in 1..={max} for a {period} period, got {value}"),
        )),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::RecurringTaskGenParams;
    use crate::model::inbox_task::Eisen;
    use crate::schedule::period::RecurringTaskPeriod;
    use crate::schedule::skip_rule::RecurringTaskSkipRule;

    fn params(period: RecurringTaskPeriod) -> RecurringTaskGenParams {
        RecurringTaskGenParams::simple(period, Eisen::Regular, None)
    }

    #[test]
    fn daily_rejects_any_offset() {
        let bad = params(RecurringTaskPeriod::Daily).with_due_at(None, Some(1));
        assert_eq!(bad.validate().unwrap_err().field, "due_at_day");
    }

    #[test]
    fn offsets_are_range_checked_per_period() {
        assert!(params(RecurringTaskPeriod::Weekly)
            .with_due_at(None, Some(7))
            .validate()
            .is_ok());
        assert!(params(RecurringTaskPeriod::Weekly)
            .with_due_at(None, Some(8))
            .validate()
            .is_err());
        assert!(params(RecurringTaskPeriod::Monthly)
            .with_due_at(Some(1), None)
            .validate()
            .is_err());
        assert!(params(RecurringTaskPeriod::Quarterly)
            .with_due_at(Some(3), Some(31))
            .validate()
            .is_ok());
        assert!(params(RecurringTaskPeriod::Yearly)
            .with_due_at(Some(13), None)
            .validate()
            .is_err());
    }

    #[test]
    fn actionable_after_due_is_rejected() {
        let bad = params(RecurringTaskPeriod::Monthly)
            .with_actionable_from(None, Some(20))
            .with_due_at(None, Some(10));
        assert!(bad.validate().is_err());
        let good = params(RecurringTaskPeriod::Monthly)
            .with_actionable_from(None, Some(5))
            .with_due_at(None, Some(10));
        assert!(good.validate().is_ok());
    }

    #[test]
    fn skip_rule_must_match_period() {
        let rule = RecurringTaskSkipRule::custom_daily_rel_weekly(vec![1]).unwrap();
        assert!(params(RecurringTaskPeriod::Weekly)
            .with_skip_rule(rule.clone())
            .validate()
            .is_err());
        assert!(params(RecurringTaskPeriod::Daily)
            .with_skip_rule(rule)
            .validate()
            .is_ok());
    }
}
