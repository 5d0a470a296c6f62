//! Working memory: a scratch file per period, cleaned up by a task.

use crate::model::entity::{EntityId, EntityKind, EntityTag};
use crate::model::validation::{InputValidationError, ValidationResult};
use crate::schedule::RecurringTaskPeriod;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingMemCollection {
    /// Daily or weekly.
    pub generation_period: RecurringTaskPeriod,
    pub cleanup_project_ref_id: EntityId,
}

impl WorkingMemCollection {
    pub fn new(
        generation_period: RecurringTaskPeriod,
        cleanup_project_ref_id: EntityId,
    ) -> ValidationResult<Self> {
        if !matches!(
            generation_period,
            RecurringTaskPeriod::Daily | RecurringTaskPeriod::Weekly
        ) {
            return Err(InputValidationError::new(
                "generation_period",
                format!("must be daily or weekly, got {generation_period}"),
            ));
        }
        Ok(Self {
            generation_period,
            cleanup_project_ref_id,
        })
    }
}

impl EntityKind for WorkingMemCollection {
    const TAG: EntityTag = EntityTag::WorkingMemCollection;

    fn snippet(&self) -> String {
        "working mem".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingMem {
    pub name: String,
    pub right_now: Date,
    pub period: RecurringTaskPeriod,
    pub timeline: String,
}

impl WorkingMem {
    pub fn new(right_now: Date, period: RecurringTaskPeriod, timeline: String) -> Self {
        Self {
            name: format!("Working mem for {period} {right_now}"),
            right_now,
            period,
            timeline,
        }
    }
}

impl EntityKind for WorkingMem {
    const TAG: EntityTag = EntityTag::WorkingMem;

    fn snippet(&self) -> String {
        self.name.clone()
    }
}
