//! Big plans: multi-task efforts owning their inbox tasks.

use crate::model::entity::{EntityId, EntityKind, EntityTag};
use crate::model::inbox_task::check_date_order;
use crate::model::validation::{normalize_name, ValidationResult};
use jiff::civil::Date;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BigPlanStatus {
    NotStarted,
    Accepted,
    InProgress,
    Blocked,
    NotDone,
    Done,
}

impl BigPlanStatus {
    pub fn is_completed(self) -> bool {
        matches!(self, Self::NotDone | Self::Done)
    }

    pub fn is_accepted_or_more(self) -> bool {
        !matches!(self, Self::NotStarted)
    }

    pub fn is_working_or_more(self) -> bool {
        matches!(self, Self::InProgress | Self::Blocked | Self::NotDone | Self::Done)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BigPlan {
    pub name: String,
    pub status: BigPlanStatus,
    pub project_ref_id: EntityId,
    pub actionable_date: Option<Date>,
    pub due_date: Option<Date>,
    pub accepted_time: Option<Timestamp>,
    pub working_time: Option<Timestamp>,
    pub completed_time: Option<Timestamp>,
}

impl BigPlan {
    pub fn new(
        name: &str,
        project_ref_id: EntityId,
        actionable_date: Option<Date>,
        due_date: Option<Date>,
    ) -> ValidationResult<Self> {
        check_date_order(actionable_date, due_date)?;
        Ok(Self {
            name: normalize_name("name", name)?,
            status: BigPlanStatus::NotStarted,
            project_ref_id,
            actionable_date,
            due_date,
            accepted_time: None,
            working_time: None,
            completed_time: None,
        })
    }

    /// Moves to `status`, stamping or clearing the lifecycle timestamps.
    pub fn with_status(mut self, status: BigPlanStatus, now: Timestamp) -> Self {
        self.accepted_time = keep_or_stamp(self.accepted_time, status.is_accepted_or_more(), now);
        self.working_time = keep_or_stamp(self.working_time, status.is_working_or_more(), now);
        self.completed_time = keep_or_stamp(self.completed_time, status.is_completed(), now);
        self.status = status;
        self
    }
}

impl EntityKind for BigPlan {
    const TAG: EntityTag = EntityTag::BigPlan;

    fn snippet(&self) -> String {
        self.name.clone()
    }
}

fn keep_or_stamp(current: Option<Timestamp>, reached: bool, now: Timestamp) -> Option<Timestamp> {
    if reached {
        current.or(Some(now))
    } else {
        None
    }
}
