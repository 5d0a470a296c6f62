//! Inbox task payload and its classification enums.
//!
//! # Responsibility
//! - Define the user-visible unit of work and where it came from.
//! - Apply status transitions together with their timestamps.
//!
//! # Invariants
//! - A recurring task carries `recurring_timeline`, `recurring_gen_right_now`
//!   and `source_entity_ref_id`; a user task carries none of them.
//! - `actionable_date <= due_date` whenever both are set.
//! - `completed_time` is set iff the status is completed.

use crate::model::entity::{EntityId, EntityKind, EntityTag};
use crate::model::validation::{normalize_name, InputValidationError, ValidationResult};
use jiff::civil::Date;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Eisenhower classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eisen {
    #[default]
    Regular,
    Important,
    Urgent,
    ImportantAndUrgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// What produced an inbox task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxTaskSource {
    User,
    BigPlan,
    Habit,
    Chore,
    Metric,
    PersonCatchUp,
    PersonBirthday,
    JournalWriting,
    WorkingMemCleanup,
    SlackTask,
    EmailTask,
}

impl InboxTaskSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::BigPlan => "big_plan",
            Self::Habit => "habit",
            Self::Chore => "chore",
            Self::Metric => "metric",
            Self::PersonCatchUp => "person_catch_up",
            Self::PersonBirthday => "person_birthday",
            Self::JournalWriting => "journal_writing",
            Self::WorkingMemCleanup => "working_mem_cleanup",
            Self::SlackTask => "slack_task",
            Self::EmailTask => "email_task",
        }
    }

    /// Produced by a schedule window and keyed by timeline.
    pub fn is_recurring(self) -> bool {
        matches!(
            self,
            Self::Habit
                | Self::Chore
                | Self::Metric
                | Self::PersonCatchUp
                | Self::PersonBirthday
                | Self::JournalWriting
                | Self::WorkingMemCleanup
        )
    }

    /// Whether the user may edit name, eisen, difficulty and project.
    pub fn allows_user_changes(self) -> bool {
        matches!(self, Self::User | Self::BigPlan)
    }

    /// Entity kind referenced by `source_entity_ref_id`, `None` for user tasks.
    pub fn source_entity_tag(self) -> Option<EntityTag> {
        match self {
            Self::User => None,
            Self::BigPlan => Some(EntityTag::BigPlan),
            Self::Habit => Some(EntityTag::Habit),
            Self::Chore => Some(EntityTag::Chore),
            Self::Metric => Some(EntityTag::Metric),
            Self::PersonCatchUp | Self::PersonBirthday => Some(EntityTag::Person),
            Self::JournalWriting => Some(EntityTag::Journal),
            Self::WorkingMemCleanup => Some(EntityTag::WorkingMem),
            Self::SlackTask => Some(EntityTag::SlackTask),
            Self::EmailTask => Some(EntityTag::EmailTask),
        }
    }
}

impl Display for InboxTaskSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxTaskStatus {
    NotStarted,
    NotStartedGen,
    Accepted,
    Recurring,
    InProgress,
    Blocked,
    NotDone,
    Done,
}

impl InboxTaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::NotStartedGen => "not_started_gen",
            Self::Accepted => "accepted",
            Self::Recurring => "recurring",
            Self::InProgress => "in_progress",
            Self::Blocked => "blocked",
            Self::NotDone => "not_done",
            Self::Done => "done",
        }
    }

    pub fn is_completed(self) -> bool {
        matches!(self, Self::NotDone | Self::Done)
    }

    pub fn is_accepted_or_more(self) -> bool {
        matches!(
            self,
            Self::Accepted | Self::Recurring | Self::InProgress | Self::Blocked | Self::NotDone | Self::Done
        )
    }

    pub fn is_working_or_more(self) -> bool {
        matches!(self, Self::InProgress | Self::Blocked | Self::NotDone | Self::Done)
    }
}

impl Display for InboxTaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recurring identity of a generated task inside its schedule window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurringSlot {
    pub timeline: String,
    pub repeat_index: Option<u32>,
    /// Window anchor; never rewritten after creation.
    pub gen_right_now: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxTask {
    pub name: String,
    pub source: InboxTaskSource,
    pub status: InboxTaskStatus,
    pub eisen: Eisen,
    pub difficulty: Option<Difficulty>,
    pub project_ref_id: EntityId,
    pub source_entity_ref_id: Option<EntityId>,
    pub actionable_date: Option<Date>,
    pub due_date: Option<Date>,
    pub recurring_timeline: Option<String>,
    pub recurring_repeat_index: Option<u32>,
    pub recurring_gen_right_now: Option<Timestamp>,
    pub accepted_time: Option<Timestamp>,
    pub working_time: Option<Timestamp>,
    pub completed_time: Option<Timestamp>,
}

impl InboxTask {
    /// Task created by hand in the inbox.
    #[allow(clippy::too_many_arguments)]
    pub fn new_user(
        name: &str,
        status: InboxTaskStatus,
        project_ref_id: EntityId,
        eisen: Eisen,
        difficulty: Option<Difficulty>,
        actionable_date: Option<Date>,
        due_date: Option<Date>,
        now: Timestamp,
    ) -> ValidationResult<Self> {
        let task = Self {
            name: normalize_name("name", name)?,
            source: InboxTaskSource::User,
            status: InboxTaskStatus::NotStarted,
            eisen,
            difficulty,
            project_ref_id,
            source_entity_ref_id: None,
            actionable_date,
            due_date,
            recurring_timeline: None,
            recurring_repeat_index: None,
            recurring_gen_right_now: None,
            accepted_time: None,
            working_time: None,
            completed_time: None,
        }
        .with_status(status, now);
        task.validate()?;
        Ok(task)
    }

    /// Task attributed to a source entity, recurring or not.
    #[allow(clippy::too_many_arguments)]
    pub fn new_generated(
        source: InboxTaskSource,
        source_entity_ref_id: EntityId,
        name: &str,
        status: InboxTaskStatus,
        project_ref_id: EntityId,
        eisen: Eisen,
        difficulty: Option<Difficulty>,
        actionable_date: Option<Date>,
        due_date: Option<Date>,
        slot: Option<RecurringSlot>,
        now: Timestamp,
    ) -> ValidationResult<Self> {
        let (recurring_timeline, recurring_repeat_index, recurring_gen_right_now) = match slot {
            Some(slot) => (Some(slot.timeline), slot.repeat_index, Some(slot.gen_right_now)),
            None => (None, None, None),
        };
        let task = Self {
            name: normalize_name("name", name)?,
            source,
            status: InboxTaskStatus::NotStarted,
            eisen,
            difficulty,
            project_ref_id,
            source_entity_ref_id: Some(source_entity_ref_id),
            actionable_date,
            due_date,
            recurring_timeline,
            recurring_repeat_index,
            recurring_gen_right_now,
            accepted_time: None,
            working_time: None,
            completed_time: None,
        }
        .with_status(status, now);
        task.validate()?;
        Ok(task)
    }

    /// Checks cross-field invariants.
    pub fn validate(&self) -> ValidationResult<()> {
        check_date_order(self.actionable_date, self.due_date)?;
        match self.source {
            InboxTaskSource::User => {
                if self.source_entity_ref_id.is_some() || self.recurring_timeline.is_some() {
                    return Err(InputValidationError::new(
                        "source",
                        "user tasks cannot reference a source entity",
                    ));
                }
            }
            source => {
                if self.source_entity_ref_id.is_none() {
                    return Err(InputValidationError::new(
                        "source_entity_ref_id",
                        format!("required for {source} tasks"),
                    ));
                }
                if source.is_recurring()
                    && (self.recurring_timeline.is_none() || self.recurring_gen_right_now.is_none())
                {
                    return Err(InputValidationError::new(
                        "recurring_timeline",
                        format!("required for {source} tasks"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Moves to `status`, stamping or clearing the lifecycle timestamps.
    pub fn with_status(mut self, status: InboxTaskStatus, now: Timestamp) -> Self {
        self.accepted_time = stamp(self.accepted_time, status.is_accepted_or_more(), now);
        self.working_time = stamp(self.working_time, status.is_working_or_more(), now);
        self.completed_time = stamp(self.completed_time, status.is_completed(), now);
        self.status = status;
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }

    /// Matches the generator key `(timeline, repeat_index)`.
    pub fn occupies_slot(&self, timeline: &str, repeat_index: Option<u32>) -> bool {
        self.recurring_timeline.as_deref() == Some(timeline)
            && self.recurring_repeat_index == repeat_index
    }
}

impl EntityKind for InboxTask {
    const TAG: EntityTag = EntityTag::InboxTask;

    fn snippet(&self) -> String {
        self.name.clone()
    }
}

/// Rejects `actionable > due`.
pub fn check_date_order(actionable: Option<Date>, due: Option<Date>) -> ValidationResult<()> {
    if let (Some(actionable), Some(due)) = (actionable, due) {
        if actionable > due {
            return Err(InputValidationError::new(
                "actionable_date",
                format!("{actionable} is after due date {due}"),
            ));
        }
    }
    Ok(())
}

fn stamp(current: Option<Timestamp>, reached: bool, now: Timestamp) -> Option<Timestamp> {
    match (reached, current) {
        (true, Some(existing)) => Some(existing),
        (true, None) => Some(now),
        (false, _) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{Eisen, InboxTask, InboxTaskSource, InboxTaskStatus, RecurringSlot};
    use jiff::civil::date;
    use jiff::Timestamp;

    fn now() -> Timestamp {
        Timestamp::from_second(1_733_140_800).unwrap()
    }

    #[test]
    fn status_transitions_stamp_and_clear_times() {
        let task = InboxTask::new_user(
            "Buy milk",
            InboxTaskStatus::NotStarted,
            1,
            Eisen::Regular,
            None,
            None,
            None,
            now(),
        )
        .unwrap();
        assert!(task.accepted_time.is_none());

        let done = task.with_status(InboxTaskStatus::Done, now());
        assert_eq!(done.accepted_time, Some(now()));
        assert_eq!(done.working_time, Some(now()));
        assert_eq!(done.completed_time, Some(now()));

        let reopened = done.with_status(InboxTaskStatus::Accepted, now());
        assert!(reopened.accepted_time.is_some());
        assert!(reopened.working_time.is_none());
        assert!(reopened.completed_time.is_none());
    }

    #[test]
    fn recurring_sources_require_a_slot() {
        let missing = InboxTask::new_generated(
            InboxTaskSource::Habit,
            5,
            "Meditate",
            InboxTaskStatus::Recurring,
            1,
            Eisen::Regular,
            None,
            None,
            Some(date(2024, 12, 2)),
            None,
            now(),
        );
        assert_eq!(missing.unwrap_err().field, "recurring_timeline");

        let slot = RecurringSlot {
            timeline: "2024-D337".to_string(),
            repeat_index: None,
            gen_right_now: now(),
        };
        let task = InboxTask::new_generated(
            InboxTaskSource::Habit,
            5,
            "Meditate",
            InboxTaskStatus::Recurring,
            1,
            Eisen::Regular,
            None,
            None,
            Some(date(2024, 12, 2)),
            Some(slot),
            now(),
        )
        .unwrap();
        assert!(task.occupies_slot("2024-D337", None));
        assert!(!task.occupies_slot("2024-D337", Some(0)));
    }

    #[test]
    fn actionable_after_due_is_rejected() {
        let err = InboxTask::new_user(
            "Late",
            InboxTaskStatus::NotStarted,
            1,
            Eisen::Urgent,
            None,
            Some(date(2024, 12, 5)),
            Some(date(2024, 12, 1)),
            now(),
        )
        .unwrap_err();
        assert_eq!(err.field, "actionable_date");
    }
}
