//! Journals: periodic reflection entries with an attached report snapshot.

use crate::model::entity::{EntityId, EntityKind, EntityTag};
use crate::model::inbox_task::{Difficulty, Eisen};
use crate::model::validation::{InputValidationError, ValidationResult};
use crate::schedule::RecurringTaskPeriod;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// What the generator produces for each journal period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalGenerationApproach {
    #[default]
    BothJournalAndTask,
    OnlyJournal,
    None,
}

impl JournalGenerationApproach {
    pub fn creates_journal(self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn creates_task(self) -> bool {
        matches!(self, Self::BothJournalAndTask)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalCollection {
    pub periods: BTreeSet<RecurringTaskPeriod>,
    pub writing_task_project_ref_id: EntityId,
    pub writing_task_eisen: Eisen,
    pub writing_task_difficulty: Option<Difficulty>,
    pub generation_approach: JournalGenerationApproach,
}

impl JournalCollection {
    pub fn new(
        periods: BTreeSet<RecurringTaskPeriod>,
        writing_task_project_ref_id: EntityId,
        generation_approach: JournalGenerationApproach,
    ) -> ValidationResult<Self> {
        if periods.is_empty() && generation_approach.creates_journal() {
            return Err(InputValidationError::new(
                "periods",
                "at least one period is needed to generate journals",
            ));
        }
        Ok(Self {
            periods,
            writing_task_project_ref_id,
            writing_task_eisen: Eisen::Regular,
            writing_task_difficulty: None,
            generation_approach,
        })
    }
}

impl EntityKind for JournalCollection {
    const TAG: EntityTag = EntityTag::JournalCollection;

    fn snippet(&self) -> String {
        "journals".to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalSource {
    User,
    Recurring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    pub name: String,
    pub source: JournalSource,
    pub right_now: Date,
    pub period: RecurringTaskPeriod,
    pub timeline: String,
    /// Snapshot produced by the report service, opaque here.
    pub report: Value,
}

impl Journal {
    pub fn new(
        source: JournalSource,
        right_now: Date,
        period: RecurringTaskPeriod,
        timeline: String,
        report: Value,
    ) -> Self {
        Self {
            name: format!("Journal for {period} {right_now}"),
            source,
            right_now,
            period,
            timeline,
            report,
        }
    }
}

impl EntityKind for Journal {
    const TAG: EntityTag = EntityTag::Journal;

    fn snippet(&self) -> String {
        self.name.clone()
    }
}
