//! Gamification scores.
//!
//! # Invariants
//! - At most one live `ScoreLogEntry` exists per `(source, source_ref_id)`.
//! - `ScoreStats` and `ScorePeriodBest` are derived records, rebuilt from
//!   entries by the score service.

use crate::model::entity::{EntityId, EntityKind, EntityTag};
use crate::model::inbox_task::Difficulty;
use crate::schedule::RecurringTaskPeriod;
use serde::{Deserialize, Serialize};

pub const BIG_PLAN_SCORE: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    InboxTask,
    BigPlan,
}

impl ScoreSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InboxTask => "inbox_task",
            Self::BigPlan => "big_plan",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreLogEntry {
    pub source: ScoreSource,
    pub source_ref_id: EntityId,
    pub name: String,
    pub success: bool,
    pub difficulty: Option<Difficulty>,
    pub score: i64,
}

impl ScoreLogEntry {
    pub fn for_inbox_task(
        source_ref_id: EntityId,
        name: &str,
        success: bool,
        difficulty: Option<Difficulty>,
    ) -> Self {
        let base = match difficulty {
            None | Some(Difficulty::Easy) => 1,
            Some(Difficulty::Medium) => 2,
            Some(Difficulty::Hard) => 5,
        };
        Self {
            source: ScoreSource::InboxTask,
            source_ref_id,
            name: name.to_string(),
            success,
            difficulty,
            score: if success { base } else { -base },
        }
    }

    pub fn for_big_plan(source_ref_id: EntityId, name: &str, success: bool) -> Self {
        Self {
            source: ScoreSource::BigPlan,
            source_ref_id,
            name: name.to_string(),
            success,
            difficulty: None,
            score: if success { BIG_PLAN_SCORE } else { -BIG_PLAN_SCORE },
        }
    }
}

impl EntityKind for ScoreLogEntry {
    const TAG: EntityTag = EntityTag::ScoreLogEntry;

    fn snippet(&self) -> String {
        format!("{} {:+}", self.name, self.score)
    }
}

/// Totals for one window, or lifetime when `period` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreStats {
    pub score_log_ref_id: EntityId,
    pub period: Option<RecurringTaskPeriod>,
    /// Window timeline, `lifetime` for lifetime totals.
    pub timeline: String,
    pub total_score: i64,
    pub inbox_task_cnt: i64,
    pub big_plan_cnt: i64,
}

/// Best sub-period total observed inside one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScorePeriodBest {
    pub score_log_ref_id: EntityId,
    pub period: Option<RecurringTaskPeriod>,
    pub timeline: String,
    pub sub_period: RecurringTaskPeriod,
    pub total_score: i64,
    pub inbox_task_cnt: i64,
    pub big_plan_cnt: i64,
}

pub const LIFETIME_TIMELINE: &str = "lifetime";

#[cfg(test)]
mod tests {
    use super::ScoreLogEntry;
    use crate::model::inbox_task::Difficulty;

    #[test]
    fn score_depends_on_difficulty_and_outcome() {
        assert_eq!(ScoreLogEntry::for_inbox_task(1, "a", true, None).score, 1);
        assert_eq!(ScoreLogEntry::for_inbox_task(1, "a", true, Some(Difficulty::Medium)).score, 2);
        assert_eq!(ScoreLogEntry::for_inbox_task(1, "a", false, Some(Difficulty::Hard)).score, -5);
        assert_eq!(ScoreLogEntry::for_big_plan(1, "p", true).score, 10);
    }
}
