//! Roots of the ownership tree: the user and their workspace.

use crate::model::entity::{EntityId, EntityKind, EntityTag};
use crate::model::validation::{normalize_name, InputValidationError, ValidationResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub name: String,
    /// IANA timezone name.
    pub timezone: String,
}

impl User {
    pub fn new(email: &str, name: &str, timezone: &str) -> ValidationResult<Self> {
        let email = email.trim();
        if !email.contains('@') {
            return Err(InputValidationError::new("email", "must contain `@`"));
        }
        Ok(Self {
            email: email.to_string(),
            name: normalize_name("name", name)?,
            timezone: normalize_timezone(timezone)?,
        })
    }
}

impl EntityKind for User {
    const TAG: EntityTag = EntityTag::User;

    fn snippet(&self) -> String {
        self.name.clone()
    }
}

/// Optional feature areas a workspace can switch off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceFeature {
    Habits,
    Chores,
    BigPlans,
    Vacations,
    Metrics,
    Persons,
    Journals,
    WorkingMem,
    SlackTasks,
    EmailTasks,
}

impl WorkspaceFeature {
    pub const ALL: [Self; 10] = [
        Self::Habits,
        Self::Chores,
        Self::BigPlans,
        Self::Vacations,
        Self::Metrics,
        Self::Persons,
        Self::Journals,
        Self::WorkingMem,
        Self::SlackTasks,
        Self::EmailTasks,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Habits => "habits",
            Self::Chores => "chores",
            Self::BigPlans => "big_plans",
            Self::Vacations => "vacations",
            Self::Metrics => "metrics",
            Self::Persons => "persons",
            Self::Journals => "journals",
            Self::WorkingMem => "working_mem",
            Self::SlackTasks => "slack_tasks",
            Self::EmailTasks => "email_tasks",
        }
    }
}

impl Display for WorkspaceFeature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit addressed by the generator, the garbage collector and stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTarget {
    InboxTasks,
    Habits,
    Chores,
    BigPlans,
    Metrics,
    Persons,
    Journals,
    WorkingMem,
    SlackTasks,
    EmailTasks,
}

impl SyncTarget {
    /// Targets the generator knows how to materialize, in run order.
    pub const GEN: [Self; 6] = [
        Self::Habits,
        Self::Chores,
        Self::Metrics,
        Self::Persons,
        Self::Journals,
        Self::WorkingMem,
    ];

    /// Targets the garbage collector sweeps, in run order.
    pub const GC: [Self; 5] = [
        Self::InboxTasks,
        Self::WorkingMem,
        Self::BigPlans,
        Self::SlackTasks,
        Self::EmailTasks,
    ];

    pub const ALL: [Self; 10] = [
        Self::InboxTasks,
        Self::Habits,
        Self::Chores,
        Self::BigPlans,
        Self::Metrics,
        Self::Persons,
        Self::Journals,
        Self::WorkingMem,
        Self::SlackTasks,
        Self::EmailTasks,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InboxTasks => "inbox_tasks",
            Self::Habits => "habits",
            Self::Chores => "chores",
            Self::BigPlans => "big_plans",
            Self::Metrics => "metrics",
            Self::Persons => "persons",
            Self::Journals => "journals",
            Self::WorkingMem => "working_mem",
            Self::SlackTasks => "slack_tasks",
            Self::EmailTasks => "email_tasks",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|target| target.as_str() == normalized)
    }

    /// Feature that must be enabled for this target, `None` when always on.
    pub fn required_feature(self) -> Option<WorkspaceFeature> {
        match self {
            Self::InboxTasks => None,
            Self::Habits => Some(WorkspaceFeature::Habits),
            Self::Chores => Some(WorkspaceFeature::Chores),
            Self::BigPlans => Some(WorkspaceFeature::BigPlans),
            Self::Metrics => Some(WorkspaceFeature::Metrics),
            Self::Persons => Some(WorkspaceFeature::Persons),
            Self::Journals => Some(WorkspaceFeature::Journals),
            Self::WorkingMem => Some(WorkspaceFeature::WorkingMem),
            Self::SlackTasks => Some(WorkspaceFeature::SlackTasks),
            Self::EmailTasks => Some(WorkspaceFeature::EmailTasks),
        }
    }
}

impl Display for SyncTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub name: String,
    /// Owning user; scores land in their score log.
    pub user_ref_id: EntityId,
    /// IANA timezone name used for every schedule derivation.
    pub timezone: String,
    pub default_project_ref_id: Option<EntityId>,
    pub feature_flags: BTreeSet<WorkspaceFeature>,
}

impl Workspace {
    /// New workspace with every feature enabled.
    pub fn new(name: &str, timezone: &str, user_ref_id: EntityId) -> ValidationResult<Self> {
        Ok(Self {
            name: normalize_name("name", name)?,
            user_ref_id,
            timezone: normalize_timezone(timezone)?,
            default_project_ref_id: None,
            feature_flags: WorkspaceFeature::ALL.into_iter().collect(),
        })
    }

    pub fn is_feature_available(&self, feature: WorkspaceFeature) -> bool {
        self.feature_flags.contains(&feature)
    }

    pub fn is_target_available(&self, target: SyncTarget) -> bool {
        target
            .required_feature()
            .map_or(true, |feature| self.is_feature_available(feature))
    }

    /// `candidates` minus the targets whose feature is switched off.
    pub fn available_targets(&self, candidates: &[SyncTarget]) -> Vec<SyncTarget> {
        candidates
            .iter()
            .copied()
            .filter(|target| self.is_target_available(*target))
            .collect()
    }
}

impl EntityKind for Workspace {
    const TAG: EntityTag = EntityTag::Workspace;

    fn snippet(&self) -> String {
        self.name.clone()
    }
}

fn normalize_timezone(value: &str) -> ValidationResult<String> {
    let trimmed = value.trim();
    crate::schedule::parse_timezone(trimmed)
        .map_err(|err| InputValidationError::new("timezone", format!("`{trimmed}`: {err}")))?;
    Ok(trimmed.to_string())
}
