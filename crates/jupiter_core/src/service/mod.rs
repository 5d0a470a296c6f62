//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into use-case level APIs.
//! - Run every use case inside one unit of work, or one per target for
//!   the generator, garbage collector and stats runs.
//! - Map store failures onto the caller-facing error taxonomy.
//!
//! # Invariants
//! - Mutating calls take the `DomainContext` explicitly; services keep no
//!   state besides the borrowed store.
//!
//! # See also
//! - `repo::uow`

pub mod big_plan_service;
pub mod chore_service;
pub mod gc_service;
pub mod gen_service;
pub mod habit_service;
pub mod inbox_task_service;
pub mod journal_service;
pub mod metric_service;
pub mod person_service;
pub mod project_service;
pub mod push_service;
pub mod recurring;
pub mod report_service;
pub mod score_service;
pub mod stats_service;
pub mod vacation_service;
pub mod workspace_service;

use crate::model::entity::{Entity, EntityId, EntityKind, EntityTag};
use crate::model::inbox_task::InboxTaskSource;
use crate::model::validation::InputValidationError;
use crate::model::workspace::{SyncTarget, Workspace, WorkspaceFeature};
use crate::repo::{EntityRepository, StoreError, UnitOfWork};
use crate::schedule::parse_timezone;
use jiff::tz::TimeZone;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Caller-facing failures of a use case.
#[derive(Debug)]
pub enum ServiceError {
    InputValidation(InputValidationError),
    NotFound {
        tag: EntityTag,
        ref_id: EntityId,
    },
    StaleEntity {
        tag: EntityTag,
        ref_id: EntityId,
    },
    FeatureUnavailable(WorkspaceFeature),
    /// Field only the updater may set on a generated inbox task.
    CannotModifyGenerated {
        field: &'static str,
        source: InboxTaskSource,
    },
    DomainRuleViolation(String),
    Store(StoreError),
}

impl ServiceError {
    /// Whether the error concerns one missing entity rather than the run.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InputValidation(err) => write!(f, "{err}"),
            Self::NotFound { tag, ref_id } => write!(f, "{tag} {ref_id} not found"),
            Self::StaleEntity { tag, ref_id } => {
                write!(f, "{tag} {ref_id} was modified concurrently; reload and retry")
            }
            Self::FeatureUnavailable(feature) => {
                write!(f, "feature `{feature}` is disabled in this workspace")
            }
            Self::CannotModifyGenerated { field, source } => {
                write!(f, "field `{field}` of a {source} task is managed by its template")
            }
            Self::DomainRuleViolation(message) => write!(f, "{message}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InputValidation(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<InputValidationError> for ServiceError {
    fn from(value: InputValidationError) -> Self {
        Self::InputValidation(value)
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound { tag, ref_id } => Self::NotFound { tag, ref_id },
            StoreError::StaleEntity { tag, ref_id, .. } => Self::StaleEntity { tag, ref_id },
            err @ (StoreError::ParentNotLive { .. }
            | StoreError::StillReferenced { .. }
            | StoreError::AlreadyExists { .. }) => Self::DomainRuleViolation(err.to_string()),
            other => Self::Store(other),
        }
    }
}

/// Loads the live workspace and its timezone.
pub(crate) fn load_workspace(
    uow: &UnitOfWork<'_>,
    workspace_ref_id: EntityId,
) -> ServiceResult<(Entity<Workspace>, TimeZone)> {
    let workspace = uow
        .entities::<Workspace>()
        .load_by_id(workspace_ref_id, false)?;
    let timezone = parse_timezone(&workspace.data.timezone).map_err(|err| {
        InputValidationError::new("timezone", format!("`{}`: {err}", workspace.data.timezone))
    })?;
    Ok((workspace, timezone))
}

/// Loads the single trunk of kind `C` under a workspace.
pub(crate) fn load_trunk<C: EntityKind>(
    uow: &UnitOfWork<'_>,
    workspace_ref_id: EntityId,
) -> ServiceResult<Entity<C>> {
    Ok(uow.entities::<C>().load_by_parent(workspace_ref_id)?)
}

pub(crate) fn ensure_feature(workspace: &Workspace, feature: WorkspaceFeature) -> ServiceResult<()> {
    if workspace.is_feature_available(feature) {
        Ok(())
    } else {
        Err(ServiceError::FeatureUnavailable(feature))
    }
}

/// Checks that every requested target is enabled and belongs to `allowed`.
pub(crate) fn check_targets(
    workspace: &Workspace,
    targets: &[SyncTarget],
    allowed: &[SyncTarget],
) -> ServiceResult<()> {
    for target in targets {
        if !allowed.contains(target) {
            return Err(InputValidationError::new(
                "targets",
                format!("`{target}` is not supported by this run"),
            )
            .into());
        }
        if let Some(feature) = target.required_feature() {
            ensure_feature(workspace, feature)?;
        }
    }
    Ok(())
}

/// Orders targets the way `allowed` lists them and drops duplicates.
pub(crate) fn ordered_targets(targets: &[SyncTarget], allowed: &[SyncTarget]) -> Vec<SyncTarget> {
    allowed
        .iter()
        .copied()
        .filter(|target| targets.contains(target))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{ordered_targets, ServiceError};
    use crate::model::entity::EntityTag;
    use crate::model::workspace::SyncTarget;
    use crate::repo::StoreError;

    #[test]
    fn store_errors_map_onto_service_taxonomy() {
        let not_found = ServiceError::from(StoreError::NotFound {
            tag: EntityTag::Habit,
            ref_id: 4,
        });
        assert!(not_found.is_not_found());

        let referenced = ServiceError::from(StoreError::StillReferenced {
            tag: EntityTag::Project,
            ref_id: 1,
            referrer_tag: EntityTag::Habit,
            referrer_ref_id: 2,
        });
        assert!(matches!(referenced, ServiceError::DomainRuleViolation(_)));
    }

    #[test]
    fn targets_follow_run_order() {
        let ordered = ordered_targets(
            &[SyncTarget::WorkingMem, SyncTarget::Habits, SyncTarget::Habits],
            &SyncTarget::GEN,
        );
        assert_eq!(ordered, vec![SyncTarget::Habits, SyncTarget::WorkingMem]);
    }
}
