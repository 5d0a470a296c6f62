//! Big plan use cases.

use crate::context::DomainContext;
use crate::model::big_plan::{BigPlan, BigPlanStatus};
use crate::model::collections::BigPlanCollection;
use crate::model::entity::{ArchivalReason, Entity, EntityId, EntityKind, EventKind};
use crate::model::inbox_task::check_date_order;
use crate::model::project::Project;
use crate::model::update_action::UpdateAction;
use crate::model::validation::normalize_name;
use crate::model::workspace::WorkspaceFeature;
use crate::repo::{CascadeOutcome, EntityRepository, Store};
use crate::service::score_service::record_big_plan;
use crate::service::{ensure_feature, load_trunk, load_workspace, ServiceError, ServiceResult};
use jiff::civil::Date;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BigPlanUpdate {
    pub name: UpdateAction<String>,
    pub status: UpdateAction<BigPlanStatus>,
    pub project_ref_id: UpdateAction<EntityId>,
    pub actionable_date: UpdateAction<Option<Date>>,
    pub due_date: UpdateAction<Option<Date>>,
}

/// Use-case service for big plans.
pub struct BigPlanService<'s> {
    store: &'s mut Store,
}

impl<'s> BigPlanService<'s> {
    pub fn new(store: &'s mut Store) -> Self {
        Self { store }
    }

    /// Creates a plan in `project_ref_id`, or in the default project.
    pub fn create(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        name: &str,
        project_ref_id: Option<EntityId>,
        actionable_date: Option<Date>,
        due_date: Option<Date>,
    ) -> ServiceResult<Entity<BigPlan>> {
        let uow = self.store.unit_of_work()?;
        let (workspace, _) = load_workspace(&uow, workspace_ref_id)?;
        ensure_feature(&workspace.data, WorkspaceFeature::BigPlans)?;
        let project_ref_id = project_ref_id
            .or(workspace.data.default_project_ref_id)
            .ok_or_else(|| {
                ServiceError::DomainRuleViolation("workspace has no default project".to_string())
            })?;
        uow.entities::<Project>().load_by_id(project_ref_id, false)?;
        let collection = load_trunk::<BigPlanCollection>(&uow, workspace_ref_id)?;

        let plan = uow.entities::<BigPlan>().create(Entity::new(
            Some(collection.ref_id),
            BigPlan::new(name, project_ref_id, actionable_date, due_date)?,
            ctx,
        ))?;
        uow.commit()?;
        Ok(plan)
    }

    /// Applies a partial update; a plan reaching a completed status is scored.
    pub fn update(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        ref_id: EntityId,
        update: BigPlanUpdate,
    ) -> ServiceResult<Entity<BigPlan>> {
        let uow = self.store.unit_of_work()?;
        let (workspace, timezone) = load_workspace(&uow, workspace_ref_id)?;
        let repo = uow.entities::<BigPlan>();
        let plan = repo.load_by_id(ref_id, false)?;
        if let UpdateAction::ChangeTo(project_ref_id) = &update.project_ref_id {
            uow.entities::<Project>().load_by_id(*project_ref_id, false)?;
        }

        let was_completed = plan.data.status.is_completed();
        let kind = match (&update.status, &update.name) {
            (UpdateAction::ChangeTo(_), UpdateAction::DoNotUpdate) => EventKind::ChangedStatus,
            _ => EventKind::Updated,
        };
        let mut data = plan.data.clone();
        if let UpdateAction::ChangeTo(name) = update.name {
            data.name = normalize_name("name", &name)?;
        }
        data.project_ref_id = update.project_ref_id.or_else(data.project_ref_id);
        data.actionable_date = update.actionable_date.or_else(data.actionable_date);
        data.due_date = update.due_date.or_else(data.due_date);
        if let UpdateAction::ChangeTo(status) = update.status {
            data = data.with_status(status, ctx.action_timestamp);
        }
        check_date_order(data.actionable_date, data.due_date)?;
        if data == plan.data {
            return Ok(plan);
        }

        let plan = repo.save(plan.modify(ctx, kind, |current| *current = data))?;
        if !was_completed {
            record_big_plan(&uow, ctx, &workspace.data, &timezone, &plan)?;
        }
        uow.commit()?;
        Ok(plan)
    }

    /// Archives the plan and every inbox task it owns.
    pub fn archive(&mut self, ctx: &DomainContext, ref_id: EntityId) -> ServiceResult<CascadeOutcome> {
        let uow = self.store.unit_of_work()?;
        let outcome = uow.archive_cascade(BigPlan::TAG, ref_id, ArchivalReason::User, ctx)?;
        uow.commit()?;
        Ok(outcome)
    }

    pub fn remove(&mut self, ref_id: EntityId) -> ServiceResult<CascadeOutcome> {
        let uow = self.store.unit_of_work()?;
        let outcome = uow.remove_cascade(BigPlan::TAG, ref_id)?;
        uow.commit()?;
        Ok(outcome)
    }
}
