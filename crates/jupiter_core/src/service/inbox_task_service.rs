//! Inbox task use cases for the user surface.
//!
//! # Responsibility
//! - Create user and big-plan tasks.
//! - Update tasks while keeping template-owned fields of generated tasks
//!   out of the user's reach.
//! - Score tasks when they reach a completed status.
//!
//! # Invariants
//! - Generated tasks (every source except user and big plan) refuse edits
//!   to name, eisen, difficulty and project.
//! - Status changes stamp or clear the accepted, working and completed
//!   timestamps.

use crate::context::DomainContext;
use crate::model::big_plan::BigPlan;
use crate::model::collections::InboxTaskCollection;
use crate::model::entity::{ArchivalReason, Entity, EntityId, EntityKind, EventKind};
use crate::model::inbox_task::{
    Difficulty, Eisen, InboxTask, InboxTaskSource, InboxTaskStatus,
};
use crate::model::project::Project;
use crate::model::update_action::UpdateAction;
use crate::model::validation::normalize_name;
use crate::repo::{CascadeOutcome, EntityRepository, Store};
use crate::service::score_service::record_inbox_task;
use crate::service::{load_trunk, load_workspace, ServiceError, ServiceResult};
use jiff::civil::Date;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxTaskCreate {
    pub name: String,
    /// Defaults to the big plan's project, then the workspace default.
    pub project_ref_id: Option<EntityId>,
    pub big_plan_ref_id: Option<EntityId>,
    pub status: InboxTaskStatus,
    pub eisen: Eisen,
    pub difficulty: Option<Difficulty>,
    pub actionable_date: Option<Date>,
    pub due_date: Option<Date>,
}

impl InboxTaskCreate {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            project_ref_id: None,
            big_plan_ref_id: None,
            status: InboxTaskStatus::NotStarted,
            eisen: Eisen::Regular,
            difficulty: None,
            actionable_date: None,
            due_date: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboxTaskUpdate {
    pub name: UpdateAction<String>,
    pub status: UpdateAction<InboxTaskStatus>,
    pub project_ref_id: UpdateAction<EntityId>,
    pub eisen: UpdateAction<Eisen>,
    pub difficulty: UpdateAction<Option<Difficulty>>,
    pub actionable_date: UpdateAction<Option<Date>>,
    pub due_date: UpdateAction<Option<Date>>,
}

impl InboxTaskUpdate {
    pub fn status(status: InboxTaskStatus) -> Self {
        Self {
            status: UpdateAction::change_to(status),
            ..Self::default()
        }
    }

    fn only_status(&self) -> bool {
        self.status.should_change()
            && !self.name.should_change()
            && !self.project_ref_id.should_change()
            && !self.eisen.should_change()
            && !self.difficulty.should_change()
            && !self.actionable_date.should_change()
            && !self.due_date.should_change()
    }
}

/// Use-case service for inbox tasks.
pub struct InboxTaskService<'s> {
    store: &'s mut Store,
}

impl<'s> InboxTaskService<'s> {
    pub fn new(store: &'s mut Store) -> Self {
        Self { store }
    }

    /// Creates a user task, or a big-plan task when `big_plan_ref_id` is set.
    ///
    /// # Contract
    /// - The project and the big plan must be live.
    /// - A task created in a completed status is scored immediately.
    pub fn create(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        request: &InboxTaskCreate,
    ) -> ServiceResult<Entity<InboxTask>> {
        let uow = self.store.unit_of_work()?;
        let (workspace, timezone) = load_workspace(&uow, workspace_ref_id)?;
        let collection = load_trunk::<InboxTaskCollection>(&uow, workspace_ref_id)?;

        let big_plan = match request.big_plan_ref_id {
            Some(ref_id) => Some(uow.entities::<BigPlan>().load_by_id(ref_id, false)?),
            None => None,
        };
        let project_ref_id = request
            .project_ref_id
            .or_else(|| big_plan.as_ref().map(|plan| plan.data.project_ref_id))
            .or(workspace.data.default_project_ref_id)
            .ok_or_else(|| {
                ServiceError::DomainRuleViolation("workspace has no default project".to_string())
            })?;
        uow.entities::<Project>().load_by_id(project_ref_id, false)?;

        let data = match &big_plan {
            Some(plan) => InboxTask::new_generated(
                InboxTaskSource::BigPlan,
                plan.ref_id,
                &request.name,
                request.status,
                project_ref_id,
                request.eisen,
                request.difficulty,
                request.actionable_date,
                request.due_date,
                None,
                ctx.action_timestamp,
            )?,
            None => InboxTask::new_user(
                &request.name,
                request.status,
                project_ref_id,
                request.eisen,
                request.difficulty,
                request.actionable_date,
                request.due_date,
                ctx.action_timestamp,
            )?,
        };
        let task = uow
            .entities::<InboxTask>()
            .create(Entity::new(Some(collection.ref_id), data, ctx))?;
        record_inbox_task(&uow, ctx, &workspace.data, &timezone, &task)?;
        uow.commit()?;
        Ok(task)
    }

    /// Applies a partial update.
    ///
    /// # Contract
    /// - Fails with `CannotModifyGenerated` when a generated task would get a
    ///   different name, eisen, difficulty or project.
    /// - Scores the task when it moves into a completed status.
    pub fn update(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        ref_id: EntityId,
        update: InboxTaskUpdate,
    ) -> ServiceResult<Entity<InboxTask>> {
        let uow = self.store.unit_of_work()?;
        let (workspace, timezone) = load_workspace(&uow, workspace_ref_id)?;
        let repo = uow.entities::<InboxTask>();
        let task = repo.load_by_id(ref_id, false)?;

        let source = task.data.source;
        if !source.allows_user_changes() {
            let forbidden = [
                ("name", update.name.as_ref().map(|name| name.trim() != task.data.name).or_else(false)),
                ("eisen", update.eisen.differs_from(&task.data.eisen)),
                ("difficulty", update.difficulty.differs_from(&task.data.difficulty)),
                ("project_ref_id", update.project_ref_id.differs_from(&task.data.project_ref_id)),
            ];
            if let Some((field, _)) = forbidden.iter().find(|(_, changed)| *changed) {
                return Err(ServiceError::CannotModifyGenerated {
                    field: *field,
                    source,
                });
            }
        }
        if let UpdateAction::ChangeTo(project_ref_id) = &update.project_ref_id {
            uow.entities::<Project>().load_by_id(*project_ref_id, false)?;
        }

        let was_completed = task.data.is_completed();
        let kind = if update.only_status() {
            EventKind::ChangedStatus
        } else {
            EventKind::Updated
        };
        let mut data = task.data.clone();
        if let UpdateAction::ChangeTo(name) = update.name {
            data.name = normalize_name("name", &name)?;
        }
        data.project_ref_id = update.project_ref_id.or_else(data.project_ref_id);
        data.eisen = update.eisen.or_else(data.eisen);
        data.difficulty = update.difficulty.or_else(data.difficulty);
        data.actionable_date = update.actionable_date.or_else(data.actionable_date);
        data.due_date = update.due_date.or_else(data.due_date);
        if let UpdateAction::ChangeTo(status) = update.status {
            data = data.with_status(status, ctx.action_timestamp);
        }
        data.validate()?;
        if data == task.data {
            return Ok(task);
        }

        let task = repo.save(task.modify(ctx, kind, |current| *current = data))?;
        if !was_completed {
            record_inbox_task(&uow, ctx, &workspace.data, &timezone, &task)?;
        }
        uow.commit()?;
        Ok(task)
    }

    pub fn change_status(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        ref_id: EntityId,
        status: InboxTaskStatus,
    ) -> ServiceResult<Entity<InboxTask>> {
        self.update(ctx, workspace_ref_id, ref_id, InboxTaskUpdate::status(status))
    }

    /// Archives a task together with its note.
    pub fn archive(&mut self, ctx: &DomainContext, ref_id: EntityId) -> ServiceResult<CascadeOutcome> {
        let uow = self.store.unit_of_work()?;
        let outcome = uow.archive_cascade(InboxTask::TAG, ref_id, ArchivalReason::User, ctx)?;
        uow.commit()?;
        Ok(outcome)
    }

    pub fn remove(&mut self, ref_id: EntityId) -> ServiceResult<CascadeOutcome> {
        let uow = self.store.unit_of_work()?;
        let outcome = uow.remove_cascade(InboxTask::TAG, ref_id)?;
        uow.commit()?;
        Ok(outcome)
    }

    pub fn load(&mut self, ref_id: EntityId, allow_archived: bool) -> ServiceResult<Entity<InboxTask>> {
        let uow = self.store.unit_of_work()?;
        Ok(uow.entities::<InboxTask>().load_by_id(ref_id, allow_archived)?)
    }
}
