//! Habit template use cases.
//!
//! # Invariants
//! - Every edit that changes instance-derived fields is propagated onto the
//!   habit's in-flight inbox tasks in the same unit of work.
//! - Archiving a habit archives only its in-flight tasks; completed ones
//!   stay for history.

use crate::context::DomainContext;
use crate::model::collections::HabitCollection;
use crate::model::entity::{ArchivalReason, Entity, EntityId, EntityKind, EventKind};
use crate::model::habit::Habit;
use crate::model::project::Project;
use crate::model::update_action::UpdateAction;
use crate::model::validation::normalize_name;
use crate::model::workspace::WorkspaceFeature;
use crate::repo::{CascadeOutcome, EntityRepository, Store};
use crate::schedule::RecurringTaskGenParams;
use crate::service::recurring::{propagate, RecurringTemplate};
use crate::service::{ensure_feature, load_trunk, load_workspace, ServiceError, ServiceResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HabitUpdate {
    pub name: UpdateAction<String>,
    pub project_ref_id: UpdateAction<EntityId>,
    pub gen_params: UpdateAction<RecurringTaskGenParams>,
    pub repeats_in_period_count: UpdateAction<Option<u32>>,
}

/// Use-case service for habits.
pub struct HabitService<'s> {
    store: &'s mut Store,
}

impl<'s> HabitService<'s> {
    pub fn new(store: &'s mut Store) -> Self {
        Self { store }
    }

    pub fn create(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        name: &str,
        project_ref_id: Option<EntityId>,
        gen_params: RecurringTaskGenParams,
        repeats_in_period_count: Option<u32>,
    ) -> ServiceResult<Entity<Habit>> {
        let uow = self.store.unit_of_work()?;
        let (workspace, _) = load_workspace(&uow, workspace_ref_id)?;
        ensure_feature(&workspace.data, WorkspaceFeature::Habits)?;
        let project_ref_id = project_ref_id
            .or(workspace.data.default_project_ref_id)
            .ok_or_else(|| {
                ServiceError::DomainRuleViolation("workspace has no default project".to_string())
            })?;
        uow.entities::<Project>().load_by_id(project_ref_id, false)?;
        let collection = load_trunk::<HabitCollection>(&uow, workspace_ref_id)?;

        let habit = uow.entities::<Habit>().create(Entity::new(
            Some(collection.ref_id),
            Habit::new(name, project_ref_id, gen_params, repeats_in_period_count)?,
            ctx,
        ))?;
        uow.commit()?;
        Ok(habit)
    }

    /// Applies a partial update and rewrites the in-flight instances.
    ///
    /// # Contract
    /// - Instances keep their status, lifecycle timestamps and window anchor.
    /// - Dropping repeats does not remove already generated numbered instances.
    pub fn update(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        ref_id: EntityId,
        update: HabitUpdate,
    ) -> ServiceResult<Entity<Habit>> {
        let uow = self.store.unit_of_work()?;
        let (_, timezone) = load_workspace(&uow, workspace_ref_id)?;
        let repo = uow.entities::<Habit>();
        let habit = repo.load_by_id(ref_id, false)?;
        if let UpdateAction::ChangeTo(project_ref_id) = &update.project_ref_id {
            uow.entities::<Project>().load_by_id(*project_ref_id, false)?;
        }

        let mut data = habit.data.clone();
        if let UpdateAction::ChangeTo(name) = update.name {
            data.name = normalize_name("name", &name)?;
        }
        data.project_ref_id = update.project_ref_id.or_else(data.project_ref_id);
        data.gen_params = update.gen_params.or_else(data.gen_params);
        data.repeats_in_period_count = update
            .repeats_in_period_count
            .or_else(data.repeats_in_period_count);
        data.validate()?;
        if data == habit.data {
            return Ok(habit);
        }

        let habit = repo.save(habit.modify(ctx, EventKind::Updated, |current| *current = data))?;
        propagate(&uow, ctx, &RecurringTemplate::from_habit(&habit), &timezone)?;
        uow.commit()?;
        Ok(habit)
    }

    /// Stops generation without touching existing instances.
    pub fn suspend(&mut self, ctx: &DomainContext, ref_id: EntityId) -> ServiceResult<Entity<Habit>> {
        self.set_suspended(ctx, ref_id, true)
    }

    pub fn unsuspend(&mut self, ctx: &DomainContext, ref_id: EntityId) -> ServiceResult<Entity<Habit>> {
        self.set_suspended(ctx, ref_id, false)
    }

    fn set_suspended(
        &mut self,
        ctx: &DomainContext,
        ref_id: EntityId,
        suspended: bool,
    ) -> ServiceResult<Entity<Habit>> {
        let uow = self.store.unit_of_work()?;
        let repo = uow.entities::<Habit>();
        let habit = repo.load_by_id(ref_id, false)?;
        if habit.data.suspended == suspended {
            return Ok(habit);
        }
        let habit = repo.save(habit.modify(ctx, EventKind::Updated, |data| {
            data.suspended = suspended;
        }))?;
        uow.commit()?;
        Ok(habit)
    }

    /// Archives the habit and its in-flight inbox tasks.
    pub fn archive(&mut self, ctx: &DomainContext, ref_id: EntityId) -> ServiceResult<CascadeOutcome> {
        let uow = self.store.unit_of_work()?;
        let outcome = uow.archive_cascade(Habit::TAG, ref_id, ArchivalReason::User, ctx)?;
        uow.commit()?;
        Ok(outcome)
    }

    pub fn remove(&mut self, ref_id: EntityId) -> ServiceResult<CascadeOutcome> {
        let uow = self.store.unit_of_work()?;
        let outcome = uow.remove_cascade(Habit::TAG, ref_id)?;
        uow.commit()?;
        Ok(outcome)
    }

    pub fn load(&mut self, ref_id: EntityId, allow_archived: bool) -> ServiceResult<Entity<Habit>> {
        let uow = self.store.unit_of_work()?;
        Ok(uow.entities::<Habit>().load_by_id(ref_id, allow_archived)?)
    }
}
