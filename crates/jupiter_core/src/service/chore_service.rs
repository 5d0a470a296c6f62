//! Chore template use cases.

use crate::context::DomainContext;
use crate::model::chore::Chore;
use crate::model::collections::ChoreCollection;
use crate::model::entity::{ArchivalReason, Entity, EntityId, EntityKind, EventKind};
use crate::model::project::Project;
use crate::model::update_action::UpdateAction;
use crate::model::validation::{normalize_name, InputValidationError};
use crate::model::workspace::WorkspaceFeature;
use crate::repo::{CascadeOutcome, EntityRepository, Store};
use crate::schedule::RecurringTaskGenParams;
use crate::service::recurring::{propagate, RecurringTemplate};
use crate::service::{ensure_feature, load_trunk, load_workspace, ServiceError, ServiceResult};
use jiff::civil::Date;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoreCreate {
    pub name: String,
    pub project_ref_id: Option<EntityId>,
    pub gen_params: RecurringTaskGenParams,
    pub must_do: bool,
    /// Defaults to today.
    pub start_at_date: Option<Date>,
    pub end_at_date: Option<Date>,
}

impl ChoreCreate {
    pub fn new(name: &str, gen_params: RecurringTaskGenParams) -> Self {
        Self {
            name: name.to_string(),
            project_ref_id: None,
            gen_params,
            must_do: false,
            start_at_date: None,
            end_at_date: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChoreUpdate {
    pub name: UpdateAction<String>,
    pub project_ref_id: UpdateAction<EntityId>,
    pub gen_params: UpdateAction<RecurringTaskGenParams>,
    pub must_do: UpdateAction<bool>,
    pub start_at_date: UpdateAction<Date>,
    pub end_at_date: UpdateAction<Option<Date>>,
}

/// Use-case service for chores.
pub struct ChoreService<'s> {
    store: &'s mut Store,
}

impl<'s> ChoreService<'s> {
    pub fn new(store: &'s mut Store) -> Self {
        Self { store }
    }

    /// Creates a chore; `end_at_date` may not lie before `today`.
    pub fn create(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        today: Date,
        request: &ChoreCreate,
    ) -> ServiceResult<Entity<Chore>> {
        let uow = self.store.unit_of_work()?;
        let (workspace, _) = load_workspace(&uow, workspace_ref_id)?;
        ensure_feature(&workspace.data, WorkspaceFeature::Chores)?;
        let project_ref_id = request
            .project_ref_id
            .or(workspace.data.default_project_ref_id)
            .ok_or_else(|| {
                ServiceError::DomainRuleViolation("workspace has no default project".to_string())
            })?;
        uow.entities::<Project>().load_by_id(project_ref_id, false)?;
        let collection = load_trunk::<ChoreCollection>(&uow, workspace_ref_id)?;

        let data = Chore::new(
            &request.name,
            project_ref_id,
            request.gen_params.clone(),
            request.must_do,
            request.start_at_date,
            request.end_at_date,
            today,
        )?;
        let chore = uow
            .entities::<Chore>()
            .create(Entity::new(Some(collection.ref_id), data, ctx))?;
        uow.commit()?;
        Ok(chore)
    }

    /// Applies a partial update and rewrites the in-flight instances.
    pub fn update(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        today: Date,
        ref_id: EntityId,
        update: ChoreUpdate,
    ) -> ServiceResult<Entity<Chore>> {
        let uow = self.store.unit_of_work()?;
        let (_, timezone) = load_workspace(&uow, workspace_ref_id)?;
        let repo = uow.entities::<Chore>();
        let chore = repo.load_by_id(ref_id, false)?;
        if let UpdateAction::ChangeTo(project_ref_id) = &update.project_ref_id {
            uow.entities::<Project>().load_by_id(*project_ref_id, false)?;
        }
        if let UpdateAction::ChangeTo(Some(end)) = &update.end_at_date {
            if *end < today {
                return Err(InputValidationError::new(
                    "end_at_date",
                    format!("{end} is before today {today}"),
                )
                .into());
            }
        }

        let mut data = chore.data.clone();
        if let UpdateAction::ChangeTo(name) = update.name {
            data.name = normalize_name("name", &name)?;
        }
        data.project_ref_id = update.project_ref_id.or_else(data.project_ref_id);
        data.gen_params = update.gen_params.or_else(data.gen_params);
        data.must_do = update.must_do.or_else(data.must_do);
        data.start_at_date = update.start_at_date.or_else(data.start_at_date);
        data.end_at_date = update.end_at_date.or_else(data.end_at_date);
        data.validate()?;
        if data == chore.data {
            return Ok(chore);
        }

        let chore = repo.save(chore.modify(ctx, EventKind::Updated, |current| *current = data))?;
        propagate(&uow, ctx, &RecurringTemplate::from_chore(&chore), &timezone)?;
        uow.commit()?;
        Ok(chore)
    }

    pub fn suspend(&mut self, ctx: &DomainContext, ref_id: EntityId) -> ServiceResult<Entity<Chore>> {
        self.set_suspended(ctx, ref_id, true)
    }

    pub fn unsuspend(&mut self, ctx: &DomainContext, ref_id: EntityId) -> ServiceResult<Entity<Chore>> {
        self.set_suspended(ctx, ref_id, false)
    }

    fn set_suspended(
        &mut self,
        ctx: &DomainContext,
        ref_id: EntityId,
        suspended: bool,
    ) -> ServiceResult<Entity<Chore>> {
        let uow = self.store.unit_of_work()?;
        let repo = uow.entities::<Chore>();
        let chore = repo.load_by_id(ref_id, false)?;
        if chore.data.suspended == suspended {
            return Ok(chore);
        }
        let chore = repo.save(chore.modify(ctx, EventKind::Updated, |data| {
            data.suspended = suspended;
        }))?;
        uow.commit()?;
        Ok(chore)
    }

    /// Archives the chore and its in-flight inbox tasks.
    pub fn archive(&mut self, ctx: &DomainContext, ref_id: EntityId) -> ServiceResult<CascadeOutcome> {
        let uow = self.store.unit_of_work()?;
        let outcome = uow.archive_cascade(Chore::TAG, ref_id, ArchivalReason::User, ctx)?;
        uow.commit()?;
        Ok(outcome)
    }

    pub fn remove(&mut self, ref_id: EntityId) -> ServiceResult<CascadeOutcome> {
        let uow = self.store.unit_of_work()?;
        let outcome = uow.remove_cascade(Chore::TAG, ref_id)?;
        uow.commit()?;
        Ok(outcome)
    }
}
