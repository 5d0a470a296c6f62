//! Vacation use cases.

use crate::context::DomainContext;
use crate::model::collections::VacationCollection;
use crate::model::entity::{ArchivalReason, Entity, EntityId, EntityKind, EventKind};
use crate::model::update_action::UpdateAction;
use crate::model::vacation::Vacation;
use crate::model::workspace::WorkspaceFeature;
use crate::repo::{CascadeOutcome, EntityRepository, Store, UnitOfWork};
use crate::schedule::Schedule;
use crate::service::{ensure_feature, load_trunk, load_workspace, ServiceResult};
use jiff::civil::Date;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VacationUpdate {
    pub name: UpdateAction<String>,
    pub start_date: UpdateAction<Date>,
    pub end_date: UpdateAction<Date>,
}

/// Live vacations of a workspace.
pub(crate) fn live_vacations(
    uow: &UnitOfWork<'_>,
    workspace_ref_id: EntityId,
) -> ServiceResult<Vec<Vacation>> {
    let collection = load_trunk::<VacationCollection>(uow, workspace_ref_id)?;
    Ok(uow
        .entities::<Vacation>()
        .find_all(collection.ref_id, false, None)?
        .into_iter()
        .map(|vacation| vacation.data)
        .collect())
}

/// Whether one vacation spans the whole window.
pub(crate) fn covered_by_vacation(vacations: &[Vacation], schedule: &Schedule) -> bool {
    vacations.iter().any(|vacation| vacation.covers(schedule))
}

/// Use-case service for vacations.
pub struct VacationService<'s> {
    store: &'s mut Store,
}

impl<'s> VacationService<'s> {
    pub fn new(store: &'s mut Store) -> Self {
        Self { store }
    }

    pub fn create(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        name: &str,
        start_date: Date,
        end_date: Date,
    ) -> ServiceResult<Entity<Vacation>> {
        let uow = self.store.unit_of_work()?;
        let (workspace, _) = load_workspace(&uow, workspace_ref_id)?;
        ensure_feature(&workspace.data, WorkspaceFeature::Vacations)?;
        let collection = load_trunk::<VacationCollection>(&uow, workspace_ref_id)?;
        let vacation = uow.entities::<Vacation>().create(Entity::new(
            Some(collection.ref_id),
            Vacation::new(name, start_date, end_date)?,
            ctx,
        ))?;
        uow.commit()?;
        Ok(vacation)
    }

    pub fn update(
        &mut self,
        ctx: &DomainContext,
        ref_id: EntityId,
        update: VacationUpdate,
    ) -> ServiceResult<Entity<Vacation>> {
        let uow = self.store.unit_of_work()?;
        let repo = uow.entities::<Vacation>();
        let vacation = repo.load_by_id(ref_id, false)?;
        let data = Vacation::new(
            &update.name.or_else(vacation.data.name.clone()),
            update.start_date.or_else(vacation.data.start_date),
            update.end_date.or_else(vacation.data.end_date),
        )?;
        if data == vacation.data {
            return Ok(vacation);
        }
        let vacation = repo.save(vacation.modify(ctx, EventKind::Updated, |current| *current = data))?;
        uow.commit()?;
        Ok(vacation)
    }

    pub fn archive(&mut self, ctx: &DomainContext, ref_id: EntityId) -> ServiceResult<CascadeOutcome> {
        let uow = self.store.unit_of_work()?;
        let outcome = uow.archive_cascade(Vacation::TAG, ref_id, ArchivalReason::User, ctx)?;
        uow.commit()?;
        Ok(outcome)
    }

    pub fn remove(&mut self, ref_id: EntityId) -> ServiceResult<CascadeOutcome> {
        let uow = self.store.unit_of_work()?;
        let outcome = uow.remove_cascade(Vacation::TAG, ref_id)?;
        uow.commit()?;
        Ok(outcome)
    }
}
