//! Person use cases: catch-up and birthday templates.

use crate::config::CoreConfig;
use crate::context::DomainContext;
use crate::model::entity::{ArchivalReason, Entity, EntityId, EntityKind, EventKind};
use crate::model::inbox_task::InboxTaskSource;
use crate::model::person::{Person, PersonBirthday, PersonCollection, PersonRelationship};
use crate::model::project::Project;
use crate::model::update_action::UpdateAction;
use crate::model::validation::normalize_name;
use crate::model::workspace::WorkspaceFeature;
use crate::repo::{CascadeOutcome, EntityRepository, Store, UnitOfWork};
use crate::schedule::RecurringTaskGenParams;
use crate::service::recurring::{propagate, retire_in_flight, RecurringTemplate};
use crate::service::{ensure_feature, load_trunk, load_workspace, ServiceResult};
use jiff::tz::TimeZone;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonUpdate {
    pub name: UpdateAction<String>,
    pub relationship: UpdateAction<PersonRelationship>,
    pub catch_up_params: UpdateAction<Option<RecurringTaskGenParams>>,
    pub birthday: UpdateAction<Option<PersonBirthday>>,
}

/// Use-case service for persons.
pub struct PersonService<'s> {
    store: &'s mut Store,
    preparation_days: u32,
}

impl<'s> PersonService<'s> {
    pub fn new(store: &'s mut Store, config: &CoreConfig) -> Self {
        Self {
            store,
            preparation_days: config.birthday_preparation_days,
        }
    }

    pub fn create(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        name: &str,
        relationship: PersonRelationship,
        catch_up_params: Option<RecurringTaskGenParams>,
        birthday: Option<PersonBirthday>,
    ) -> ServiceResult<Entity<Person>> {
        let uow = self.store.unit_of_work()?;
        let (workspace, _) = load_workspace(&uow, workspace_ref_id)?;
        ensure_feature(&workspace.data, WorkspaceFeature::Persons)?;
        let collection = load_trunk::<PersonCollection>(&uow, workspace_ref_id)?;
        let person = uow.entities::<Person>().create(Entity::new(
            Some(collection.ref_id),
            Person::new(name, relationship, catch_up_params, birthday)?,
            ctx,
        ))?;
        uow.commit()?;
        Ok(person)
    }

    /// Applies a partial update and resyncs both reminder streams.
    ///
    /// # Contract
    /// - A stream whose template disappears (catch-up params or birthday
    ///   cleared) has its in-flight tasks archived.
    pub fn update(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        ref_id: EntityId,
        update: PersonUpdate,
    ) -> ServiceResult<Entity<Person>> {
        let preparation_days = self.preparation_days;
        let uow = self.store.unit_of_work()?;
        let (_, timezone) = load_workspace(&uow, workspace_ref_id)?;
        let collection = load_trunk::<PersonCollection>(&uow, workspace_ref_id)?;
        let repo = uow.entities::<Person>();
        let person = repo.load_by_id(ref_id, false)?;

        let mut data = person.data.clone();
        if let UpdateAction::ChangeTo(name) = update.name {
            data.name = normalize_name("name", &name)?;
        }
        data.relationship = update.relationship.or_else(data.relationship);
        data.catch_up_params = update.catch_up_params.or_else(data.catch_up_params);
        data.birthday = update.birthday.or_else(data.birthday);
        data.validate()?;
        if data == person.data {
            return Ok(person);
        }

        let person = repo.save(person.modify(ctx, EventKind::Updated, |current| *current = data))?;
        resync(&uow, ctx, &person, &collection.data, &timezone, preparation_days)?;
        uow.commit()?;
        Ok(person)
    }

    /// Points catch-up and birthday tasks at another project.
    pub fn change_catch_up_project(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        project_ref_id: EntityId,
    ) -> ServiceResult<Entity<PersonCollection>> {
        let preparation_days = self.preparation_days;
        let uow = self.store.unit_of_work()?;
        let (_, timezone) = load_workspace(&uow, workspace_ref_id)?;
        uow.entities::<Project>().load_by_id(project_ref_id, false)?;
        let collection = load_trunk::<PersonCollection>(&uow, workspace_ref_id)?;
        if collection.data.catch_up_project_ref_id == project_ref_id {
            return Ok(collection);
        }
        let collection = uow.entities::<PersonCollection>().save(collection.modify(
            ctx,
            EventKind::Updated,
            |data| data.catch_up_project_ref_id = project_ref_id,
        ))?;
        for person in uow
            .entities::<Person>()
            .find_all(collection.ref_id, false, None)?
        {
            resync(&uow, ctx, &person, &collection.data, &timezone, preparation_days)?;
        }
        uow.commit()?;
        Ok(collection)
    }

    /// Archives the person, its note and its in-flight reminders.
    pub fn archive(&mut self, ctx: &DomainContext, ref_id: EntityId) -> ServiceResult<CascadeOutcome> {
        let uow = self.store.unit_of_work()?;
        let outcome = uow.archive_cascade(Person::TAG, ref_id, ArchivalReason::User, ctx)?;
        uow.commit()?;
        Ok(outcome)
    }
}

/// Rewrites or retires the in-flight catch-up and birthday tasks of `person`.
fn resync(
    uow: &UnitOfWork<'_>,
    ctx: &DomainContext,
    person: &Entity<Person>,
    collection: &PersonCollection,
    timezone: &TimeZone,
    preparation_days: u32,
) -> ServiceResult<()> {
    match RecurringTemplate::person_catch_up(person, collection) {
        Some(template) => {
            propagate(uow, ctx, &template, timezone)?;
        }
        None => {
            retire_in_flight(uow, ctx, InboxTaskSource::PersonCatchUp, person.ref_id)?;
        }
    }
    match RecurringTemplate::person_birthday(person, collection, preparation_days) {
        Some(template) => {
            propagate(uow, ctx, &template, timezone)?;
        }
        None => {
            retire_in_flight(uow, ctx, InboxTaskSource::PersonBirthday, person.ref_id)?;
        }
    }
    Ok(())
}
