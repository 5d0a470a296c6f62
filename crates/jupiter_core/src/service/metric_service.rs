//! Metric and metric entry use cases.
//!
//! A metric with collection params is a template for "collect value"
//! tasks in the metric collection's project.

use crate::context::DomainContext;
use crate::model::entity::{ArchivalReason, Entity, EntityId, EntityKind, EventKind};
use crate::model::inbox_task::InboxTaskSource;
use crate::model::metric::{Metric, MetricCollection, MetricEntry, MetricUnit};
use crate::model::project::Project;
use crate::model::update_action::UpdateAction;
use crate::model::validation::normalize_name;
use crate::model::workspace::WorkspaceFeature;
use crate::repo::{CascadeOutcome, EntityRepository, Store};
use crate::schedule::RecurringTaskGenParams;
use crate::service::recurring::{propagate, retire_in_flight, RecurringTemplate};
use crate::service::{ensure_feature, load_trunk, load_workspace, ServiceResult};
use jiff::civil::Date;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricUpdate {
    pub name: UpdateAction<String>,
    pub collection_params: UpdateAction<Option<RecurringTaskGenParams>>,
    pub unit: UpdateAction<Option<MetricUnit>>,
    pub icon: UpdateAction<Option<String>>,
}

/// Use-case service for metrics.
pub struct MetricService<'s> {
    store: &'s mut Store,
}

impl<'s> MetricService<'s> {
    pub fn new(store: &'s mut Store) -> Self {
        Self { store }
    }

    pub fn create(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        name: &str,
        collection_params: Option<RecurringTaskGenParams>,
        unit: Option<MetricUnit>,
        icon: Option<String>,
    ) -> ServiceResult<Entity<Metric>> {
        let uow = self.store.unit_of_work()?;
        let (workspace, _) = load_workspace(&uow, workspace_ref_id)?;
        ensure_feature(&workspace.data, WorkspaceFeature::Metrics)?;
        let collection = load_trunk::<MetricCollection>(&uow, workspace_ref_id)?;
        let metric = uow.entities::<Metric>().create(Entity::new(
            Some(collection.ref_id),
            Metric::new(name, collection_params, unit, icon)?,
            ctx,
        ))?;
        uow.commit()?;
        Ok(metric)
    }

    /// Applies a partial update.
    ///
    /// # Contract
    /// - With collection params still set, in-flight collection tasks are
    ///   rewritten from the new template.
    /// - Dropping the collection params archives in-flight collection tasks.
    pub fn update(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        ref_id: EntityId,
        update: MetricUpdate,
    ) -> ServiceResult<Entity<Metric>> {
        let uow = self.store.unit_of_work()?;
        let (_, timezone) = load_workspace(&uow, workspace_ref_id)?;
        let collection = load_trunk::<MetricCollection>(&uow, workspace_ref_id)?;
        let repo = uow.entities::<Metric>();
        let metric = repo.load_by_id(ref_id, false)?;

        let mut data = metric.data.clone();
        if let UpdateAction::ChangeTo(name) = update.name {
            data.name = normalize_name("name", &name)?;
        }
        data.collection_params = update.collection_params.or_else(data.collection_params);
        data.unit = update.unit.or_else(data.unit);
        data.icon = update
            .icon
            .map(|icon| icon.map(|icon| icon.trim().to_string()).filter(|icon| !icon.is_empty()))
            .or_else(data.icon);
        data.validate()?;
        if data == metric.data {
            return Ok(metric);
        }

        let metric = repo.save(metric.modify(ctx, EventKind::Updated, |current| *current = data))?;
        match RecurringTemplate::from_metric(&metric, &collection.data) {
            Some(template) => {
                propagate(&uow, ctx, &template, &timezone)?;
            }
            None => {
                retire_in_flight(&uow, ctx, InboxTaskSource::Metric, metric.ref_id)?;
            }
        }
        uow.commit()?;
        Ok(metric)
    }

    /// Points generated collection tasks at another project.
    pub fn change_collection_project(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        project_ref_id: EntityId,
    ) -> ServiceResult<Entity<MetricCollection>> {
        let uow = self.store.unit_of_work()?;
        let (_, timezone) = load_workspace(&uow, workspace_ref_id)?;
        uow.entities::<Project>().load_by_id(project_ref_id, false)?;
        let collection = load_trunk::<MetricCollection>(&uow, workspace_ref_id)?;
        if collection.data.collection_project_ref_id == project_ref_id {
            return Ok(collection);
        }
        let collection = uow.entities::<MetricCollection>().save(collection.modify(
            ctx,
            EventKind::Updated,
            |data| data.collection_project_ref_id = project_ref_id,
        ))?;
        for metric in uow
            .entities::<Metric>()
            .find_all(collection.ref_id, false, None)?
        {
            if let Some(template) = RecurringTemplate::from_metric(&metric, &collection.data) {
                propagate(&uow, ctx, &template, &timezone)?;
            }
        }
        uow.commit()?;
        Ok(collection)
    }

    /// Archives the metric, its entries and its in-flight collection tasks.
    pub fn archive(&mut self, ctx: &DomainContext, ref_id: EntityId) -> ServiceResult<CascadeOutcome> {
        let uow = self.store.unit_of_work()?;
        let outcome = uow.archive_cascade(Metric::TAG, ref_id, ArchivalReason::User, ctx)?;
        uow.commit()?;
        Ok(outcome)
    }

    pub fn create_entry(
        &mut self,
        ctx: &DomainContext,
        metric_ref_id: EntityId,
        collection_time: Date,
        value: f64,
        notes: Option<String>,
    ) -> ServiceResult<Entity<MetricEntry>> {
        let uow = self.store.unit_of_work()?;
        uow.entities::<Metric>().load_by_id(metric_ref_id, false)?;
        let entry = uow.entities::<MetricEntry>().create(Entity::new(
            Some(metric_ref_id),
            MetricEntry::new(collection_time, value, notes)?,
            ctx,
        ))?;
        uow.commit()?;
        Ok(entry)
    }

    pub fn archive_entry(
        &mut self,
        ctx: &DomainContext,
        ref_id: EntityId,
    ) -> ServiceResult<CascadeOutcome> {
        let uow = self.store.unit_of_work()?;
        let outcome = uow.archive_cascade(MetricEntry::TAG, ref_id, ArchivalReason::User, ctx)?;
        uow.commit()?;
        Ok(outcome)
    }

    /// Live entries of a metric, oldest collection first.
    pub fn entries(&mut self, metric_ref_id: EntityId) -> ServiceResult<Vec<Entity<MetricEntry>>> {
        let uow = self.store.unit_of_work()?;
        let mut entries = uow
            .entities::<MetricEntry>()
            .find_all(metric_ref_id, false, None)?;
        entries.sort_by_key(|entry| (entry.data.collection_time, entry.ref_id));
        Ok(entries)
    }
}
