//! Journal use cases.
//!
//! # Responsibility
//! - Create journals by hand or from the generator, each with its note,
//!   report snapshot and optional writing task.
//! - Keep collection settings and writing tasks in sync.
//!
//! # Invariants
//! - At most one live journal exists per `(period, timeline)`.

use crate::context::DomainContext;
use crate::model::collections::{InboxTaskCollection, NoteCollection};
use crate::model::entity::{ArchivalReason, Entity, EntityId, EntityKind, EntitySummary, EventKind};
use crate::model::inbox_task::{Difficulty, Eisen, InboxTask};
use crate::model::journal::{Journal, JournalCollection, JournalGenerationApproach, JournalSource};
use crate::model::note::{Note, NoteDomain};
use crate::model::project::Project;
use crate::model::update_action::UpdateAction;
use crate::model::validation::InputValidationError;
use crate::model::workspace::WorkspaceFeature;
use crate::repo::{CascadeOutcome, EntityRepository, FieldFilter, Store, UnitOfWork};
use crate::schedule::{RecurringTaskPeriod, Schedule};
use crate::service::recurring::{propagate, RecurringTemplate};
use crate::service::report_service::{InboxTaskReportService, ReportService};
use crate::service::{ensure_feature, load_trunk, load_workspace, ServiceError, ServiceResult};
use jiff::civil::Date;
use jiff::tz::TimeZone;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalSettingsUpdate {
    pub periods: UpdateAction<BTreeSet<RecurringTaskPeriod>>,
    pub writing_task_project_ref_id: UpdateAction<EntityId>,
    pub writing_task_eisen: UpdateAction<Eisen>,
    pub writing_task_difficulty: UpdateAction<Option<Difficulty>>,
    pub generation_approach: UpdateAction<JournalGenerationApproach>,
}

/// Entities created for one journal.
#[derive(Debug, Clone)]
pub struct NewJournal {
    pub journal: Entity<Journal>,
    pub created: Vec<EntitySummary>,
}

/// Live journal of `period` covering `timeline`, if any.
pub(crate) fn find_journal(
    uow: &UnitOfWork<'_>,
    collection_ref_id: EntityId,
    period: RecurringTaskPeriod,
    timeline: &str,
) -> ServiceResult<Option<Entity<Journal>>> {
    let filters = [
        FieldFilter::of("period", &[period])?,
        FieldFilter::of("timeline", &[timeline])?,
    ];
    Ok(uow
        .entities::<Journal>()
        .find_all_generic(Some(collection_ref_id), false, &filters)?
        .into_iter()
        .next())
}

/// Creates a journal for the window of `period` containing `right_now`,
/// together with its note and, when the collection asks for it, its
/// writing task.
#[allow(clippy::too_many_arguments)]
pub(crate) fn create_journal(
    uow: &UnitOfWork<'_>,
    ctx: &DomainContext,
    workspace_ref_id: EntityId,
    timezone: &TimeZone,
    collection: &Entity<JournalCollection>,
    source: JournalSource,
    right_now: Date,
    period: RecurringTaskPeriod,
    report_service: &dyn ReportService,
) -> ServiceResult<NewJournal> {
    let schedule = Schedule::for_period(period, right_now);
    let report = report_service.snapshot(uow, workspace_ref_id, right_now, period, timezone)?;
    let journal = uow.entities::<Journal>().create(Entity::new(
        Some(collection.ref_id),
        Journal::new(source, right_now, period, schedule.timeline, report),
        ctx,
    ))?;
    let mut created = vec![journal.summary()];

    let notes = load_trunk::<NoteCollection>(uow, workspace_ref_id)?;
    let note = uow.entities::<Note>().create(Entity::new(
        Some(notes.ref_id),
        Note::new(NoteDomain::Journal, journal.ref_id, &journal.data.name, "")?,
        ctx,
    ))?;
    created.push(note.summary());

    if collection.data.generation_approach.creates_task() {
        let template = RecurringTemplate::journal_writing(&journal, &collection.data);
        let schedule = template.schedule(right_now);
        let tasks = load_trunk::<InboxTaskCollection>(uow, workspace_ref_id)?;
        let task = uow.entities::<InboxTask>().create(Entity::new(
            Some(tasks.ref_id),
            template.new_instance(&schedule, None, timezone, ctx.action_timestamp)?,
            ctx,
        ))?;
        created.push(task.summary());
    }
    Ok(NewJournal { journal, created })
}

/// Use-case service for journals.
pub struct JournalService<'s> {
    store: &'s mut Store,
}

impl<'s> JournalService<'s> {
    pub fn new(store: &'s mut Store) -> Self {
        Self { store }
    }

    /// Creates a user journal for the window of `period` containing `right_now`.
    pub fn create(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        right_now: Date,
        period: RecurringTaskPeriod,
    ) -> ServiceResult<NewJournal> {
        let uow = self.store.unit_of_work()?;
        let (workspace, timezone) = load_workspace(&uow, workspace_ref_id)?;
        ensure_feature(&workspace.data, WorkspaceFeature::Journals)?;
        let collection = load_trunk::<JournalCollection>(&uow, workspace_ref_id)?;
        let timeline = Schedule::for_period(period, right_now).timeline;
        if find_journal(&uow, collection.ref_id, period, &timeline)?.is_some() {
            return Err(ServiceError::DomainRuleViolation(format!(
                "a {period} journal already exists for {timeline}"
            )));
        }
        let created = create_journal(
            &uow,
            ctx,
            workspace_ref_id,
            &timezone,
            &collection,
            JournalSource::User,
            right_now,
            period,
            &InboxTaskReportService,
        )?;
        uow.commit()?;
        Ok(created)
    }

    /// Replaces the report snapshot with a fresh one.
    pub fn refresh_report(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        ref_id: EntityId,
    ) -> ServiceResult<Entity<Journal>> {
        let uow = self.store.unit_of_work()?;
        let (_, timezone) = load_workspace(&uow, workspace_ref_id)?;
        let repo = uow.entities::<Journal>();
        let journal = repo.load_by_id(ref_id, false)?;
        let report = InboxTaskReportService.snapshot(
            &uow,
            workspace_ref_id,
            journal.data.right_now,
            journal.data.period,
            &timezone,
        )?;
        if report == journal.data.report {
            return Ok(journal);
        }
        let journal = repo.save(journal.modify(ctx, EventKind::Updated, |data| data.report = report))?;
        uow.commit()?;
        Ok(journal)
    }

    /// Changes collection settings and rewrites in-flight writing tasks.
    pub fn update_settings(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        update: JournalSettingsUpdate,
    ) -> ServiceResult<Entity<JournalCollection>> {
        let uow = self.store.unit_of_work()?;
        let (_, timezone) = load_workspace(&uow, workspace_ref_id)?;
        let collection = load_trunk::<JournalCollection>(&uow, workspace_ref_id)?;
        if let UpdateAction::ChangeTo(project_ref_id) = &update.writing_task_project_ref_id {
            uow.entities::<Project>().load_by_id(*project_ref_id, false)?;
        }

        let mut data = collection.data.clone();
        data.periods = update.periods.or_else(data.periods);
        data.writing_task_project_ref_id = update
            .writing_task_project_ref_id
            .or_else(data.writing_task_project_ref_id);
        data.writing_task_eisen = update.writing_task_eisen.or_else(data.writing_task_eisen);
        data.writing_task_difficulty = update
            .writing_task_difficulty
            .or_else(data.writing_task_difficulty);
        data.generation_approach = update.generation_approach.or_else(data.generation_approach);
        if data.periods.is_empty() && data.generation_approach.creates_journal() {
            return Err(InputValidationError::new(
                "periods",
                "at least one period is needed to generate journals",
            )
            .into());
        }
        if data == collection.data {
            return Ok(collection);
        }

        let collection = uow.entities::<JournalCollection>().save(collection.modify(
            ctx,
            EventKind::Updated,
            |current| *current = data,
        ))?;
        for journal in uow
            .entities::<Journal>()
            .find_all(collection.ref_id, false, None)?
        {
            let template = RecurringTemplate::journal_writing(&journal, &collection.data);
            propagate(&uow, ctx, &template, &timezone)?;
        }
        uow.commit()?;
        Ok(collection)
    }

    /// Archives the journal, its note and its writing task.
    pub fn archive(&mut self, ctx: &DomainContext, ref_id: EntityId) -> ServiceResult<CascadeOutcome> {
        let uow = self.store.unit_of_work()?;
        let outcome = uow.archive_cascade(Journal::TAG, ref_id, ArchivalReason::User, ctx)?;
        uow.commit()?;
        Ok(outcome)
    }

    pub fn remove(&mut self, ref_id: EntityId) -> ServiceResult<CascadeOutcome> {
        let uow = self.store.unit_of_work()?;
        let outcome = uow.remove_cascade(Journal::TAG, ref_id)?;
        uow.commit()?;
        Ok(outcome)
    }
}
