//! Recurring task generator.
//!
//! # Responsibility
//! - Materialize one inbox task per template, window and repeat index for
//!   the requested targets.
//! - Auto-create journals and working mem entries for the current window.
//! - Record every created or updated entity in one `GenLogEntry` per run.
//!
//! # Invariants
//! - Generation is idempotent: an existing instance for a slot is never
//!   duplicated, and an archived one is never resurrected.
//! - Each target runs in its own unit of work; the log append for a target
//!   commits with the target's writes.
//! - A run that aborts leaves its log entry open.
//!
//! # See also
//! - `service::recurring`

use crate::config::CoreConfig;
use crate::context::{section, DomainContext, ProgressReporter};
use crate::model::chore::Chore;
use crate::model::collections::{ChoreCollection, GenLog, HabitCollection, InboxTaskCollection, NoteCollection};
use crate::model::entity::{Entity, EntityId, EntitySummary, EventKind};
use crate::model::habit::Habit;
use crate::model::inbox_task::InboxTask;
use crate::model::journal::{Journal, JournalCollection, JournalSource};
use crate::model::logs::{GenFilters, GenLogEntry};
use crate::model::metric::{Metric, MetricCollection};
use crate::model::note::{Note, NoteDomain};
use crate::model::person::{Person, PersonCollection};
use crate::model::validation::InputValidationError;
use crate::model::vacation::Vacation;
use crate::model::working_mem::{WorkingMem, WorkingMemCollection};
use crate::model::workspace::SyncTarget;
use crate::repo::{EntityRepository, FieldFilter, Store, UnitOfWork};
use crate::schedule::Schedule;
use crate::service::journal_service::{create_journal, find_journal};
use crate::service::recurring::{find_instances, RecurringTemplate};
use crate::service::report_service::{InboxTaskReportService, ReportService};
use crate::service::vacation_service::{covered_by_vacation, live_vacations};
use crate::service::{check_targets, load_trunk, load_workspace, ordered_targets, ServiceResult};
use jiff::civil::Date;
use jiff::tz::TimeZone;
use jiff::{Timestamp, ToSpan};
use log::{error, info, warn};
use std::time::Instant;
use uuid::Uuid;

/// Parameters of one generator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenRequest {
    pub today: Date,
    pub targets: Vec<SyncTarget>,
    /// Per-target ref id filters; a missing key means every live entity.
    pub filters: GenFilters,
    /// Also resync existing instances of templates not modified recently.
    pub gen_even_if_not_modified: bool,
}

impl GenRequest {
    /// Every generator target, no filters.
    pub fn all(today: Date) -> Self {
        Self {
            today,
            targets: SyncTarget::GEN.to_vec(),
            filters: GenFilters::new(),
            gen_even_if_not_modified: false,
        }
    }
}

#[derive(Debug, Default)]
struct TargetRecords {
    created: Vec<EntitySummary>,
    updated: Vec<EntitySummary>,
}

/// Run-wide inputs shared by every template of a target.
struct GenScope<'a> {
    ctx: &'a DomainContext,
    timezone: &'a TimeZone,
    inbox_collection_ref_id: EntityId,
    vacations: &'a [Vacation],
    resync_before: Option<Timestamp>,
}

/// Use-case service running the generator.
pub struct GenService<'s> {
    store: &'s mut Store,
    config: &'s CoreConfig,
    report_service: &'s dyn ReportService,
}

impl<'s> GenService<'s> {
    pub fn new(store: &'s mut Store, config: &'s CoreConfig) -> Self {
        Self {
            store,
            config,
            report_service: &InboxTaskReportService,
        }
    }

    /// Uses `report_service` for journals created by this run.
    pub fn with_report_service(mut self, report_service: &'s dyn ReportService) -> Self {
        self.report_service = report_service;
        self
    }

    /// Runs the generator and returns the closed log entry.
    ///
    /// # Contract
    /// - Fails with `FeatureUnavailable` before any write when a target is
    ///   disabled in the workspace.
    /// - `NotFound` inside one target rolls that target back and the run
    ///   continues; any other failure aborts the run.
    pub fn generate(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        request: &GenRequest,
        reporter: &dyn ProgressReporter,
    ) -> ServiceResult<Entity<GenLogEntry>> {
        let run_id = Uuid::new_v4();
        let started_at = Instant::now();
        let targets = ordered_targets(&request.targets, &SyncTarget::GEN);

        let log_ref_id = {
            let uow = self.store.unit_of_work()?;
            let (workspace, _) = load_workspace(&uow, workspace_ref_id)?;
            check_targets(&workspace.data, &request.targets, &SyncTarget::GEN)?;
            let gen_log = load_trunk::<GenLog>(&uow, workspace_ref_id)?;
            let entry = uow.entities::<GenLogEntry>().create(Entity::new(
                Some(gen_log.ref_id),
                GenLogEntry::open(
                    ctx.event_source,
                    request.today,
                    targets.clone(),
                    request.gen_even_if_not_modified,
                    request.filters.clone(),
                ),
                ctx,
            ))?;
            uow.commit()?;
            entry.ref_id
        };
        info!(
            "event=gen_run module=service status=start run_id={} workspace_ref_id={} today={} targets={}",
            run_id,
            workspace_ref_id,
            request.today,
            targets.len()
        );

        for target in targets {
            let result = section(reporter, target.as_str(), || {
                self.run_target(ctx, workspace_ref_id, log_ref_id, target, request)
            });
            match result {
                Ok(records) => {
                    for summary in &records.created {
                        reporter.mark_created(summary);
                    }
                    for summary in &records.updated {
                        reporter.mark_updated(summary);
                    }
                    info!(
                        "event=gen_run module=service status=ok run_id={} target={} created={} updated={}",
                        run_id,
                        target,
                        records.created.len(),
                        records.updated.len()
                    );
                }
                Err(err) if err.is_not_found() => {
                    warn!(
                        "event=gen_run module=service status=skipped run_id={} target={} error={}",
                        run_id, target, err
                    );
                }
                Err(err) => {
                    error!(
                        "event=gen_run module=service status=error run_id={} target={} error={}",
                        run_id, target, err
                    );
                    return Err(err);
                }
            }
        }

        let uow = self.store.unit_of_work()?;
        let repo = uow.entities::<GenLogEntry>();
        let entry = repo.load_by_id(log_ref_id, false)?;
        let entry = repo.save(entry.modify(ctx, EventKind::Closed, |data| data.closed = true))?;
        uow.commit()?;
        info!(
            "event=gen_run module=service status=ok run_id={} created={} updated={} duration_ms={}",
            run_id,
            entry.data.entity_created_records.len(),
            entry.data.entity_updated_records.len(),
            started_at.elapsed().as_millis()
        );
        Ok(entry)
    }

    fn run_target(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        log_ref_id: EntityId,
        target: SyncTarget,
        request: &GenRequest,
    ) -> ServiceResult<TargetRecords> {
        let config = self.config;
        let report_service = self.report_service;
        let uow = self.store.unit_of_work()?;
        let (_, timezone) = load_workspace(&uow, workspace_ref_id)?;
        let inbox_collection = load_trunk::<InboxTaskCollection>(&uow, workspace_ref_id)?;
        let vacations = live_vacations(&uow, workspace_ref_id)?;
        let lookback = i64::from(config.gen_modified_lookback_hours).hours();
        let resync_before = if request.gen_even_if_not_modified {
            None
        } else {
            ctx.action_timestamp.checked_sub(lookback).ok()
        };
        let scope = GenScope {
            ctx,
            timezone: &timezone,
            inbox_collection_ref_id: inbox_collection.ref_id,
            vacations: &vacations,
            resync_before,
        };
        let filter = request.filters.get(&target).map(Vec::as_slice);
        let today = request.today;

        let mut records = TargetRecords::default();
        match target {
            SyncTarget::Habits => {
                let collection = load_trunk::<HabitCollection>(&uow, workspace_ref_id)?;
                for habit in uow.entities::<Habit>().find_all(collection.ref_id, false, filter)? {
                    let template = RecurringTemplate::from_habit(&habit);
                    generate_slots(&uow, &scope, &template, today, &mut records)?;
                }
            }
            SyncTarget::Chores => {
                let collection = load_trunk::<ChoreCollection>(&uow, workspace_ref_id)?;
                for chore in uow.entities::<Chore>().find_all(collection.ref_id, false, filter)? {
                    let template = RecurringTemplate::from_chore(&chore);
                    generate_slots(&uow, &scope, &template, today, &mut records)?;
                }
            }
            SyncTarget::Metrics => {
                let collection = load_trunk::<MetricCollection>(&uow, workspace_ref_id)?;
                for metric in uow.entities::<Metric>().find_all(collection.ref_id, false, filter)? {
                    if let Some(template) = RecurringTemplate::from_metric(&metric, &collection.data) {
                        generate_slots(&uow, &scope, &template, today, &mut records)?;
                    }
                }
            }
            SyncTarget::Persons => {
                let collection = load_trunk::<PersonCollection>(&uow, workspace_ref_id)?;
                for person in uow.entities::<Person>().find_all(collection.ref_id, false, filter)? {
                    let templates = [
                        RecurringTemplate::person_catch_up(&person, &collection.data),
                        RecurringTemplate::person_birthday(
                            &person,
                            &collection.data,
                            config.birthday_preparation_days,
                        ),
                    ];
                    for template in templates.iter().flatten() {
                        generate_slots(&uow, &scope, template, today, &mut records)?;
                    }
                }
            }
            SyncTarget::Journals => {
                generate_journals(
                    &uow,
                    &scope,
                    report_service,
                    workspace_ref_id,
                    today,
                    filter,
                    &mut records,
                )?;
            }
            SyncTarget::WorkingMem => {
                generate_working_mem(&uow, &scope, workspace_ref_id, today, filter, &mut records)?;
            }
            other => {
                return Err(InputValidationError::new(
                    "targets",
                    format!("`{other}` is not a generator target"),
                )
                .into())
            }
        }

        if !records.created.is_empty() || !records.updated.is_empty() {
            let repo = uow.entities::<GenLogEntry>();
            let entry = repo.load_by_id(log_ref_id, false)?;
            repo.save(entry.modify(ctx, EventKind::AppendedRecords, |data| {
                data.entity_created_records.extend(records.created.iter().cloned());
                data.entity_updated_records.extend(records.updated.iter().cloned());
            }))?;
        }
        uow.commit()?;
        Ok(records)
    }
}

#[allow(clippy::too_many_arguments)]
fn generate_journals(
    uow: &UnitOfWork<'_>,
    scope: &GenScope<'_>,
    report_service: &dyn ReportService,
    workspace_ref_id: EntityId,
    today: Date,
    filter: Option<&[EntityId]>,
    records: &mut TargetRecords,
) -> ServiceResult<()> {
    let collection = load_trunk::<JournalCollection>(uow, workspace_ref_id)?;
    let approach = collection.data.generation_approach;
    if !approach.creates_journal() {
        return Ok(());
    }

    let mut journals: Vec<Entity<Journal>> = Vec::new();
    match filter {
        Some(ref_ids) => {
            journals = uow
                .entities::<Journal>()
                .find_all(collection.ref_id, false, Some(ref_ids))?;
        }
        None => {
            for period in &collection.data.periods {
                let timeline = Schedule::for_period(*period, today).timeline;
                match find_journal(uow, collection.ref_id, *period, &timeline)? {
                    Some(journal) => journals.push(journal),
                    None => {
                        let created = create_journal(
                            uow,
                            scope.ctx,
                            workspace_ref_id,
                            scope.timezone,
                            &collection,
                            JournalSource::Recurring,
                            today,
                            *period,
                            report_service,
                        )?;
                        records.created.extend(created.created);
                    }
                }
            }
        }
    }

    if approach.creates_task() {
        for journal in &journals {
            let template = RecurringTemplate::journal_writing(journal, &collection.data);
            generate_slots(uow, scope, &template, journal.data.right_now, records)?;
        }
    }
    Ok(())
}

/// Creates or resyncs the instances of `template` for the window of `right_now`.
fn generate_slots(
    uow: &UnitOfWork<'_>,
    scope: &GenScope<'_>,
    template: &RecurringTemplate,
    right_now: Date,
    records: &mut TargetRecords,
) -> ServiceResult<()> {
    if template.suspended {
        return Ok(());
    }
    let schedule = template.schedule(right_now);
    if !template.is_active_in(&schedule) {
        return Ok(());
    }
    if !schedule.should_keep(template.gen_params.skip_rule.as_ref()) {
        return Ok(());
    }
    if template.skip_on_vacation && covered_by_vacation(scope.vacations, &schedule) {
        return Ok(());
    }

    let repo = uow.entities::<InboxTask>();
    let existing = find_instances(uow, template.source, template.ref_id, true)?;
    let may_resync = scope
        .resync_before
        .map_or(true, |threshold| template.last_modified_time >= threshold);

    for repeat_index in &template.repeat_indexes {
        let slot = existing
            .iter()
            .find(|task| task.data.occupies_slot(&schedule.timeline, *repeat_index));
        match slot {
            Some(task) if task.archived => continue,
            Some(task) => {
                if !may_resync || task.data.is_completed() {
                    continue;
                }
                if let Some(data) = template.resynced(&task.data, scope.timezone) {
                    let saved = repo.save(task.clone().modify(
                        scope.ctx,
                        EventKind::RegeneratedFromTemplate,
                        |current| *current = data,
                    ))?;
                    records.updated.push(saved.summary());
                }
            }
            None => {
                let data = template.new_instance(
                    &schedule,
                    *repeat_index,
                    scope.timezone,
                    scope.ctx.action_timestamp,
                )?;
                let created = repo.create(Entity::new(
                    Some(scope.inbox_collection_ref_id),
                    data,
                    scope.ctx,
                ))?;
                records.created.push(created.summary());
            }
        }
    }
    Ok(())
}

fn generate_working_mem(
    uow: &UnitOfWork<'_>,
    scope: &GenScope<'_>,
    workspace_ref_id: EntityId,
    today: Date,
    filter: Option<&[EntityId]>,
    records: &mut TargetRecords,
) -> ServiceResult<()> {
    let collection = load_trunk::<WorkingMemCollection>(uow, workspace_ref_id)?;
    let repo = uow.entities::<WorkingMem>();

    let entries = match filter {
        Some(ref_ids) => repo.find_all(collection.ref_id, false, Some(ref_ids))?,
        None => {
            let period = collection.data.generation_period;
            let timeline = Schedule::for_period(period, today).timeline;
            let filters = [
                FieldFilter::of("period", &[period])?,
                FieldFilter::of("timeline", &[timeline.as_str()])?,
            ];
            let mut current = repo.find_all_generic(Some(collection.ref_id), false, &filters)?;
            if current.is_empty() {
                let working_mem = repo.create(Entity::new(
                    Some(collection.ref_id),
                    WorkingMem::new(today, period, timeline),
                    scope.ctx,
                ))?;
                let notes = load_trunk::<NoteCollection>(uow, workspace_ref_id)?;
                let note = uow.entities::<Note>().create(Entity::new(
                    Some(notes.ref_id),
                    Note::new(NoteDomain::WorkingMem, working_mem.ref_id, &working_mem.data.name, "")?,
                    scope.ctx,
                ))?;
                records.created.push(working_mem.summary());
                records.created.push(note.summary());
                current.push(working_mem);
            }
            current
        }
    };

    for working_mem in &entries {
        let template = RecurringTemplate::working_mem_cleanup(working_mem, &collection.data);
        generate_slots(uow, scope, &template, working_mem.data.right_now, records)?;
    }
    Ok(())
}
