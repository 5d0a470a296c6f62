//! Garbage collector for finished work.
//!
//! # Responsibility
//! - Archive completed inbox tasks and big plans, stale working mem
//!   entries and answered push tasks.
//! - Record every archived entity in one `GcLogEntry` per run.
//!
//! # Invariants
//! - Each target runs in its own unit of work together with its log append.
//! - A run that aborts leaves its log entry open; targets committed before
//!   the failure stay committed.

use crate::config::CoreConfig;
use crate::context::{section, DomainContext, ProgressReporter};
use crate::model::big_plan::BigPlan;
use crate::model::collections::{BigPlanCollection, GcLog, InboxTaskCollection};
use crate::model::entity::{ArchivalReason, Entity, EntityId, EntityKind, EntitySummary, EventKind};
use crate::model::inbox_task::{InboxTask, InboxTaskSource};
use crate::model::logs::GcLogEntry;
use crate::model::push::{EmailTask, EmailTaskCollection, SlackTask, SlackTaskCollection};
use crate::model::validation::InputValidationError;
use crate::model::working_mem::{WorkingMem, WorkingMemCollection};
use crate::model::workspace::SyncTarget;
use crate::repo::{CascadeOutcome, EntityRepository, Store, UnitOfWork};
use crate::service::push_service::{linked_inbox_task, CascadingPushArchiver, PushIntegrationArchiver};
use crate::service::{check_targets, load_trunk, load_workspace, ordered_targets, ServiceResult};
use jiff::civil::Date;
use jiff::ToSpan;
use log::{error, info, warn};
use std::time::Instant;
use uuid::Uuid;

/// Use-case service running the garbage collector.
pub struct GcService<'s> {
    store: &'s mut Store,
    config: &'s CoreConfig,
    archiver: &'s dyn PushIntegrationArchiver,
}

impl<'s> GcService<'s> {
    pub fn new(store: &'s mut Store, config: &'s CoreConfig) -> Self {
        Self {
            store,
            config,
            archiver: &CascadingPushArchiver,
        }
    }

    /// Archives push tasks through `archiver` instead of the store cascade.
    pub fn with_archiver(mut self, archiver: &'s dyn PushIntegrationArchiver) -> Self {
        self.archiver = archiver;
        self
    }

    /// Runs the collector over `targets` and returns the closed log entry.
    ///
    /// # Contract
    /// - Fails with `FeatureUnavailable` before any write when a target is
    ///   disabled in the workspace.
    /// - `NotFound` inside one target rolls that target back and the run
    ///   continues; any other failure aborts the run.
    pub fn run(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        today: Date,
        targets: &[SyncTarget],
        reporter: &dyn ProgressReporter,
    ) -> ServiceResult<Entity<GcLogEntry>> {
        let run_id = Uuid::new_v4();
        let started_at = Instant::now();
        let ordered = ordered_targets(targets, &SyncTarget::GC);

        let log_ref_id = {
            let uow = self.store.unit_of_work()?;
            let (workspace, _) = load_workspace(&uow, workspace_ref_id)?;
            check_targets(&workspace.data, targets, &SyncTarget::GC)?;
            let gc_log = load_trunk::<GcLog>(&uow, workspace_ref_id)?;
            let entry = uow.entities::<GcLogEntry>().create(Entity::new(
                Some(gc_log.ref_id),
                GcLogEntry::open(ctx.event_source, today, ordered.clone()),
                ctx,
            ))?;
            uow.commit()?;
            entry.ref_id
        };
        info!(
            "event=gc_run module=service status=start run_id={} workspace_ref_id={} today={} targets={}",
            run_id,
            workspace_ref_id,
            today,
            ordered.len()
        );

        for target in ordered {
            let result = section(reporter, target.as_str(), || {
                self.run_target(ctx, workspace_ref_id, log_ref_id, today, target)
            });
            match result {
                Ok(archived) => {
                    for summary in &archived {
                        reporter.mark_archived(summary);
                    }
                    info!(
                        "event=gc_run module=service status=ok run_id={} target={} archived={}",
                        run_id,
                        target,
                        archived.len()
                    );
                }
                Err(err) if err.is_not_found() => {
                    warn!(
                        "event=gc_run module=service status=skipped run_id={} target={} error={}",
                        run_id, target, err
                    );
                }
                Err(err) => {
                    error!(
                        "event=gc_run module=service status=error run_id={} target={} error={}",
                        run_id, target, err
                    );
                    return Err(err);
                }
            }
        }

        let uow = self.store.unit_of_work()?;
        let repo = uow.entities::<GcLogEntry>();
        let entry = repo.load_by_id(log_ref_id, false)?;
        let entry = repo.save(entry.modify(ctx, EventKind::Closed, |data| data.closed = true))?;
        uow.commit()?;
        info!(
            "event=gc_run module=service status=ok run_id={} archived={} duration_ms={}",
            run_id,
            entry.data.entity_records.len(),
            started_at.elapsed().as_millis()
        );
        Ok(entry)
    }

    fn run_target(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        log_ref_id: EntityId,
        today: Date,
        target: SyncTarget,
    ) -> ServiceResult<Vec<EntitySummary>> {
        let gc_days = self.config.working_mem_gc_days;
        let archiver = self.archiver;
        let uow = self.store.unit_of_work()?;
        load_workspace(&uow, workspace_ref_id)?;

        let archived = match target {
            SyncTarget::InboxTasks => collect_inbox_tasks(&uow, ctx, workspace_ref_id)?,
            SyncTarget::WorkingMem => collect_working_mem(&uow, ctx, workspace_ref_id, today, gc_days)?,
            SyncTarget::BigPlans => collect_big_plans(&uow, ctx, workspace_ref_id)?,
            SyncTarget::SlackTasks => {
                let collection = load_trunk::<SlackTaskCollection>(&uow, workspace_ref_id)?;
                let ref_ids = push_task_ids::<SlackTask>(&uow, collection.ref_id)?;
                collect_push_tasks(&uow, InboxTaskSource::SlackTask, &ref_ids, |ref_id| {
                    archiver.slack_archive(&uow, ctx, ref_id, ArchivalReason::Gc)
                })?
            }
            SyncTarget::EmailTasks => {
                let collection = load_trunk::<EmailTaskCollection>(&uow, workspace_ref_id)?;
                let ref_ids = push_task_ids::<EmailTask>(&uow, collection.ref_id)?;
                collect_push_tasks(&uow, InboxTaskSource::EmailTask, &ref_ids, |ref_id| {
                    archiver.email_archive(&uow, ctx, ref_id, ArchivalReason::Gc)
                })?
            }
            other => {
                return Err(InputValidationError::new(
                    "targets",
                    format!("`{other}` is not a garbage collection target"),
                )
                .into())
            }
        };

        if !archived.is_empty() {
            let repo = uow.entities::<GcLogEntry>();
            let entry = repo.load_by_id(log_ref_id, false)?;
            repo.save(entry.modify(ctx, EventKind::AppendedRecords, |data| {
                data.entity_records.extend(archived.iter().cloned());
            }))?;
        }
        uow.commit()?;
        Ok(archived)
    }
}

/// Completed inbox tasks, each with its note.
fn collect_inbox_tasks(
    uow: &UnitOfWork<'_>,
    ctx: &DomainContext,
    workspace_ref_id: EntityId,
) -> ServiceResult<Vec<EntitySummary>> {
    let collection = load_trunk::<InboxTaskCollection>(uow, workspace_ref_id)?;
    let mut archived = Vec::new();
    for task in uow
        .entities::<InboxTask>()
        .find_all(collection.ref_id, false, None)?
    {
        if task.data.is_completed() {
            let outcome = uow.archive_cascade(InboxTask::TAG, task.ref_id, ArchivalReason::Gc, ctx)?;
            archived.extend(outcome.affected);
        }
    }
    Ok(archived)
}

/// Working mem entries at least `gc_days` old, with their note and cleanup task.
fn collect_working_mem(
    uow: &UnitOfWork<'_>,
    ctx: &DomainContext,
    workspace_ref_id: EntityId,
    today: Date,
    gc_days: u32,
) -> ServiceResult<Vec<EntitySummary>> {
    let collection = load_trunk::<WorkingMemCollection>(uow, workspace_ref_id)?;
    let Ok(cutoff) = today.checked_sub(i64::from(gc_days).days()) else {
        return Ok(Vec::new());
    };
    let mut archived = Vec::new();
    for working_mem in uow
        .entities::<WorkingMem>()
        .find_all(collection.ref_id, false, None)?
    {
        if working_mem.data.right_now <= cutoff {
            let outcome =
                uow.archive_cascade(WorkingMem::TAG, working_mem.ref_id, ArchivalReason::Gc, ctx)?;
            archived.extend(outcome.affected);
        }
    }
    Ok(archived)
}

/// Completed big plans with every task they own.
fn collect_big_plans(
    uow: &UnitOfWork<'_>,
    ctx: &DomainContext,
    workspace_ref_id: EntityId,
) -> ServiceResult<Vec<EntitySummary>> {
    let collection = load_trunk::<BigPlanCollection>(uow, workspace_ref_id)?;
    let mut archived = Vec::new();
    for plan in uow
        .entities::<BigPlan>()
        .find_all(collection.ref_id, false, None)?
    {
        if plan.data.status.is_completed() {
            let outcome = uow.archive_cascade(BigPlan::TAG, plan.ref_id, ArchivalReason::Gc, ctx)?;
            archived.extend(outcome.affected);
        }
    }
    Ok(archived)
}

fn push_task_ids<T: EntityKind>(
    uow: &UnitOfWork<'_>,
    collection_ref_id: EntityId,
) -> ServiceResult<Vec<EntityId>> {
    Ok(uow
        .entities::<T>()
        .find_all(collection_ref_id, false, None)?
        .into_iter()
        .map(|push_task| push_task.ref_id)
        .collect())
}

/// Push tasks whose inbox task is completed, archived or gone.
fn collect_push_tasks(
    uow: &UnitOfWork<'_>,
    source: InboxTaskSource,
    ref_ids: &[EntityId],
    mut archive: impl FnMut(EntityId) -> ServiceResult<CascadeOutcome>,
) -> ServiceResult<Vec<EntitySummary>> {
    let mut archived = Vec::new();
    for ref_id in ref_ids {
        let finished = match linked_inbox_task(uow, source, *ref_id)? {
            Some(task) => task.archived || task.data.is_completed(),
            None => true,
        };
        if finished {
            archived.extend(archive(*ref_id)?.affected);
        }
    }
    Ok(archived)
}
