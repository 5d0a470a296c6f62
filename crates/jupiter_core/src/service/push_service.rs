//! Slack and email push integrations.
//!
//! # Responsibility
//! - Turn an incoming message into a push task plus one generated inbox
//!   task in the collection's generation project.
//! - Archive push tasks through [`PushIntegrationArchiver`].
//!
//! # Invariants
//! - A push task owns exactly one inbox task, linked by
//!   `source_entity_ref_id`.

use crate::context::DomainContext;
use crate::model::collections::InboxTaskCollection;
use crate::model::entity::{ArchivalReason, Entity, EntityId, EntityKind, EventKind};
use crate::model::inbox_task::{Difficulty, Eisen, InboxTask, InboxTaskSource, InboxTaskStatus};
use crate::model::push::{EmailTask, EmailTaskCollection, SlackTask, SlackTaskCollection};
use crate::model::workspace::WorkspaceFeature;
use crate::repo::{CascadeOutcome, EntityRepository, Store, UnitOfWork};
use crate::service::recurring::find_instances;
use crate::service::{ensure_feature, load_trunk, load_workspace, ServiceResult};
use jiff::civil::Date;

/// Archives push tasks on behalf of the garbage collector.
pub trait PushIntegrationArchiver {
    fn slack_archive(
        &self,
        uow: &UnitOfWork<'_>,
        ctx: &DomainContext,
        ref_id: EntityId,
        reason: ArchivalReason,
    ) -> ServiceResult<CascadeOutcome>;

    fn email_archive(
        &self,
        uow: &UnitOfWork<'_>,
        ctx: &DomainContext,
        ref_id: EntityId,
        reason: ArchivalReason,
    ) -> ServiceResult<CascadeOutcome>;
}

/// Archiver backed by the store's cascading archival.
#[derive(Debug, Default, Clone, Copy)]
pub struct CascadingPushArchiver;

impl PushIntegrationArchiver for CascadingPushArchiver {
    fn slack_archive(
        &self,
        uow: &UnitOfWork<'_>,
        ctx: &DomainContext,
        ref_id: EntityId,
        reason: ArchivalReason,
    ) -> ServiceResult<CascadeOutcome> {
        Ok(uow.archive_cascade(SlackTask::TAG, ref_id, reason, ctx)?)
    }

    fn email_archive(
        &self,
        uow: &UnitOfWork<'_>,
        ctx: &DomainContext,
        ref_id: EntityId,
        reason: ArchivalReason,
    ) -> ServiceResult<CascadeOutcome> {
        Ok(uow.archive_cascade(EmailTask::TAG, ref_id, reason, ctx)?)
    }
}

/// Generation settings shared by both integrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushTaskOptions {
    pub eisen: Eisen,
    pub difficulty: Option<Difficulty>,
    pub actionable_date: Option<Date>,
    pub due_date: Option<Date>,
}

impl Default for PushTaskOptions {
    fn default() -> Self {
        Self {
            eisen: Eisen::Regular,
            difficulty: None,
            actionable_date: None,
            due_date: None,
        }
    }
}

/// Push task together with the inbox task raised for it.
#[derive(Debug, Clone)]
pub struct NewPushTask<T> {
    pub push_task: Entity<T>,
    pub inbox_task: Entity<InboxTask>,
}

/// The inbox task owned by a push task, archived or not.
pub(crate) fn linked_inbox_task(
    uow: &UnitOfWork<'_>,
    source: InboxTaskSource,
    ref_id: EntityId,
) -> ServiceResult<Option<Entity<InboxTask>>> {
    Ok(find_instances(uow, source, ref_id, true)?.into_iter().next())
}

/// Use-case service for push integrations.
pub struct PushService<'s> {
    store: &'s mut Store,
}

impl<'s> PushService<'s> {
    pub fn new(store: &'s mut Store) -> Self {
        Self { store }
    }

    pub fn create_slack_task(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        user: &str,
        channel: Option<&str>,
        message: &str,
        options: PushTaskOptions,
    ) -> ServiceResult<NewPushTask<SlackTask>> {
        let uow = self.store.unit_of_work()?;
        let (workspace, _) = load_workspace(&uow, workspace_ref_id)?;
        ensure_feature(&workspace.data, WorkspaceFeature::SlackTasks)?;
        let collection = load_trunk::<SlackTaskCollection>(&uow, workspace_ref_id)?;
        let push_task = uow.entities::<SlackTask>().create(Entity::new(
            Some(collection.ref_id),
            SlackTask::new(user, channel, message)?,
            ctx,
        ))?;
        let inbox_task = raise_inbox_task(
            &uow,
            ctx,
            workspace_ref_id,
            InboxTaskSource::SlackTask,
            push_task.ref_id,
            &push_task.data.task_name(),
            collection.data.generation_project_ref_id,
            options,
        )?;
        uow.commit()?;
        Ok(NewPushTask {
            push_task,
            inbox_task,
        })
    }

    pub fn create_email_task(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        email: EmailTask,
        options: PushTaskOptions,
    ) -> ServiceResult<NewPushTask<EmailTask>> {
        let uow = self.store.unit_of_work()?;
        let (workspace, _) = load_workspace(&uow, workspace_ref_id)?;
        ensure_feature(&workspace.data, WorkspaceFeature::EmailTasks)?;
        let collection = load_trunk::<EmailTaskCollection>(&uow, workspace_ref_id)?;
        let push_task = uow
            .entities::<EmailTask>()
            .create(Entity::new(Some(collection.ref_id), email, ctx))?;
        let inbox_task = raise_inbox_task(
            &uow,
            ctx,
            workspace_ref_id,
            InboxTaskSource::EmailTask,
            push_task.ref_id,
            &push_task.data.task_name(),
            collection.data.generation_project_ref_id,
            options,
        )?;
        uow.commit()?;
        Ok(NewPushTask {
            push_task,
            inbox_task,
        })
    }

    /// Replaces the message of a Slack task and renames its inbox task.
    pub fn update_slack_task(
        &mut self,
        ctx: &DomainContext,
        ref_id: EntityId,
        user: &str,
        channel: Option<&str>,
        message: &str,
    ) -> ServiceResult<Entity<SlackTask>> {
        let data = SlackTask::new(user, channel, message)?;
        let uow = self.store.unit_of_work()?;
        let repo = uow.entities::<SlackTask>();
        let push_task = repo.load_by_id(ref_id, false)?;
        if data == push_task.data {
            return Ok(push_task);
        }
        let push_task = repo.save(push_task.modify(ctx, EventKind::Updated, |current| *current = data))?;
        rename_inbox_task(&uow, ctx, InboxTaskSource::SlackTask, ref_id, push_task.data.task_name())?;
        uow.commit()?;
        Ok(push_task)
    }

    /// Email counterpart of [`PushService::update_slack_task`].
    pub fn update_email_task(
        &mut self,
        ctx: &DomainContext,
        ref_id: EntityId,
        email: EmailTask,
    ) -> ServiceResult<Entity<EmailTask>> {
        let uow = self.store.unit_of_work()?;
        let repo = uow.entities::<EmailTask>();
        let push_task = repo.load_by_id(ref_id, false)?;
        if email == push_task.data {
            return Ok(push_task);
        }
        let push_task = repo.save(push_task.modify(ctx, EventKind::Updated, |current| *current = email))?;
        rename_inbox_task(&uow, ctx, InboxTaskSource::EmailTask, ref_id, push_task.data.task_name())?;
        uow.commit()?;
        Ok(push_task)
    }

    pub fn archive_slack_task(
        &mut self,
        ctx: &DomainContext,
        archiver: &dyn PushIntegrationArchiver,
        ref_id: EntityId,
    ) -> ServiceResult<CascadeOutcome> {
        let uow = self.store.unit_of_work()?;
        let outcome = archiver.slack_archive(&uow, ctx, ref_id, ArchivalReason::User)?;
        uow.commit()?;
        Ok(outcome)
    }

    pub fn archive_email_task(
        &mut self,
        ctx: &DomainContext,
        archiver: &dyn PushIntegrationArchiver,
        ref_id: EntityId,
    ) -> ServiceResult<CascadeOutcome> {
        let uow = self.store.unit_of_work()?;
        let outcome = archiver.email_archive(&uow, ctx, ref_id, ArchivalReason::User)?;
        uow.commit()?;
        Ok(outcome)
    }
}

#[allow(clippy::too_many_arguments)]
fn raise_inbox_task(
    uow: &UnitOfWork<'_>,
    ctx: &DomainContext,
    workspace_ref_id: EntityId,
    source: InboxTaskSource,
    push_ref_id: EntityId,
    name: &str,
    project_ref_id: EntityId,
    options: PushTaskOptions,
) -> ServiceResult<Entity<InboxTask>> {
    let tasks = load_trunk::<InboxTaskCollection>(uow, workspace_ref_id)?;
    let data = InboxTask::new_generated(
        source,
        push_ref_id,
        name,
        InboxTaskStatus::NotStartedGen,
        project_ref_id,
        options.eisen,
        options.difficulty,
        options.actionable_date,
        options.due_date,
        None,
        ctx.action_timestamp,
    )?;
    Ok(uow
        .entities::<InboxTask>()
        .create(Entity::new(Some(tasks.ref_id), data, ctx))?)
}

fn rename_inbox_task(
    uow: &UnitOfWork<'_>,
    ctx: &DomainContext,
    source: InboxTaskSource,
    push_ref_id: EntityId,
    name: String,
) -> ServiceResult<()> {
    if let Some(task) = linked_inbox_task(uow, source, push_ref_id)? {
        if task.is_live() && !task.data.is_completed() && task.data.name != name {
            uow.entities::<InboxTask>().save(task.modify(
                ctx,
                EventKind::RegeneratedFromTemplate,
                |data| data.name = name,
            ))?;
        }
    }
    Ok(())
}
