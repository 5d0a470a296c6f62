//! Project hierarchy use cases.
//!
//! # Invariants
//! - Every project except the root has a live parent project listing it in
//!   `order_of_child_projects`.
//! - The default project and projects used by setting collections cannot
//!   be archived or removed.

use crate::context::DomainContext;
use crate::model::collections::ProjectCollection;
use crate::model::entity::{ArchivalReason, Entity, EntityId, EntityKind, EventKind};
use crate::model::journal::JournalCollection;
use crate::model::metric::MetricCollection;
use crate::model::person::PersonCollection;
use crate::model::project::Project;
use crate::model::validation::normalize_name;
use crate::model::push::{EmailTaskCollection, SlackTaskCollection};
use crate::model::working_mem::WorkingMemCollection;
use crate::model::workspace::Workspace;
use crate::repo::{CascadeOutcome, EntityRepository, Store, UnitOfWork};
use crate::service::{load_trunk, load_workspace, ServiceError, ServiceResult};

/// Use-case service for projects.
pub struct ProjectService<'s> {
    store: &'s mut Store,
}

impl<'s> ProjectService<'s> {
    pub fn new(store: &'s mut Store) -> Self {
        Self { store }
    }

    /// Creates a project under `parent_ref_id`, or under the default project.
    pub fn create(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        name: &str,
        parent_ref_id: Option<EntityId>,
    ) -> ServiceResult<Entity<Project>> {
        let uow = self.store.unit_of_work()?;
        let (workspace, _) = load_workspace(&uow, workspace_ref_id)?;
        let parent_ref_id = match parent_ref_id.or(workspace.data.default_project_ref_id) {
            Some(ref_id) => ref_id,
            None => {
                return Err(ServiceError::DomainRuleViolation(
                    "workspace has no default project".to_string(),
                ))
            }
        };
        let collection = load_trunk::<ProjectCollection>(&uow, workspace_ref_id)?;
        let repo = uow.entities::<Project>();
        let parent = repo.load_by_id(parent_ref_id, false)?;

        let project = repo.create(Entity::new(
            Some(collection.ref_id),
            Project::new(name, Some(parent_ref_id))?,
            ctx,
        ))?;
        repo.save(parent.modify(ctx, EventKind::Updated, |data| data.add_child(project.ref_id)))?;
        uow.commit()?;
        Ok(project)
    }

    pub fn rename(
        &mut self,
        ctx: &DomainContext,
        ref_id: EntityId,
        name: &str,
    ) -> ServiceResult<Entity<Project>> {
        let name = normalize_name("name", name)?;
        let uow = self.store.unit_of_work()?;
        let repo = uow.entities::<Project>();
        let project = repo.load_by_id(ref_id, false)?;
        let project = repo.save(project.modify(ctx, EventKind::Updated, |data| data.name = name))?;
        uow.commit()?;
        Ok(project)
    }

    /// Archives a project nothing live refers to.
    pub fn archive(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        ref_id: EntityId,
    ) -> ServiceResult<CascadeOutcome> {
        let uow = self.store.unit_of_work()?;
        let (workspace, _) = load_workspace(&uow, workspace_ref_id)?;
        check_not_pinned(&uow, &workspace, ref_id)?;
        let outcome = uow.archive_cascade(Project::TAG, ref_id, ArchivalReason::User, ctx)?;
        detach_from_parent(&uow, ctx, ref_id)?;
        uow.commit()?;
        Ok(outcome)
    }

    /// Hard-deletes a project nothing refers to, archived or not.
    pub fn remove(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        ref_id: EntityId,
    ) -> ServiceResult<CascadeOutcome> {
        let uow = self.store.unit_of_work()?;
        let (workspace, _) = load_workspace(&uow, workspace_ref_id)?;
        check_not_pinned(&uow, &workspace, ref_id)?;
        detach_from_parent(&uow, ctx, ref_id)?;
        let outcome = uow.remove_cascade(Project::TAG, ref_id)?;
        uow.commit()?;
        Ok(outcome)
    }
}

fn check_not_pinned(
    uow: &UnitOfWork<'_>,
    workspace: &Entity<Workspace>,
    ref_id: EntityId,
) -> ServiceResult<()> {
    if workspace.data.default_project_ref_id == Some(ref_id) {
        return Err(ServiceError::DomainRuleViolation(format!(
            "project {ref_id} is the workspace default project"
        )));
    }
    let ws = workspace.ref_id;
    let pinned = [
        (
            "metric collection",
            load_trunk::<MetricCollection>(uow, ws)?.data.collection_project_ref_id,
        ),
        (
            "person collection",
            load_trunk::<PersonCollection>(uow, ws)?.data.catch_up_project_ref_id,
        ),
        (
            "working mem collection",
            load_trunk::<WorkingMemCollection>(uow, ws)?.data.cleanup_project_ref_id,
        ),
        (
            "journal collection",
            load_trunk::<JournalCollection>(uow, ws)?.data.writing_task_project_ref_id,
        ),
        (
            "slack task collection",
            load_trunk::<SlackTaskCollection>(uow, ws)?.data.generation_project_ref_id,
        ),
        (
            "email task collection",
            load_trunk::<EmailTaskCollection>(uow, ws)?.data.generation_project_ref_id,
        ),
    ];
    match pinned.iter().find(|(_, project)| *project == ref_id) {
        Some((owner, _)) => Err(ServiceError::DomainRuleViolation(format!(
            "project {ref_id} is used by the {owner}"
        ))),
        None => Ok(()),
    }
}

fn detach_from_parent(uow: &UnitOfWork<'_>, ctx: &DomainContext, ref_id: EntityId) -> ServiceResult<()> {
    let repo = uow.entities::<Project>();
    let project = repo.load_by_id(ref_id, true)?;
    let Some(parent_ref_id) = project.data.parent_project_ref_id else {
        return Ok(());
    };
    if let Some(parent) = repo.load_optional(parent_ref_id, true)? {
        if parent.data.order_of_child_projects.contains(&ref_id) {
            repo.save(parent.modify(ctx, EventKind::Updated, |data| data.remove_child(ref_id)))?;
        }
    }
    Ok(())
}
