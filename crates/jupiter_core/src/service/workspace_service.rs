//! Workspace bootstrap and settings.
//!
//! # Responsibility
//! - Create a user, their score log and a workspace with every trunk.
//! - Toggle workspace features.
//!
//! # Invariants
//! - A freshly initialized workspace has exactly one trunk of each kind and
//!   a live root project set as its default project.

use crate::context::DomainContext;
use crate::model::collections::{
    BigPlanCollection, ChoreCollection, GcLog, GenLog, HabitCollection, InboxTaskCollection,
    NoteCollection, ProjectCollection, ScoreLog, StatsLog, VacationCollection,
};
use crate::model::entity::{Entity, EntityId, EntityKind, EventKind};
use crate::model::journal::{JournalCollection, JournalGenerationApproach};
use crate::model::metric::MetricCollection;
use crate::model::person::PersonCollection;
use crate::model::project::Project;
use crate::model::push::{EmailTaskCollection, SlackTaskCollection};
use crate::model::working_mem::WorkingMemCollection;
use crate::model::workspace::{User, Workspace, WorkspaceFeature};
use crate::repo::{EntityRepository, Store, UnitOfWork};
use crate::schedule::RecurringTaskPeriod;
use crate::service::{load_workspace, ServiceResult};
use log::info;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitWorkspaceRequest {
    pub user_email: String,
    pub user_name: String,
    /// IANA name shared by the user and the workspace.
    pub timezone: String,
    pub workspace_name: String,
    pub root_project_name: String,
    pub disabled_features: BTreeSet<WorkspaceFeature>,
}

impl InitWorkspaceRequest {
    pub fn new(user_email: &str, user_name: &str, timezone: &str, workspace_name: &str) -> Self {
        Self {
            user_email: user_email.to_string(),
            user_name: user_name.to_string(),
            timezone: timezone.to_string(),
            workspace_name: workspace_name.to_string(),
            root_project_name: "Life".to_string(),
            disabled_features: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InitWorkspaceResult {
    pub user: Entity<User>,
    pub workspace: Entity<Workspace>,
    pub root_project: Entity<Project>,
}

/// Use-case service for workspace lifecycle.
pub struct WorkspaceService<'s> {
    store: &'s mut Store,
}

impl<'s> WorkspaceService<'s> {
    pub fn new(store: &'s mut Store) -> Self {
        Self { store }
    }

    /// Creates the user, the workspace and every trunk in one unit of work.
    ///
    /// # Contract
    /// - Setting collections (metrics, persons, journals, working mem, push
    ///   integrations) point their generated tasks at the root project.
    /// - Journals default to weekly entries with a writing task; working
    ///   mem defaults to daily.
    pub fn init(
        &mut self,
        ctx: &DomainContext,
        request: &InitWorkspaceRequest,
    ) -> ServiceResult<InitWorkspaceResult> {
        let user_data = User::new(&request.user_email, &request.user_name, &request.timezone)?;
        let uow = self.store.unit_of_work()?;

        let user = uow.entities::<User>().create(Entity::new(None, user_data, ctx))?;
        create_trunk(&uow, ctx, user.ref_id, ScoreLog::default())?;

        let mut workspace_data =
            Workspace::new(&request.workspace_name, &request.timezone, user.ref_id)?;
        for feature in &request.disabled_features {
            workspace_data.feature_flags.remove(feature);
        }
        let workspace = uow
            .entities::<Workspace>()
            .create(Entity::new(None, workspace_data, ctx))?;
        let ws = workspace.ref_id;

        let projects = create_trunk(&uow, ctx, ws, ProjectCollection::default())?;
        let root_project = uow.entities::<Project>().create(Entity::new(
            Some(projects.ref_id),
            Project::new(&request.root_project_name, None)?,
            ctx,
        ))?;
        let root = root_project.ref_id;

        create_trunk(&uow, ctx, ws, InboxTaskCollection::default())?;
        create_trunk(&uow, ctx, ws, HabitCollection::default())?;
        create_trunk(&uow, ctx, ws, ChoreCollection::default())?;
        create_trunk(&uow, ctx, ws, BigPlanCollection::default())?;
        create_trunk(&uow, ctx, ws, VacationCollection::default())?;
        create_trunk(&uow, ctx, ws, NoteCollection::default())?;
        create_trunk(
            &uow,
            ctx,
            ws,
            MetricCollection {
                collection_project_ref_id: root,
            },
        )?;
        create_trunk(
            &uow,
            ctx,
            ws,
            PersonCollection {
                catch_up_project_ref_id: root,
            },
        )?;
        create_trunk(
            &uow,
            ctx,
            ws,
            WorkingMemCollection::new(RecurringTaskPeriod::Daily, root)?,
        )?;
        create_trunk(
            &uow,
            ctx,
            ws,
            JournalCollection::new(
                BTreeSet::from([RecurringTaskPeriod::Weekly]),
                root,
                JournalGenerationApproach::BothJournalAndTask,
            )?,
        )?;
        create_trunk(
            &uow,
            ctx,
            ws,
            SlackTaskCollection {
                generation_project_ref_id: root,
            },
        )?;
        create_trunk(
            &uow,
            ctx,
            ws,
            EmailTaskCollection {
                generation_project_ref_id: root,
            },
        )?;
        create_trunk(&uow, ctx, ws, GcLog::default())?;
        create_trunk(&uow, ctx, ws, GenLog::default())?;
        create_trunk(&uow, ctx, ws, StatsLog::default())?;

        let workspace = uow.entities::<Workspace>().save(workspace.modify(
            ctx,
            EventKind::Updated,
            |data| data.default_project_ref_id = Some(root),
        ))?;
        uow.commit()?;

        info!(
            "event=workspace_init module=service status=ok user_ref_id={} workspace_ref_id={} root_project_ref_id={}",
            user.ref_id, workspace.ref_id, root
        );
        Ok(InitWorkspaceResult {
            user,
            workspace,
            root_project,
        })
    }

    pub fn load(&mut self, workspace_ref_id: EntityId) -> ServiceResult<Entity<Workspace>> {
        let uow = self.store.unit_of_work()?;
        let (workspace, _) = load_workspace(&uow, workspace_ref_id)?;
        Ok(workspace)
    }

    /// Live workspaces ordered by ref id.
    pub fn list(&mut self) -> ServiceResult<Vec<Entity<Workspace>>> {
        let uow = self.store.unit_of_work()?;
        Ok(uow.entities::<Workspace>().find_all_generic(None, false, &[])?)
    }

    /// Enables or disables one feature.
    pub fn set_feature(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        feature: WorkspaceFeature,
        enabled: bool,
    ) -> ServiceResult<Entity<Workspace>> {
        let uow = self.store.unit_of_work()?;
        let (workspace, _) = load_workspace(&uow, workspace_ref_id)?;
        if workspace.data.is_feature_available(feature) == enabled {
            return Ok(workspace);
        }
        let workspace = uow.entities::<Workspace>().save(workspace.modify(
            ctx,
            EventKind::Updated,
            |data| {
                if enabled {
                    data.feature_flags.insert(feature);
                } else {
                    data.feature_flags.remove(&feature);
                }
            },
        ))?;
        uow.commit()?;
        Ok(workspace)
    }
}

fn create_trunk<C: EntityKind>(
    uow: &UnitOfWork<'_>,
    ctx: &DomainContext,
    parent_ref_id: EntityId,
    data: C,
) -> ServiceResult<Entity<C>> {
    Ok(uow.entities::<C>().create(Entity::new(Some(parent_ref_id), data, ctx))?)
}
