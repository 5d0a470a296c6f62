#![allow(dead_code)]

use jiff::civil::Date;
use jiff::tz::TimeZone;
use jupiter_core::model::collections::InboxTaskCollection;
use jupiter_core::model::inbox_task::{InboxTask, InboxTaskSource};
use jupiter_core::repo::EntityRepository;
use jupiter_core::{
    CoreConfig, DomainContext, Entity, EntityId, EventSource, InitWorkspaceRequest, Store,
    TimeProvider, WorkspaceService,
};

pub struct Fixture {
    pub store: Store,
    pub config: CoreConfig,
    pub workspace_ref_id: EntityId,
    pub root_project_ref_id: EntityId,
}

impl Fixture {
    pub fn new(today: Date) -> Self {
        let mut store = Store::open_in_memory().unwrap();
        let result = WorkspaceService::new(&mut store)
            .init(
                &ctx_at(today),
                &InitWorkspaceRequest::new("ana@example.com", "Ana", "UTC", "Work"),
            )
            .unwrap();
        Self {
            store,
            config: CoreConfig::default(),
            workspace_ref_id: result.workspace.ref_id,
            root_project_ref_id: result.root_project.ref_id,
        }
    }

    /// Every inbox task of the workspace, archived ones included.
    pub fn inbox_tasks(&mut self) -> Vec<Entity<InboxTask>> {
        let uow = self.store.unit_of_work().unwrap();
        let collection = uow
            .entities::<InboxTaskCollection>()
            .load_by_parent(self.workspace_ref_id)
            .unwrap();
        uow.entities::<InboxTask>()
            .find_all(collection.ref_id, true, None)
            .unwrap()
    }

    pub fn tasks_from(&mut self, source: InboxTaskSource) -> Vec<Entity<InboxTask>> {
        self.inbox_tasks()
            .into_iter()
            .filter(|task| task.data.source == source)
            .collect()
    }
}

/// Context frozen at local midday of `today` in UTC.
pub fn ctx_at(today: Date) -> DomainContext {
    DomainContext::from_time(EventSource::Cli, &TimeProvider::at_date(today, TimeZone::UTC))
}
