//! Core domain logic for Jupiter, a GTD-style recurring-work engine.
//! This crate is the single source of truth for business invariants.

pub mod config;
pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schedule;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use context::{
    DomainContext, EventSource, NoOpProgressReporter, ProgressReporter, RecordingProgressReporter,
    TimeProvider,
};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::entity::{ArchivalReason, Entity, EntityId, EntitySummary, EntityTag};
pub use model::workspace::{SyncTarget, WorkspaceFeature};
pub use repo::{Store, StoreError, StoreResult};
pub use schedule::{RecurringTaskGenParams, RecurringTaskPeriod, RecurringTaskSkipRule, Schedule};
pub use service::gc_service::GcService;
pub use service::gen_service::{GenRequest, GenService};
pub use service::stats_service::StatsService;
pub use service::workspace_service::{InitWorkspaceRequest, WorkspaceService};
pub use service::{ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
