//! Per-target entity counts.

use crate::context::DomainContext;
use crate::model::collections::StatsLog;
use crate::model::entity::{Entity, EntityId, EntityTag, EventKind};
use crate::model::links::is_completed_payload;
use crate::model::logs::{StatsLogEntry, TargetStats};
use crate::model::workspace::SyncTarget;
use crate::repo::cascade::raw_summary;
use crate::repo::{EntityRepository, Store};
use crate::service::{check_targets, load_trunk, load_workspace, ordered_targets, ServiceResult};
use jiff::civil::Date;
use log::info;

/// Trunk and leaf tags counted for `target`.
fn target_tags(target: SyncTarget) -> (EntityTag, EntityTag) {
    match target {
        SyncTarget::InboxTasks => (EntityTag::InboxTaskCollection, EntityTag::InboxTask),
        SyncTarget::Habits => (EntityTag::HabitCollection, EntityTag::Habit),
        SyncTarget::Chores => (EntityTag::ChoreCollection, EntityTag::Chore),
        SyncTarget::BigPlans => (EntityTag::BigPlanCollection, EntityTag::BigPlan),
        SyncTarget::Metrics => (EntityTag::MetricCollection, EntityTag::Metric),
        SyncTarget::Persons => (EntityTag::PersonCollection, EntityTag::Person),
        SyncTarget::Journals => (EntityTag::JournalCollection, EntityTag::Journal),
        SyncTarget::WorkingMem => (EntityTag::WorkingMemCollection, EntityTag::WorkingMem),
        SyncTarget::SlackTasks => (EntityTag::SlackTaskCollection, EntityTag::SlackTask),
        SyncTarget::EmailTasks => (EntityTag::EmailTaskCollection, EntityTag::EmailTask),
    }
}

/// Use-case service computing workspace stats.
pub struct StatsService<'s> {
    store: &'s mut Store,
}

impl<'s> StatsService<'s> {
    pub fn new(store: &'s mut Store) -> Self {
        Self { store }
    }

    /// Counts live, completed and archived entities per target.
    ///
    /// Completed counts cover live entities only; archived ones are counted
    /// once, under `archived`.
    pub fn run(
        &mut self,
        ctx: &DomainContext,
        workspace_ref_id: EntityId,
        today: Date,
        targets: &[SyncTarget],
    ) -> ServiceResult<Entity<StatsLogEntry>> {
        let targets_in_order = ordered_targets(targets, &SyncTarget::ALL);
        let uow = self.store.unit_of_work()?;
        let (workspace, _) = load_workspace(&uow, workspace_ref_id)?;
        check_targets(&workspace.data, targets, &SyncTarget::ALL)?;
        let stats_log = load_trunk::<StatsLog>(&uow, workspace_ref_id)?;
        let repo = uow.entities::<StatsLogEntry>();
        let entry = repo.create(Entity::new(
            Some(stats_log.ref_id),
            StatsLogEntry::open(ctx.event_source, today, targets_in_order.clone()),
            ctx,
        ))?;

        let mut stats = Vec::with_capacity(targets_in_order.len());
        let mut records = Vec::with_capacity(targets_in_order.len());
        for target in &targets_in_order {
            let (trunk_tag, leaf_tag) = target_tags(*target);
            let trunk = uow.raw(trunk_tag).load_by_parent(workspace_ref_id)?;
            let mut counts = TargetStats {
                target: *target,
                live: 0,
                completed: 0,
                archived: 0,
            };
            for leaf in uow.raw(leaf_tag).find_all(trunk.ref_id, true, None)? {
                if leaf.archived {
                    counts.archived += 1;
                } else {
                    counts.live += 1;
                    if is_completed_payload(leaf_tag, &leaf.data) {
                        counts.completed += 1;
                    }
                }
            }
            info!(
                "event=stats_run module=service status=ok target={} live={} completed={} archived={}",
                target, counts.live, counts.completed, counts.archived
            );
            records.push(raw_summary(trunk_tag, &trunk));
            stats.push(counts);
        }

        let entry = repo.save(entry.modify(ctx, EventKind::Closed, |data| {
            data.stats = stats;
            data.entity_records = records;
            data.closed = true;
        }))?;
        uow.commit()?;
        info!(
            "event=stats_run module=service status=ok workspace_ref_id={} targets={}",
            workspace_ref_id,
            entry.data.targets.len()
        );
        Ok(entry)
    }
}
