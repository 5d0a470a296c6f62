//! Declarative ownership links between entity kinds.
//!
//! # Responsibility
//! - Describe, per entity kind, which other entities it owns, contains or
//!   is referenced by.
//! - Feed the generic archiver and remover in `repo::cascade`.
//!
//! # Invariants
//! - Every `parent_tag` relation of [`EntityTag`] appears as an
//!   `OwnsOne`/`OwnsMany` link keyed by [`LinkKey::Parent`].
//! - Field keys name top-level payload fields holding an owner `ref_id`.

use crate::model::entity::EntityTag;
use serde_json::Value;

/// How a linked entity points back at its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKey {
    /// Envelope `parent_ref_id`.
    Parent,
    /// Payload field holding the owner `ref_id`.
    Field(&'static str),
}

/// Which contained entities archival reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeScope {
    /// Only entities that are not completed yet.
    InFlight,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipLink {
    /// Exactly one owned child; archived and removed with the owner.
    OwnsOne { tag: EntityTag, key: LinkKey },
    /// Owned children; archived and removed with the owner.
    OwnsMany { tag: EntityTag, key: LinkKey },
    /// Derived children; archived within `scope`, removed with the owner.
    ContainsMany {
        tag: EntityTag,
        key: LinkKey,
        scope: CascadeScope,
    },
    /// Referrers; the owner cannot be archived or removed while they exist.
    RefsMany { tag: EntityTag, key: LinkKey },
}

impl OwnershipLink {
    pub fn tag(&self) -> EntityTag {
        match self {
            Self::OwnsOne { tag, .. }
            | Self::OwnsMany { tag, .. }
            | Self::ContainsMany { tag, .. }
            | Self::RefsMany { tag, .. } => *tag,
        }
    }

    pub fn key(&self) -> LinkKey {
        match self {
            Self::OwnsOne { key, .. }
            | Self::OwnsMany { key, .. }
            | Self::ContainsMany { key, .. }
            | Self::RefsMany { key, .. } => *key,
        }
    }
}

const SOURCE_ENTITY: LinkKey = LinkKey::Field("source_entity_ref_id");

const fn owns_one(tag: EntityTag) -> OwnershipLink {
    OwnershipLink::OwnsOne {
        tag,
        key: LinkKey::Parent,
    }
}

const fn owns_many(tag: EntityTag) -> OwnershipLink {
    OwnershipLink::OwnsMany {
        tag,
        key: LinkKey::Parent,
    }
}

const fn note() -> OwnershipLink {
    OwnershipLink::OwnsOne {
        tag: EntityTag::Note,
        key: SOURCE_ENTITY,
    }
}

const fn tasks(scope: CascadeScope) -> OwnershipLink {
    OwnershipLink::ContainsMany {
        tag: EntityTag::InboxTask,
        key: SOURCE_ENTITY,
        scope,
    }
}

const fn project_referrer(tag: EntityTag) -> OwnershipLink {
    OwnershipLink::RefsMany {
        tag,
        key: LinkKey::Field("project_ref_id"),
    }
}

const USER_LINKS: &[OwnershipLink] = &[owns_one(EntityTag::ScoreLog)];
const SCORE_LOG_LINKS: &[OwnershipLink] = &[owns_many(EntityTag::ScoreLogEntry)];

const WORKSPACE_LINKS: &[OwnershipLink] = &[
    owns_one(EntityTag::ProjectCollection),
    owns_one(EntityTag::InboxTaskCollection),
    owns_one(EntityTag::HabitCollection),
    owns_one(EntityTag::ChoreCollection),
    owns_one(EntityTag::MetricCollection),
    owns_one(EntityTag::PersonCollection),
    owns_one(EntityTag::BigPlanCollection),
    owns_one(EntityTag::VacationCollection),
    owns_one(EntityTag::WorkingMemCollection),
    owns_one(EntityTag::JournalCollection),
    owns_one(EntityTag::NoteCollection),
    owns_one(EntityTag::SlackTaskCollection),
    owns_one(EntityTag::EmailTaskCollection),
    owns_one(EntityTag::GcLog),
    owns_one(EntityTag::GenLog),
    owns_one(EntityTag::StatsLog),
];

const PROJECT_COLLECTION_LINKS: &[OwnershipLink] = &[owns_many(EntityTag::Project)];
const INBOX_TASK_COLLECTION_LINKS: &[OwnershipLink] = &[owns_many(EntityTag::InboxTask)];
const HABIT_COLLECTION_LINKS: &[OwnershipLink] = &[owns_many(EntityTag::Habit)];
const CHORE_COLLECTION_LINKS: &[OwnershipLink] = &[owns_many(EntityTag::Chore)];
const METRIC_COLLECTION_LINKS: &[OwnershipLink] = &[owns_many(EntityTag::Metric)];
const PERSON_COLLECTION_LINKS: &[OwnershipLink] = &[owns_many(EntityTag::Person)];
const BIG_PLAN_COLLECTION_LINKS: &[OwnershipLink] = &[owns_many(EntityTag::BigPlan)];
const VACATION_COLLECTION_LINKS: &[OwnershipLink] = &[owns_many(EntityTag::Vacation)];
const WORKING_MEM_COLLECTION_LINKS: &[OwnershipLink] = &[owns_many(EntityTag::WorkingMem)];
const JOURNAL_COLLECTION_LINKS: &[OwnershipLink] = &[owns_many(EntityTag::Journal)];
const NOTE_COLLECTION_LINKS: &[OwnershipLink] = &[owns_many(EntityTag::Note)];
const SLACK_TASK_COLLECTION_LINKS: &[OwnershipLink] = &[owns_many(EntityTag::SlackTask)];
const EMAIL_TASK_COLLECTION_LINKS: &[OwnershipLink] = &[owns_many(EntityTag::EmailTask)];
const GC_LOG_LINKS: &[OwnershipLink] = &[owns_many(EntityTag::GcLogEntry)];
const GEN_LOG_LINKS: &[OwnershipLink] = &[owns_many(EntityTag::GenLogEntry)];
const STATS_LOG_LINKS: &[OwnershipLink] = &[owns_many(EntityTag::StatsLogEntry)];

const PROJECT_LINKS: &[OwnershipLink] = &[
    project_referrer(EntityTag::InboxTask),
    project_referrer(EntityTag::Habit),
    project_referrer(EntityTag::Chore),
    project_referrer(EntityTag::BigPlan),
    OwnershipLink::RefsMany {
        tag: EntityTag::Project,
        key: LinkKey::Field("parent_project_ref_id"),
    },
];

const HABIT_LINKS: &[OwnershipLink] = &[tasks(CascadeScope::InFlight)];
const CHORE_LINKS: &[OwnershipLink] = &[tasks(CascadeScope::InFlight)];
const METRIC_LINKS: &[OwnershipLink] = &[
    owns_many(EntityTag::MetricEntry),
    tasks(CascadeScope::InFlight),
];
const PERSON_LINKS: &[OwnershipLink] = &[tasks(CascadeScope::InFlight)];
const BIG_PLAN_LINKS: &[OwnershipLink] = &[tasks(CascadeScope::All)];
const WORKING_MEM_LINKS: &[OwnershipLink] = &[note(), tasks(CascadeScope::All)];
const JOURNAL_LINKS: &[OwnershipLink] = &[note(), tasks(CascadeScope::All)];
const PUSH_TASK_LINKS: &[OwnershipLink] = &[tasks(CascadeScope::All)];

/// Links declared by `tag`, in cascade order.
pub fn links_for(tag: EntityTag) -> &'static [OwnershipLink] {
    match tag {
        EntityTag::User => USER_LINKS,
        EntityTag::ScoreLog => SCORE_LOG_LINKS,
        EntityTag::Workspace => WORKSPACE_LINKS,
        EntityTag::ProjectCollection => PROJECT_COLLECTION_LINKS,
        EntityTag::InboxTaskCollection => INBOX_TASK_COLLECTION_LINKS,
        EntityTag::HabitCollection => HABIT_COLLECTION_LINKS,
        EntityTag::ChoreCollection => CHORE_COLLECTION_LINKS,
        EntityTag::MetricCollection => METRIC_COLLECTION_LINKS,
        EntityTag::PersonCollection => PERSON_COLLECTION_LINKS,
        EntityTag::BigPlanCollection => BIG_PLAN_COLLECTION_LINKS,
        EntityTag::VacationCollection => VACATION_COLLECTION_LINKS,
        EntityTag::WorkingMemCollection => WORKING_MEM_COLLECTION_LINKS,
        EntityTag::JournalCollection => JOURNAL_COLLECTION_LINKS,
        EntityTag::NoteCollection => NOTE_COLLECTION_LINKS,
        EntityTag::SlackTaskCollection => SLACK_TASK_COLLECTION_LINKS,
        EntityTag::EmailTaskCollection => EMAIL_TASK_COLLECTION_LINKS,
        EntityTag::GcLog => GC_LOG_LINKS,
        EntityTag::GenLog => GEN_LOG_LINKS,
        EntityTag::StatsLog => STATS_LOG_LINKS,
        EntityTag::Project => PROJECT_LINKS,
        EntityTag::Habit => HABIT_LINKS,
        EntityTag::Chore => CHORE_LINKS,
        EntityTag::Metric => METRIC_LINKS,
        EntityTag::Person => PERSON_LINKS,
        EntityTag::BigPlan => BIG_PLAN_LINKS,
        EntityTag::WorkingMem => WORKING_MEM_LINKS,
        EntityTag::Journal => JOURNAL_LINKS,
        EntityTag::SlackTask | EntityTag::EmailTask => PUSH_TASK_LINKS,
        EntityTag::InboxTask
        | EntityTag::MetricEntry
        | EntityTag::ScoreLogEntry
        | EntityTag::Vacation
        | EntityTag::Note
        | EntityTag::GcLogEntry
        | EntityTag::GenLogEntry
        | EntityTag::StatsLogEntry => &[],
    }
}

/// Whether a raw payload of `tag` describes finished work.
///
/// Only inbox tasks and big plans have a completion state.
pub fn is_completed_payload(tag: EntityTag, payload: &Value) -> bool {
    match tag {
        EntityTag::InboxTask | EntityTag::BigPlan => matches!(
            payload.get("status").and_then(Value::as_str),
            Some("done") | Some("not_done")
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{is_completed_payload, links_for, LinkKey, OwnershipLink};
    use crate::model::entity::EntityTag;
    use serde_json::json;

    const TAGS: &[EntityTag] = &[
        EntityTag::ScoreLog,
        EntityTag::ScoreLogEntry,
        EntityTag::ProjectCollection,
        EntityTag::Project,
        EntityTag::InboxTask,
        EntityTag::Habit,
        EntityTag::Metric,
        EntityTag::MetricEntry,
        EntityTag::WorkingMem,
        EntityTag::Journal,
        EntityTag::SlackTask,
        EntityTag::GenLogEntry,
        EntityTag::StatsLog,
    ];

    #[test]
    fn every_parent_owns_its_children() {
        for tag in TAGS {
            let Some(parent) = tag.parent_tag() else {
                continue;
            };
            let owned = links_for(parent).iter().any(|link| {
                matches!(
                    link,
                    OwnershipLink::OwnsOne { tag: child, key: LinkKey::Parent }
                        | OwnershipLink::OwnsMany { tag: child, key: LinkKey::Parent }
                        if child == tag
                )
            });
            assert!(owned, "{parent} does not own {tag}");
        }
    }

    #[test]
    fn completion_reads_status_field() {
        assert!(is_completed_payload(EntityTag::InboxTask, &json!({"status": "done"})));
        assert!(!is_completed_payload(EntityTag::InboxTask, &json!({"status": "recurring"})));
        assert!(!is_completed_payload(EntityTag::Habit, &json!({"status": "done"})));
    }

    #[test]
    fn notes_hang_off_working_mem_and_journal_only() {
        let owners: Vec<EntityTag> = TAGS
            .iter()
            .copied()
            .filter(|tag| {
                links_for(*tag).iter().any(|link| {
                    matches!(link, OwnershipLink::OwnsOne { tag: EntityTag::Note, .. })
                })
            })
            .collect();
        assert_eq!(owners, vec![EntityTag::WorkingMem, EntityTag::Journal]);
    }
}
