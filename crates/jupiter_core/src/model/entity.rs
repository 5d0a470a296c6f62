//! Entity envelope shared by every persisted object.
//!
//! # Responsibility
//! - Carry identity, version, timestamps, archival state and event log.
//! - Provide value-returning mutators that stage one event per change.
//!
//! # Invariants
//! - `ref_id` is assigned by the store and never reused.
//! - `version` equals the stored version; staged events sit above it and
//!   are renumbered consecutively by the store on save.
//! - Loaded entities carry no history in `events`; the store reads it on
//!   demand.
//! - An archived entity always has `archived_time` and `archival_reason`.

use crate::context::{DomainContext, EventSource};
use jiff::Timestamp;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// Stable integer identity assigned by the store.
pub type EntityId = i64;

/// Placeholder identity for entities not yet persisted.
pub const NOT_PERSISTED_REF_ID: EntityId = 0;

/// Structural role of an entity kind in the ownership tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRole {
    /// No parent.
    Root,
    /// One per parent, owns a collection of leaves.
    Trunk,
    /// Owns leaves, itself owned by a trunk.
    Branch,
    /// User-visible item.
    Leaf,
}

/// Tag naming every entity kind known to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityTag {
    User,
    ScoreLog,
    ScoreLogEntry,
    Workspace,
    ProjectCollection,
    Project,
    InboxTaskCollection,
    InboxTask,
    HabitCollection,
    Habit,
    ChoreCollection,
    Chore,
    MetricCollection,
    Metric,
    MetricEntry,
    PersonCollection,
    Person,
    BigPlanCollection,
    BigPlan,
    VacationCollection,
    Vacation,
    WorkingMemCollection,
    WorkingMem,
    JournalCollection,
    Journal,
    NoteCollection,
    Note,
    SlackTaskCollection,
    SlackTask,
    EmailTaskCollection,
    EmailTask,
    GcLog,
    GcLogEntry,
    GenLog,
    GenLogEntry,
    StatsLog,
    StatsLogEntry,
}

const ALL_TAGS: &[EntityTag] = &[
    EntityTag::User,
    EntityTag::ScoreLog,
    EntityTag::ScoreLogEntry,
    EntityTag::Workspace,
    EntityTag::ProjectCollection,
    EntityTag::Project,
    EntityTag::InboxTaskCollection,
    EntityTag::InboxTask,
    EntityTag::HabitCollection,
    EntityTag::Habit,
    EntityTag::ChoreCollection,
    EntityTag::Chore,
    EntityTag::MetricCollection,
    EntityTag::Metric,
    EntityTag::MetricEntry,
    EntityTag::PersonCollection,
    EntityTag::Person,
    EntityTag::BigPlanCollection,
    EntityTag::BigPlan,
    EntityTag::VacationCollection,
    EntityTag::Vacation,
    EntityTag::WorkingMemCollection,
    EntityTag::WorkingMem,
    EntityTag::JournalCollection,
    EntityTag::Journal,
    EntityTag::NoteCollection,
    EntityTag::Note,
    EntityTag::SlackTaskCollection,
    EntityTag::SlackTask,
    EntityTag::EmailTaskCollection,
    EntityTag::EmailTask,
    EntityTag::GcLog,
    EntityTag::GcLogEntry,
    EntityTag::GenLog,
    EntityTag::GenLogEntry,
    EntityTag::StatsLog,
    EntityTag::StatsLogEntry,
];

impl EntityTag {
    /// Stable storage string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::ScoreLog => "score_log",
            Self::ScoreLogEntry => "score_log_entry",
            Self::Workspace => "workspace",
            Self::ProjectCollection => "project_collection",
            Self::Project => "project",
            Self::InboxTaskCollection => "inbox_task_collection",
            Self::InboxTask => "inbox_task",
            Self::HabitCollection => "habit_collection",
            Self::Habit => "habit",
            Self::ChoreCollection => "chore_collection",
            Self::Chore => "chore",
            Self::MetricCollection => "metric_collection",
            Self::Metric => "metric",
            Self::MetricEntry => "metric_entry",
            Self::PersonCollection => "person_collection",
            Self::Person => "person",
            Self::BigPlanCollection => "big_plan_collection",
            Self::BigPlan => "big_plan",
            Self::VacationCollection => "vacation_collection",
            Self::Vacation => "vacation",
            Self::WorkingMemCollection => "working_mem_collection",
            Self::WorkingMem => "working_mem",
            Self::JournalCollection => "journal_collection",
            Self::Journal => "journal",
            Self::NoteCollection => "note_collection",
            Self::Note => "note",
            Self::SlackTaskCollection => "slack_task_collection",
            Self::SlackTask => "slack_task",
            Self::EmailTaskCollection => "email_task_collection",
            Self::EmailTask => "email_task",
            Self::GcLog => "gc_log",
            Self::GcLogEntry => "gc_log_entry",
            Self::GenLog => "gen_log",
            Self::GenLogEntry => "gen_log_entry",
            Self::StatsLog => "stats_log",
            Self::StatsLogEntry => "stats_log_entry",
        }
    }

    /// Parses a stored tag string.
    pub fn parse(value: &str) -> Option<Self> {
        ALL_TAGS.iter().copied().find(|tag| tag.as_str() == value)
    }

    /// Tag of the required parent, `None` for roots.
    pub fn parent_tag(self) -> Option<Self> {
        match self {
            Self::User | Self::Workspace => None,
            Self::ScoreLog => Some(Self::User),
            Self::ScoreLogEntry => Some(Self::ScoreLog),
            Self::ProjectCollection
            | Self::InboxTaskCollection
            | Self::HabitCollection
            | Self::ChoreCollection
            | Self::MetricCollection
            | Self::PersonCollection
            | Self::BigPlanCollection
            | Self::VacationCollection
            | Self::WorkingMemCollection
            | Self::JournalCollection
            | Self::NoteCollection
            | Self::SlackTaskCollection
            | Self::EmailTaskCollection
            | Self::GcLog
            | Self::GenLog
            | Self::StatsLog => Some(Self::Workspace),
            Self::Project => Some(Self::ProjectCollection),
            Self::InboxTask => Some(Self::InboxTaskCollection),
            Self::Habit => Some(Self::HabitCollection),
            Self::Chore => Some(Self::ChoreCollection),
            Self::Metric => Some(Self::MetricCollection),
            Self::MetricEntry => Some(Self::Metric),
            Self::Person => Some(Self::PersonCollection),
            Self::BigPlan => Some(Self::BigPlanCollection),
            Self::Vacation => Some(Self::VacationCollection),
            Self::WorkingMem => Some(Self::WorkingMemCollection),
            Self::Journal => Some(Self::JournalCollection),
            Self::Note => Some(Self::NoteCollection),
            Self::SlackTask => Some(Self::SlackTaskCollection),
            Self::EmailTask => Some(Self::EmailTaskCollection),
            Self::GcLogEntry => Some(Self::GcLog),
            Self::GenLogEntry => Some(Self::GenLog),
            Self::StatsLogEntry => Some(Self::StatsLog),
        }
    }

    /// Structural role derived from the parent chain.
    pub fn role(self) -> EntityRole {
        match self {
            Self::User | Self::Workspace => EntityRole::Root,
            Self::Metric => EntityRole::Branch,
            other => match other.parent_tag() {
                Some(Self::Workspace) | Some(Self::User) => EntityRole::Trunk,
                _ => EntityRole::Leaf,
            },
        }
    }
}

impl Display for EntityTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an entity was archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchivalReason {
    User,
    Gc,
    Cascading,
}

impl ArchivalReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Gc => "gc",
            Self::Cascading => "cascading",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "gc" => Some(Self::Gc),
            "cascading" => Some(Self::Cascading),
            _ => None,
        }
    }
}

/// Kind of change recorded by one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Updated,
    ChangedStatus,
    GeneratedFromTemplate,
    RegeneratedFromTemplate,
    AppendedRecords,
    Closed,
    Archived,
    Restored,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::ChangedStatus => "changed_status",
            Self::GeneratedFromTemplate => "generated_from_template",
            Self::RegeneratedFromTemplate => "regenerated_from_template",
            Self::AppendedRecords => "appended_records",
            Self::Closed => "closed",
            Self::Archived => "archived",
            Self::Restored => "restored",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [
            Self::Created,
            Self::Updated,
            Self::ChangedStatus,
            Self::GeneratedFromTemplate,
            Self::RegeneratedFromTemplate,
            Self::AppendedRecords,
            Self::Closed,
            Self::Archived,
            Self::Restored,
        ]
        .into_iter()
        .find(|kind| kind.as_str() == value)
    }
}

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEvent {
    pub source: EventSource,
    pub timestamp: Timestamp,
    /// Version the entity reaches once this event is persisted.
    pub version: i64,
    pub kind: EventKind,
    /// Payload snapshot after the change.
    pub data: Value,
}

/// Implemented by every payload type the store can persist.
pub trait EntityKind: Clone + Serialize + DeserializeOwned {
    const TAG: EntityTag;

    /// Short human-readable label used in logs and run records.
    fn snippet(&self) -> String;
}

/// Persisted envelope around payload `T`.
///
/// `Entity<serde_json::Value>` is the untyped form used by the generic
/// cascade engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity<T> {
    pub ref_id: EntityId,
    pub parent_ref_id: Option<EntityId>,
    pub version: i64,
    pub created_time: Timestamp,
    pub last_modified_time: Timestamp,
    pub archived: bool,
    pub archived_time: Option<Timestamp>,
    pub archival_reason: Option<ArchivalReason>,
    pub events: Vec<EntityEvent>,
    pub data: T,
}

impl<T: Serialize> Entity<T> {
    /// Builds a not-yet-persisted entity at version 1 with a `Created` event.
    pub fn new(parent_ref_id: Option<EntityId>, data: T, ctx: &DomainContext) -> Self {
        let snapshot = snapshot_of(&data);
        Self {
            ref_id: NOT_PERSISTED_REF_ID,
            parent_ref_id,
            version: 1,
            created_time: ctx.action_timestamp,
            last_modified_time: ctx.action_timestamp,
            archived: false,
            archived_time: None,
            archival_reason: None,
            events: vec![EntityEvent {
                source: ctx.event_source,
                timestamp: ctx.action_timestamp,
                version: 1,
                kind: EventKind::Created,
                data: snapshot,
            }],
            data,
        }
    }

    /// Returns a copy with `f` applied to the payload and one staged event.
    pub fn modify(mut self, ctx: &DomainContext, kind: EventKind, f: impl FnOnce(&mut T)) -> Self {
        f(&mut self.data);
        self.stage_event(ctx, kind);
        self
    }

    /// Soft-deletes this entity.
    pub fn mark_archived(mut self, reason: ArchivalReason, ctx: &DomainContext) -> Self {
        self.archived = true;
        self.archived_time = Some(ctx.action_timestamp);
        self.archival_reason = Some(reason);
        self.stage_event(ctx, EventKind::Archived);
        self
    }

    /// Clears archival state. Children stay archived.
    pub fn restore(mut self, ctx: &DomainContext) -> Self {
        self.archived = false;
        self.archived_time = None;
        self.archival_reason = None;
        self.stage_event(ctx, EventKind::Restored);
        self
    }

    /// Events not yet persisted, i.e. those above the stored version.
    pub fn staged_events(&self) -> impl Iterator<Item = &EntityEvent> {
        let stored = self.version;
        self.events.iter().filter(move |event| event.version > stored)
    }

    fn stage_event(&mut self, ctx: &DomainContext, kind: EventKind) {
        let data = snapshot_of(&self.data);
        self.events.push(EntityEvent {
            source: ctx.event_source,
            timestamp: ctx.action_timestamp,
            version: self.version + 1,
            kind,
            data,
        });
    }
}

impl<T> Entity<T> {
    /// Whether the entity is visible to default queries.
    pub fn is_live(&self) -> bool {
        !self.archived
    }

    /// Whether the store has assigned an identity yet.
    pub fn is_persisted(&self) -> bool {
        self.ref_id != NOT_PERSISTED_REF_ID
    }

    /// Swaps the payload while keeping the envelope.
    pub fn map_data<U>(self, f: impl FnOnce(T) -> U) -> Entity<U> {
        Entity {
            ref_id: self.ref_id,
            parent_ref_id: self.parent_ref_id,
            version: self.version,
            created_time: self.created_time,
            last_modified_time: self.last_modified_time,
            archived: self.archived,
            archived_time: self.archived_time,
            archival_reason: self.archival_reason,
            events: self.events,
            data: f(self.data),
        }
    }

    /// Fallible variant of [`Entity::map_data`].
    pub fn try_map_data<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Entity<U>, E> {
        let Entity {
            ref_id,
            parent_ref_id,
            version,
            created_time,
            last_modified_time,
            archived,
            archived_time,
            archival_reason,
            events,
            data,
        } = self;
        Ok(Entity {
            ref_id,
            parent_ref_id,
            version,
            created_time,
            last_modified_time,
            archived,
            archived_time,
            archival_reason,
            events,
            data: f(data)?,
        })
    }
}

impl<T: EntityKind> Entity<T> {
    /// Summary record for logs and progress reporting.
    pub fn summary(&self) -> EntitySummary {
        EntitySummary {
            entity_tag: T::TAG,
            ref_id: self.ref_id,
            snippet: self.data.snippet(),
        }
    }
}

/// `(entity_tag, ref_id, snippet)` triple stored in run records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub entity_tag: EntityTag,
    pub ref_id: EntityId,
    pub snippet: String,
}

fn snapshot_of<T: Serialize>(data: &T) -> Value {
    serde_json::to_value(data).unwrap_or(Value::Null)
}
