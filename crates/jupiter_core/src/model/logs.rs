//! Append-only run records for the generator, the garbage collector and
//! stats.
//!
//! # Invariants
//! - An entry is opened before a run does any work and closed only when the
//!   run finishes; entries of aborted runs stay `closed == false`.
//! - Records are only ever appended.

use crate::context::EventSource;
use crate::model::entity::{EntityId, EntityKind, EntitySummary, EntityTag};
use crate::model::workspace::SyncTarget;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-target ref id filters for a generator run. A missing key means
/// "no constraint"; an empty list matches nothing.
pub type GenFilters = BTreeMap<SyncTarget, Vec<EntityId>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenLogEntry {
    pub source: EventSource,
    pub today: Date,
    pub targets: Vec<SyncTarget>,
    pub gen_even_if_not_modified: bool,
    pub filters: GenFilters,
    pub closed: bool,
    pub entity_created_records: Vec<EntitySummary>,
    pub entity_updated_records: Vec<EntitySummary>,
}

impl GenLogEntry {
    pub fn open(
        source: EventSource,
        today: Date,
        targets: Vec<SyncTarget>,
        gen_even_if_not_modified: bool,
        filters: GenFilters,
    ) -> Self {
        Self {
            source,
            today,
            targets,
            gen_even_if_not_modified,
            filters,
            closed: false,
            entity_created_records: Vec::new(),
            entity_updated_records: Vec::new(),
        }
    }
}

impl EntityKind for GenLogEntry {
    const TAG: EntityTag = EntityTag::GenLogEntry;

    fn snippet(&self) -> String {
        format!("gen run for {}", self.today)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcLogEntry {
    pub source: EventSource,
    pub today: Date,
    pub targets: Vec<SyncTarget>,
    pub closed: bool,
    pub entity_records: Vec<EntitySummary>,
}

impl GcLogEntry {
    pub fn open(source: EventSource, today: Date, targets: Vec<SyncTarget>) -> Self {
        Self {
            source,
            today,
            targets,
            closed: false,
            entity_records: Vec::new(),
        }
    }
}

impl EntityKind for GcLogEntry {
    const TAG: EntityTag = EntityTag::GcLogEntry;

    fn snippet(&self) -> String {
        format!("gc run for {}", self.today)
    }
}

/// Entity counts for one target at stats time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetStats {
    pub target: SyncTarget,
    pub live: u64,
    pub completed: u64,
    pub archived: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsLogEntry {
    pub source: EventSource,
    pub today: Date,
    pub targets: Vec<SyncTarget>,
    pub closed: bool,
    pub entity_records: Vec<EntitySummary>,
    pub stats: Vec<TargetStats>,
}

impl StatsLogEntry {
    pub fn open(source: EventSource, today: Date, targets: Vec<SyncTarget>) -> Self {
        Self {
            source,
            today,
            targets,
            closed: false,
            entity_records: Vec::new(),
            stats: Vec::new(),
        }
    }
}

impl EntityKind for StatsLogEntry {
    const TAG: EntityTag = EntityTag::StatsLogEntry;

    fn snippet(&self) -> String {
        format!("stats run for {}", self.today)
    }
}
