//! Trunk entities that carry no settings of their own.
//!
//! Trunks with settings (metric, person, working-mem, journal and push
//! collections) live next to their leaves.

use crate::model::entity::{EntityKind, EntityTag};
use serde::{Deserialize, Serialize};

macro_rules! plain_trunk {
    ($($(#[$meta:meta])* $name:ident => $tag:ident, $label:literal;)+) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
            pub struct $name {}

            impl EntityKind for $name {
                const TAG: EntityTag = EntityTag::$tag;

                fn snippet(&self) -> String {
                    $label.to_string()
                }
            }
        )+
    };
}

plain_trunk! {
    ProjectCollection => ProjectCollection, "projects";
    InboxTaskCollection => InboxTaskCollection, "inbox tasks";
    HabitCollection => HabitCollection, "habits";
    ChoreCollection => ChoreCollection, "chores";
    BigPlanCollection => BigPlanCollection, "big plans";
    VacationCollection => VacationCollection, "vacations";
    NoteCollection => NoteCollection, "notes";
    /// Parent of garbage-collection run records.
    GcLog => GcLog, "gc log";
    /// Parent of generation run records.
    GenLog => GenLog, "gen log";
    StatsLog => StatsLog, "stats log";
    /// Per-user gamification trunk.
    ScoreLog => ScoreLog, "score log";
}
