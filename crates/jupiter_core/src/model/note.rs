//! Free-form notes attached to other entities.

use crate::model::entity::{EntityId, EntityKind, EntityTag};
use crate::model::validation::{normalize_name, ValidationResult};
use serde::{Deserialize, Serialize};

/// Kind of entity a note hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteDomain {
    WorkingMem,
    Journal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub domain: NoteDomain,
    pub source_entity_ref_id: EntityId,
    pub name: String,
    pub content: String,
}

impl Note {
    pub fn new(
        domain: NoteDomain,
        source_entity_ref_id: EntityId,
        name: &str,
        content: impl Into<String>,
    ) -> ValidationResult<Self> {
        Ok(Self {
            domain,
            source_entity_ref_id,
            name: normalize_name("name", name)?,
            content: content.into(),
        })
    }
}

impl EntityKind for Note {
    const TAG: EntityTag = EntityTag::Note;

    fn snippet(&self) -> String {
        self.name.clone()
    }
}
