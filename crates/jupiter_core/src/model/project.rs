//! Project hierarchy payload.

use crate::model::entity::{EntityId, EntityKind, EntityTag};
use crate::model::validation::{normalize_name, ValidationResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    /// `None` only for the workspace root project.
    pub parent_project_ref_id: Option<EntityId>,
    /// Display order of direct children.
    pub order_of_child_projects: Vec<EntityId>,
}

impl Project {
    pub fn new(name: &str, parent_project_ref_id: Option<EntityId>) -> ValidationResult<Self> {
        Ok(Self {
            name: normalize_name("name", name)?,
            parent_project_ref_id,
            order_of_child_projects: Vec::new(),
        })
    }

    /// Appends `child` unless already present.
    pub fn add_child(&mut self, child: EntityId) {
        if !self.order_of_child_projects.contains(&child) {
            self.order_of_child_projects.push(child);
        }
    }

    pub fn remove_child(&mut self, child: EntityId) {
        self.order_of_child_projects.retain(|id| *id != child);
    }
}

impl EntityKind for Project {
    const TAG: EntityTag = EntityTag::Project;

    fn snippet(&self) -> String {
        self.name.clone()
    }
}
