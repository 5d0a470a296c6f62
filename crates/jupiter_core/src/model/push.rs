//! Push integrations: Slack messages and emails turned into inbox tasks.

use crate::model::entity::{EntityId, EntityKind, EntityTag};
use crate::model::validation::{normalize_name, InputValidationError, ValidationResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackTaskCollection {
    pub generation_project_ref_id: EntityId,
}

impl EntityKind for SlackTaskCollection {
    const TAG: EntityTag = EntityTag::SlackTaskCollection;

    fn snippet(&self) -> String {
        "slack tasks".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackTask {
    pub user: String,
    pub channel: Option<String>,
    pub message: String,
}

impl SlackTask {
    pub fn new(user: &str, channel: Option<&str>, message: &str) -> ValidationResult<Self> {
        let message = message.trim();
        if message.is_empty() {
            return Err(InputValidationError::new("message", "must not be empty"));
        }
        Ok(Self {
            user: normalize_name("user", user)?,
            channel: channel.map(str::trim).filter(|c| !c.is_empty()).map(str::to_string),
            message: message.to_string(),
        })
    }

    /// Name of the inbox task raised for this message.
    pub fn task_name(&self) -> String {
        match &self.channel {
            Some(channel) => format!("Respond to {} on channel {channel}", self.user),
            None => format!("Respond to {}", self.user),
        }
    }
}

impl EntityKind for SlackTask {
    const TAG: EntityTag = EntityTag::SlackTask;

    fn snippet(&self) -> String {
        self.task_name()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTaskCollection {
    pub generation_project_ref_id: EntityId,
}

impl EntityKind for EmailTaskCollection {
    const TAG: EntityTag = EntityTag::EmailTaskCollection;

    fn snippet(&self) -> String {
        "email tasks".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTask {
    pub from_address: String,
    pub from_name: String,
    pub subject: String,
    pub body: String,
}

impl EmailTask {
    pub fn new(from_address: &str, from_name: &str, subject: &str, body: &str) -> ValidationResult<Self> {
        let from_address = from_address.trim();
        if !from_address.contains('@') {
            return Err(InputValidationError::new("from_address", "must contain `@`"));
        }
        Ok(Self {
            from_address: from_address.to_string(),
            from_name: normalize_name("from_name", from_name)?,
            subject: normalize_name("subject", subject)?,
            body: body.to_string(),
        })
    }

    pub fn task_name(&self) -> String {
        format!("Respond to message from {} about {}", self.from_name, self.subject)
    }
}

impl EntityKind for EmailTask {
    const TAG: EntityTag = EntityTag::EmailTask;

    fn snippet(&self) -> String {
        self.task_name()
    }
}
