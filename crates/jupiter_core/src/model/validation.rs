//! Input validation error shared by model constructors.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Raised at construction time for malformed values.
///
/// Never raised during generation: templates are validated when created or
/// updated, so stored state is always valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputValidationError {
    pub field: &'static str,
    pub message: String,
}

impl InputValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl Display for InputValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid `{}`: {}", self.field, self.message)
    }
}

impl Error for InputValidationError {}

pub type ValidationResult<T> = Result<T, InputValidationError>;

/// Trims a display name and rejects empty values.
pub fn normalize_name(field: &'static str, value: &str) -> ValidationResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(InputValidationError::new(field, "must not be empty"));
    }
    if trimmed.chars().count() > MAX_NAME_CHARS {
        return Err(InputValidationError::new(
            field,
            format!("must be at most {MAX_NAME_CHARS} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

const MAX_NAME_CHARS: usize = 200;
