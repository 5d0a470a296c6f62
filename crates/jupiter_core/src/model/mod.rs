//! Domain model for the recurring-work engine.
//!
//! # Responsibility
//! - Define the entity envelope and every persisted payload type.
//! - Enforce construction-time invariants through `ValidationResult`.
//!
//! # Invariants
//! - Payloads are plain data; persistence concerns live in `repo`.
//! - Every payload implements [`entity::EntityKind`] with a unique tag.

pub mod big_plan;
pub mod chore;
pub mod collections;
pub mod entity;
pub mod habit;
pub mod inbox_task;
pub mod journal;
pub mod links;
pub mod logs;
pub mod metric;
pub mod note;
pub mod person;
pub mod project;
pub mod push;
pub mod score;
pub mod update_action;
pub mod vacation;
pub mod validation;
pub mod working_mem;
pub mod workspace;

pub use validation::InputValidationError;
