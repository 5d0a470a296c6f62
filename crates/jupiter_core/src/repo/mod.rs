//! Entity store: repositories, unit of work and cascading archival.
//!
//! # Responsibility
//! - Persist every entity kind in one generic table with its event log.
//! - Enforce optimistic versioning and parent liveness on writes.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Writes happen inside a [`uow::UnitOfWork`] transaction.
//! - Repository APIs return semantic errors (`NotFound`, `StaleEntity`) in
//!   addition to DB transport errors.

use crate::db::DbError;
use crate::model::entity::{EntityId, EntityTag};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod cascade;
pub mod entity_repo;
pub mod score_repo;
pub mod uow;

pub use cascade::CascadeOutcome;
pub use entity_repo::{EntityRepository, FieldFilter, RawEntityRepository, SqliteEntityRepository};
pub use score_repo::SqliteScoreRecordRepository;
pub use uow::{Store, UnitOfWork};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    NotFound {
        tag: EntityTag,
        ref_id: EntityId,
    },
    /// Incoming version does not match the stored one.
    StaleEntity {
        tag: EntityTag,
        ref_id: EntityId,
        expected: i64,
        actual: i64,
    },
    /// A one-per-parent entity already exists.
    AlreadyExists {
        tag: EntityTag,
        parent_ref_id: Option<EntityId>,
    },
    ParentNotLive {
        tag: EntityTag,
        parent_ref_id: EntityId,
    },
    /// Live referrers block archival or removal.
    StillReferenced {
        tag: EntityTag,
        ref_id: EntityId,
        referrer_tag: EntityTag,
        referrer_ref_id: EntityId,
    },
    InvalidData(String),
    Serialization(serde_json::Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { tag, ref_id } => write!(f, "{tag} not found: {ref_id}"),
            Self::StaleEntity {
                tag,
                ref_id,
                expected,
                actual,
            } => write!(
                f,
                "stale {tag} {ref_id}: stored version is {actual}, write was based on {expected}"
            ),
            Self::AlreadyExists { tag, parent_ref_id } => match parent_ref_id {
                Some(parent) => write!(f, "{tag} already exists under parent {parent}"),
                None => write!(f, "{tag} already exists"),
            },
            Self::ParentNotLive { tag, parent_ref_id } => {
                write!(f, "cannot create {tag} under archived or missing parent {parent_ref_id}")
            }
            Self::StillReferenced {
                tag,
                ref_id,
                referrer_tag,
                referrer_ref_id,
            } => write!(
                f,
                "{tag} {ref_id} is still referenced by {referrer_tag} {referrer_ref_id}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted entity data: {message}"),
            Self::Serialization(err) => write!(f, "payload serialization failed: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}
