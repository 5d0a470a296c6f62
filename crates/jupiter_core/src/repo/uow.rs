//! Store handle and unit-of-work boundary.
//!
//! # Responsibility
//! - Own the SQLite connection for one process or test.
//! - Hand out per-kind repositories bound to one transaction.
//!
//! # Invariants
//! - A unit of work commits all its writes or none; dropping it without
//!   `commit` rolls back.
//! - Transactions start `IMMEDIATE` so two writers never interleave.

use crate::context::DomainContext;
use crate::db::{open_db, open_db_in_memory};
use crate::model::entity::{ArchivalReason, EntityId, EntityKind, EntityTag};
use crate::repo::cascade::{self, CascadeOutcome};
use crate::repo::entity_repo::{RawEntityRepository, SqliteEntityRepository};
use crate::repo::score_repo::SqliteScoreRecordRepository;
use crate::repo::StoreResult;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Starts a transactional unit of work.
    pub fn unit_of_work(&mut self) -> StoreResult<UnitOfWork<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(UnitOfWork { tx })
    }
}

pub struct UnitOfWork<'conn> {
    tx: Transaction<'conn>,
}

impl UnitOfWork<'_> {
    pub fn entities<T: EntityKind>(&self) -> SqliteEntityRepository<'_, T> {
        SqliteEntityRepository::new(&self.tx)
    }

    pub fn raw(&self, tag: EntityTag) -> RawEntityRepository<'_> {
        RawEntityRepository::new(&self.tx, tag)
    }

    pub fn score_records(&self) -> SqliteScoreRecordRepository<'_> {
        SqliteScoreRecordRepository::new(&self.tx)
    }

    pub fn archive_cascade(
        &self,
        tag: EntityTag,
        ref_id: EntityId,
        reason: ArchivalReason,
        ctx: &DomainContext,
    ) -> StoreResult<CascadeOutcome> {
        cascade::archive_cascade(&self.tx, tag, ref_id, reason, ctx)
    }

    pub fn remove_cascade(&self, tag: EntityTag, ref_id: EntityId) -> StoreResult<CascadeOutcome> {
        cascade::remove_cascade(&self.tx, tag, ref_id)
    }

    pub fn check_safe_to_archive(&self, tag: EntityTag, ref_id: EntityId) -> StoreResult<()> {
        cascade::check_safe_to_archive(&self.tx, tag, ref_id)
    }

    pub fn commit(self) -> StoreResult<()> {
        self.tx.commit()?;
        Ok(())
    }
}
