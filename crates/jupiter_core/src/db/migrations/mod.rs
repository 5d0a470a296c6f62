//! Ordered schema steps for the entity store.
//!
//! - `0001_init`: entity rows, their event history and the score tables.
//! - `0002_inbox_task_lookup`: expression index on the inbox task source
//!   entity and a modification-time index used by garbage collection.
//!
//! Each step commits in its own transaction together with its
//! `user_version` bump, so a failed step leaves the store at the last good
//! version and the next open resumes from there.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "init",
        sql: include_str!("0001_init.sql"),
    },
    Migration {
        version: 2,
        name: "inbox_task_lookup",
        sql: include_str!("0002_inbox_task_lookup.sql"),
    },
];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Brings `conn` up to [`latest_version`].
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    run_steps(conn, MIGRATIONS)
}

fn run_steps(conn: &mut Connection, steps: &[Migration]) -> DbResult<()> {
    let from_version = current_user_version(conn)?;
    let target = steps.last().map_or(0, |step| step.version);
    if from_version > target {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: target,
        });
    }

    for step in steps.iter().filter(|step| step.version > from_version) {
        apply_step(conn, step).map_err(|source| {
            error!(
                "event=db_migrate module=db status=error version={} name={} error={}",
                step.version, step.name, source
            );
            DbError::MigrationFailed {
                version: step.version,
                name: step.name,
                source,
            }
        })?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    Ok(())
}

fn apply_step(conn: &mut Connection, step: &Migration) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(step.sql)?;
    tx.pragma_update(None, "user_version", step.version)?;
    tx.commit()
}

/// Schema version recorded in the store file.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::{current_user_version, run_steps, Migration, MIGRATIONS};
    use crate::db::DbError;
    use rusqlite::Connection;

    #[test]
    fn versions_start_at_one_and_increase_by_one() {
        for (index, step) in MIGRATIONS.iter().enumerate() {
            assert_eq!(step.version as usize, index + 1, "{}", step.name);
        }
    }

    #[test]
    fn failed_step_keeps_earlier_steps_committed() {
        let mut conn = Connection::open_in_memory().unwrap();
        let steps = [
            Migration {
                version: 1,
                name: "marker",
                sql: "CREATE TABLE marker (id INTEGER);",
            },
            Migration {
                version: 2,
                name: "broken",
                sql: "CREATE TABLE marker (id INTEGER);",
            },
        ];

        let err = run_steps(&mut conn, &steps).unwrap_err();

        assert!(matches!(
            err,
            DbError::MigrationFailed { version: 2, name: "broken", .. }
        ));
        assert_eq!(current_user_version(&conn).unwrap(), 1);
        run_steps(&mut conn, &steps[..1]).unwrap();
        assert_eq!(current_user_version(&conn).unwrap(), 1);
    }
}
