//! Record tables for derived score totals.
//!
//! # Invariants
//! - One `score_stats` row per `(score_log, timeline)`.
//! - One `score_period_best` row per `(score_log, timeline, sub_period)`.

use crate::model::entity::EntityId;
use crate::model::score::{ScorePeriodBest, ScoreStats};
use crate::repo::{StoreError, StoreResult};
use crate::schedule::RecurringTaskPeriod;
use jiff::Timestamp;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub struct SqliteScoreRecordRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteScoreRecordRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn upsert_stats(&self, stats: &ScoreStats, now: Timestamp) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO score_stats (
                score_log_ref_id, period, timeline, total_score, inbox_task_cnt, big_plan_cnt,
                created_time, last_modified_time
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            ON CONFLICT (score_log_ref_id, timeline) DO UPDATE SET
                total_score = excluded.total_score,
                inbox_task_cnt = excluded.inbox_task_cnt,
                big_plan_cnt = excluded.big_plan_cnt,
                last_modified_time = excluded.last_modified_time;",
            params![
                stats.score_log_ref_id,
                stats.period.map(RecurringTaskPeriod::as_str),
                stats.timeline,
                stats.total_score,
                stats.inbox_task_cnt,
                stats.big_plan_cnt,
                now.to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn load_stats(
        &self,
        score_log_ref_id: EntityId,
        timeline: &str,
    ) -> StoreResult<Option<ScoreStats>> {
        let row = self
            .conn
            .query_row(
                "SELECT score_log_ref_id, period, timeline, total_score, inbox_task_cnt, big_plan_cnt
                 FROM score_stats
                 WHERE score_log_ref_id = ?1 AND timeline = ?2;",
                params![score_log_ref_id, timeline],
                read_stats_columns,
            )
            .optional()?;
        row.map(stats_from_columns).transpose()
    }

    /// Every stats row of a score log, ordered by timeline.
    pub fn find_stats(&self, score_log_ref_id: EntityId) -> StoreResult<Vec<ScoreStats>> {
        let mut stmt = self.conn.prepare(
            "SELECT score_log_ref_id, period, timeline, total_score, inbox_task_cnt, big_plan_cnt
             FROM score_stats
             WHERE score_log_ref_id = ?1
             ORDER BY timeline ASC;",
        )?;
        let rows = stmt.query_map([score_log_ref_id], read_stats_columns)?;
        let mut stats = Vec::new();
        for row in rows {
            stats.push(stats_from_columns(row?)?);
        }
        Ok(stats)
    }

    /// Stats rows of one `period`, ordered by timeline, optionally bounded
    /// to an inclusive timeline range.
    pub fn find_period_stats(
        &self,
        score_log_ref_id: EntityId,
        period: RecurringTaskPeriod,
        bounds: Option<(&str, &str)>,
    ) -> StoreResult<Vec<ScoreStats>> {
        let (from, to) = bounds.unzip();
        let mut stmt = self.conn.prepare(
            "SELECT score_log_ref_id, period, timeline, total_score, inbox_task_cnt, big_plan_cnt
             FROM score_stats
             WHERE score_log_ref_id = ?1
               AND period = ?2
               AND (?3 IS NULL OR timeline >= ?3)
               AND (?4 IS NULL OR timeline <= ?4)
             ORDER BY timeline ASC;",
        )?;
        let rows = stmt.query_map(
            params![score_log_ref_id, period.as_str(), from, to],
            read_stats_columns,
        )?;
        let mut stats = Vec::new();
        for row in rows {
            stats.push(stats_from_columns(row?)?);
        }
        Ok(stats)
    }

    pub fn upsert_period_best(&self, best: &ScorePeriodBest, now: Timestamp) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO score_period_best (
                score_log_ref_id, period, timeline, sub_period, total_score, inbox_task_cnt,
                big_plan_cnt, created_time, last_modified_time
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            ON CONFLICT (score_log_ref_id, timeline, sub_period) DO UPDATE SET
                total_score = excluded.total_score,
                inbox_task_cnt = excluded.inbox_task_cnt,
                big_plan_cnt = excluded.big_plan_cnt,
                last_modified_time = excluded.last_modified_time;",
            params![
                best.score_log_ref_id,
                best.period.map(RecurringTaskPeriod::as_str),
                best.timeline,
                best.sub_period.as_str(),
                best.total_score,
                best.inbox_task_cnt,
                best.big_plan_cnt,
                now.to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn load_period_best(
        &self,
        score_log_ref_id: EntityId,
        timeline: &str,
        sub_period: RecurringTaskPeriod,
    ) -> StoreResult<Option<ScorePeriodBest>> {
        let mut stmt = self.conn.prepare(
            "SELECT score_log_ref_id, period, timeline, sub_period, total_score, inbox_task_cnt, big_plan_cnt
             FROM score_period_best
             WHERE score_log_ref_id = ?1 AND timeline = ?2 AND sub_period = ?3;",
        )?;
        let mut rows = stmt.query(params![score_log_ref_id, timeline, sub_period.as_str()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_period_best_row(row)?)),
            None => Ok(None),
        }
    }

    /// Drops every derived row of a score log before a rebuild.
    pub fn clear(&self, score_log_ref_id: EntityId) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM score_stats WHERE score_log_ref_id = ?1;",
            [score_log_ref_id],
        )?;
        self.conn.execute(
            "DELETE FROM score_period_best WHERE score_log_ref_id = ?1;",
            [score_log_ref_id],
        )?;
        Ok(())
    }
}

type StatsColumns = (EntityId, Option<String>, String, i64, i64, i64);

fn read_stats_columns(row: &Row<'_>) -> rusqlite::Result<StatsColumns> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn stats_from_columns(columns: StatsColumns) -> StoreResult<ScoreStats> {
    let (score_log_ref_id, period, timeline, total_score, inbox_task_cnt, big_plan_cnt) = columns;
    Ok(ScoreStats {
        score_log_ref_id,
        period: parse_optional_period(period)?,
        timeline,
        total_score,
        inbox_task_cnt,
        big_plan_cnt,
    })
}

fn parse_period_best_row(row: &Row<'_>) -> StoreResult<ScorePeriodBest> {
    let sub_period_text: String = row.get("sub_period")?;
    Ok(ScorePeriodBest {
        score_log_ref_id: row.get("score_log_ref_id")?,
        period: parse_optional_period(row.get("period")?)?,
        timeline: row.get("timeline")?,
        sub_period: parse_period(&sub_period_text)?,
        total_score: row.get("total_score")?,
        inbox_task_cnt: row.get("inbox_task_cnt")?,
        big_plan_cnt: row.get("big_plan_cnt")?,
    })
}

fn parse_optional_period(value: Option<String>) -> StoreResult<Option<RecurringTaskPeriod>> {
    value.as_deref().map(parse_period).transpose()
}

fn parse_period(value: &str) -> StoreResult<RecurringTaskPeriod> {
    RecurringTaskPeriod::parse(value)
        .ok_or_else(|| StoreError::InvalidData(format!("invalid period `{value}` in score records")))
}
