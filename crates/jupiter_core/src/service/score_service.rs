//! Gamification scores for completed inbox tasks and big plans.
//!
//! # Responsibility
//! - Append one `ScoreLogEntry` per completed task or plan.
//! - Keep `ScoreStats` and `ScorePeriodBest` in sync with the entries.
//!
//! # Invariants
//! - Recording is idempotent per `(source, source_ref_id)`: a task that is
//!   completed, reopened and completed again scores once.
//! - Recording touches only the windows containing the new entry; the
//!   resulting rows equal a full rebuild from live entries.
//! - A period best only counts entries inside its outer window, so a
//!   week straddling a month boundary is clipped to that month.
//! - An entry counts on the local date it was recorded.

use crate::context::DomainContext;
use crate::model::big_plan::{BigPlan, BigPlanStatus};
use crate::model::collections::ScoreLog;
use crate::model::entity::{Entity, EntityId};
use crate::model::inbox_task::{InboxTask, InboxTaskStatus};
use crate::model::score::{
    ScoreLogEntry, ScorePeriodBest, ScoreSource, ScoreStats, LIFETIME_TIMELINE,
};
use crate::model::workspace::Workspace;
use crate::repo::{
    EntityRepository, FieldFilter, SqliteScoreRecordRepository, Store, UnitOfWork,
};
use crate::schedule::{local_date, RecurringTaskPeriod, Schedule};
use crate::service::{load_workspace, ServiceResult};
use jiff::civil::Date;
use jiff::tz::TimeZone;
use jiff::Timestamp;
use log::info;
use std::collections::BTreeMap;

/// Records the outcome of a task that just reached a completed status.
///
/// Returns `None` when the task is not completed or already scored.
pub fn record_inbox_task(
    uow: &UnitOfWork<'_>,
    ctx: &DomainContext,
    workspace: &Workspace,
    timezone: &TimeZone,
    task: &Entity<InboxTask>,
) -> ServiceResult<Option<Entity<ScoreLogEntry>>> {
    if !task.data.is_completed() {
        return Ok(None);
    }
    let entry = ScoreLogEntry::for_inbox_task(
        task.ref_id,
        &task.data.name,
        task.data.status == InboxTaskStatus::Done,
        task.data.difficulty,
    );
    record(uow, ctx, workspace.user_ref_id, timezone, entry)
}

/// Big plan counterpart of [`record_inbox_task`].
pub fn record_big_plan(
    uow: &UnitOfWork<'_>,
    ctx: &DomainContext,
    workspace: &Workspace,
    timezone: &TimeZone,
    plan: &Entity<BigPlan>,
) -> ServiceResult<Option<Entity<ScoreLogEntry>>> {
    if !plan.data.status.is_completed() {
        return Ok(None);
    }
    let entry = ScoreLogEntry::for_big_plan(
        plan.ref_id,
        &plan.data.name,
        plan.data.status == BigPlanStatus::Done,
    );
    record(uow, ctx, workspace.user_ref_id, timezone, entry)
}

fn record(
    uow: &UnitOfWork<'_>,
    ctx: &DomainContext,
    user_ref_id: EntityId,
    timezone: &TimeZone,
    entry: ScoreLogEntry,
) -> ServiceResult<Option<Entity<ScoreLogEntry>>> {
    let score_log = uow.entities::<ScoreLog>().load_by_parent(user_ref_id)?;
    let repo = uow.entities::<ScoreLogEntry>();
    let filters = [
        FieldFilter::of("source", &[entry.source])?,
        FieldFilter::ref_ids("source_ref_id", &[entry.source_ref_id]),
    ];
    if !repo
        .find_all_generic(Some(score_log.ref_id), false, &filters)?
        .is_empty()
    {
        info!(
            "event=score_record module=service status=skipped source={} source_ref_id={}",
            entry.source.as_str(),
            entry.source_ref_id
        );
        return Ok(None);
    }

    let created = repo.create(Entity::new(Some(score_log.ref_id), entry, ctx))?;
    apply_entry(uow, score_log.ref_id, timezone, &created, ctx.action_timestamp)?;
    info!(
        "event=score_record module=service status=ok source={} source_ref_id={} score={}",
        created.data.source.as_str(),
        created.data.source_ref_id,
        created.data.score
    );
    Ok(Some(created))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Totals {
    score: i64,
    inbox_tasks: i64,
    big_plans: i64,
}

impl Totals {
    fn of(stats: &ScoreStats) -> Self {
        Self {
            score: stats.total_score,
            inbox_tasks: stats.inbox_task_cnt,
            big_plans: stats.big_plan_cnt,
        }
    }

    fn add(&mut self, entry: &ScoreLogEntry) {
        self.score += entry.score;
        match entry.source {
            ScoreSource::InboxTask => self.inbox_tasks += 1,
            ScoreSource::BigPlan => self.big_plans += 1,
        }
    }

    fn merge(&mut self, other: Totals) {
        self.score += other.score;
        self.inbox_tasks += other.inbox_tasks;
        self.big_plans += other.big_plans;
    }

    fn is_empty(&self) -> bool {
        self.inbox_tasks == 0 && self.big_plans == 0
    }

    fn stats(
        self,
        score_log_ref_id: EntityId,
        period: Option<RecurringTaskPeriod>,
        timeline: String,
    ) -> ScoreStats {
        ScoreStats {
            score_log_ref_id,
            period,
            timeline,
            total_score: self.score,
            inbox_task_cnt: self.inbox_tasks,
            big_plan_cnt: self.big_plans,
        }
    }

    fn period_best(
        self,
        score_log_ref_id: EntityId,
        (period, timeline): WindowKey,
        sub_period: RecurringTaskPeriod,
    ) -> ScorePeriodBest {
        ScorePeriodBest {
            score_log_ref_id,
            period,
            timeline,
            sub_period,
            total_score: self.score,
            inbox_task_cnt: self.inbox_tasks,
            big_plan_cnt: self.big_plans,
        }
    }
}

type WindowKey = (Option<RecurringTaskPeriod>, String);

/// First sub-window with the highest score; later ties do not replace it.
fn strongest(sub_windows: impl IntoIterator<Item = Totals>) -> Option<Totals> {
    sub_windows.into_iter().fold(None, |best, totals| match best {
        Some(current) if current.score >= totals.score => Some(current),
        _ => Some(totals),
    })
}

/// Folds one new entry into the windows that contain it.
fn apply_entry(
    uow: &UnitOfWork<'_>,
    score_log_ref_id: EntityId,
    timezone: &TimeZone,
    entry: &Entity<ScoreLogEntry>,
    now: Timestamp,
) -> ServiceResult<()> {
    let day = local_date(entry.created_time, timezone);
    let records = uow.score_records();
    let windows = enclosing_windows(day);

    for (period, timeline) in &windows {
        let mut totals = records
            .load_stats(score_log_ref_id, timeline)?
            .map(|stats| Totals::of(&stats))
            .unwrap_or_default();
        totals.add(&entry.data);
        records.upsert_stats(&totals.stats(score_log_ref_id, *period, timeline.clone()), now)?;
    }

    for outer in windows {
        for sub_period in sub_periods_of(outer.0) {
            let sub_windows = sub_window_totals(&records, score_log_ref_id, outer.0, day, sub_period)?;
            if let Some(best) = strongest(sub_windows) {
                records.upsert_period_best(
                    &best.period_best(score_log_ref_id, outer.clone(), sub_period),
                    now,
                )?;
            }
        }
    }
    Ok(())
}

/// Non-empty `sub_period` totals inside the `period` window containing
/// `day`, ordered by sub-window timeline.
fn sub_window_totals(
    records: &SqliteScoreRecordRepository<'_>,
    score_log_ref_id: EntityId,
    period: Option<RecurringTaskPeriod>,
    day: Date,
    sub_period: RecurringTaskPeriod,
) -> ServiceResult<Vec<Totals>> {
    let Some(period) = period else {
        return Ok(records
            .find_period_stats(score_log_ref_id, sub_period, None)?
            .iter()
            .map(Totals::of)
            .collect());
    };

    let outer = Schedule::for_period(period, day);
    let mut subs = Vec::new();
    let mut cursor = outer.first_day;
    while cursor <= outer.end_day {
        let sub = Schedule::for_period(sub_period, cursor);
        let next = sub.end_day.tomorrow();
        subs.push(sub);
        match next {
            Ok(next) => cursor = next,
            Err(_) => break,
        }
    }
    subs.sort_by(|left, right| left.timeline.cmp(&right.timeline));
    let (Some(first), Some(last)) = (subs.first(), subs.last()) else {
        return Ok(Vec::new());
    };
    let rows: BTreeMap<String, ScoreStats> = records
        .find_period_stats(score_log_ref_id, sub_period, Some((first.timeline.as_str(), last.timeline.as_str())))?
        .into_iter()
        .map(|stats| (stats.timeline.clone(), stats))
        .collect();

    let mut totals = Vec::new();
    for sub in &subs {
        let sub_totals = if sub.first_day < outer.first_day || sub.end_day > outer.end_day {
            daily_totals(
                records,
                score_log_ref_id,
                sub.first_day.max(outer.first_day),
                sub.end_day.min(outer.end_day),
            )?
        } else {
            rows.get(&sub.timeline).map(Totals::of).unwrap_or_default()
        };
        if !sub_totals.is_empty() {
            totals.push(sub_totals);
        }
    }
    Ok(totals)
}

/// Sum of the daily rows from `first` to `last`; both lie in one year.
fn daily_totals(
    records: &SqliteScoreRecordRepository<'_>,
    score_log_ref_id: EntityId,
    first: Date,
    last: Date,
) -> ServiceResult<Totals> {
    let from = timeline_of(Some(RecurringTaskPeriod::Daily), first);
    let to = timeline_of(Some(RecurringTaskPeriod::Daily), last);
    let mut totals = Totals::default();
    for stats in records.find_period_stats(
        score_log_ref_id,
        RecurringTaskPeriod::Daily,
        Some((from.as_str(), to.as_str())),
    )? {
        totals.merge(Totals::of(&stats));
    }
    Ok(totals)
}

/// Replaces every derived row of `score_log_ref_id` from its live entries.
pub fn rebuild_stats(
    uow: &UnitOfWork<'_>,
    score_log_ref_id: EntityId,
    timezone: &TimeZone,
    now: Timestamp,
) -> ServiceResult<()> {
    let entries = uow
        .entities::<ScoreLogEntry>()
        .find_all(score_log_ref_id, false, None)?;

    let mut windows: BTreeMap<WindowKey, Totals> = BTreeMap::new();
    let mut sub_windows: BTreeMap<(WindowKey, RecurringTaskPeriod, String), Totals> = BTreeMap::new();
    for entry in &entries {
        let day = local_date(entry.created_time, timezone);
        for outer in enclosing_windows(day) {
            windows.entry(outer.clone()).or_default().add(&entry.data);
            for sub_period in sub_periods_of(outer.0) {
                let sub_timeline = Schedule::for_period(sub_period, day).timeline;
                sub_windows
                    .entry((outer.clone(), sub_period, sub_timeline))
                    .or_default()
                    .add(&entry.data);
            }
        }
    }

    let mut grouped: BTreeMap<(WindowKey, RecurringTaskPeriod), Vec<Totals>> = BTreeMap::new();
    for ((outer, sub_period, _), totals) in sub_windows {
        grouped.entry((outer, sub_period)).or_default().push(totals);
    }

    let records = uow.score_records();
    records.clear(score_log_ref_id)?;
    for ((period, timeline), totals) in windows {
        records.upsert_stats(&totals.stats(score_log_ref_id, period, timeline), now)?;
    }
    for ((outer, sub_period), totals) in grouped {
        if let Some(best) = strongest(totals) {
            records.upsert_period_best(&best.period_best(score_log_ref_id, outer, sub_period), now)?;
        }
    }
    Ok(())
}

/// Lifetime plus one window per period, all containing `day`.
fn enclosing_windows(day: Date) -> Vec<WindowKey> {
    let mut windows = vec![(None, LIFETIME_TIMELINE.to_string())];
    windows.extend(
        RecurringTaskPeriod::ALL
            .into_iter()
            .map(|period| (Some(period), Schedule::for_period(period, day).timeline)),
    );
    windows
}

fn sub_periods_of(period: Option<RecurringTaskPeriod>) -> Vec<RecurringTaskPeriod> {
    match period {
        Some(period) => period.sub_periods().collect(),
        None => RecurringTaskPeriod::ALL.to_vec(),
    }
}

/// Use-case service for reading and rebuilding score records.
pub struct ScoreService<'s> {
    store: &'s mut Store,
}

impl<'s> ScoreService<'s> {
    pub fn new(store: &'s mut Store) -> Self {
        Self { store }
    }

    /// Totals of the `period` window containing `day`; lifetime for `None`.
    pub fn stats_for(
        &mut self,
        workspace_ref_id: EntityId,
        period: Option<RecurringTaskPeriod>,
        day: Date,
    ) -> ServiceResult<Option<ScoreStats>> {
        let uow = self.store.unit_of_work()?;
        let (workspace, _) = load_workspace(&uow, workspace_ref_id)?;
        let score_log = uow
            .entities::<ScoreLog>()
            .load_by_parent(workspace.data.user_ref_id)?;
        let timeline = timeline_of(period, day);
        Ok(uow.score_records().load_stats(score_log.ref_id, &timeline)?)
    }

    /// Best `sub_period` total inside the `period` window containing `day`.
    pub fn best_for(
        &mut self,
        workspace_ref_id: EntityId,
        period: Option<RecurringTaskPeriod>,
        day: Date,
        sub_period: RecurringTaskPeriod,
    ) -> ServiceResult<Option<ScorePeriodBest>> {
        let uow = self.store.unit_of_work()?;
        let (workspace, _) = load_workspace(&uow, workspace_ref_id)?;
        let score_log = uow
            .entities::<ScoreLog>()
            .load_by_parent(workspace.data.user_ref_id)?;
        let timeline = timeline_of(period, day);
        Ok(uow
            .score_records()
            .load_period_best(score_log.ref_id, &timeline, sub_period)?)
    }

    /// Recomputes every derived row from the log.
    pub fn rebuild(&mut self, ctx: &DomainContext, workspace_ref_id: EntityId) -> ServiceResult<()> {
        let uow = self.store.unit_of_work()?;
        let (workspace, timezone) = load_workspace(&uow, workspace_ref_id)?;
        let score_log = uow
            .entities::<ScoreLog>()
            .load_by_parent(workspace.data.user_ref_id)?;
        rebuild_stats(&uow, score_log.ref_id, &timezone, ctx.action_timestamp)?;
        uow.commit()?;
        Ok(())
    }
}

fn timeline_of(period: Option<RecurringTaskPeriod>, day: Date) -> String {
    match period {
        Some(period) => Schedule::for_period(period, day).timeline,
        None => LIFETIME_TIMELINE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{enclosing_windows, strongest, sub_periods_of, Totals};
    use crate::schedule::RecurringTaskPeriod;
    use jiff::civil::date;

    #[test]
    fn a_day_sits_in_lifetime_and_one_window_per_period() {
        let windows = enclosing_windows(date(2024, 12, 2));
        let timelines: Vec<&str> = windows.iter().map(|(_, timeline)| timeline.as_str()).collect();
        assert_eq!(
            timelines,
            vec!["lifetime", "2024-D337", "2024-W49", "2024-M12", "2024-Q4", "2024"]
        );
    }

    #[test]
    fn lifetime_tracks_every_sub_period() {
        assert_eq!(sub_periods_of(None).len(), 5);
        assert_eq!(
            sub_periods_of(Some(RecurringTaskPeriod::Monthly)),
            vec![RecurringTaskPeriod::Daily, RecurringTaskPeriod::Weekly]
        );
    }

    #[test]
    fn earliest_sub_window_wins_a_tie() {
        let first = Totals { score: 3, inbox_tasks: 3, big_plans: 0 };
        let tied = Totals { score: 3, inbox_tasks: 1, big_plans: 1 };
        let weaker = Totals { score: -2, inbox_tasks: 1, big_plans: 0 };
        assert_eq!(strongest([weaker, first, tied]), Some(first));
        assert_eq!(strongest(Vec::new()), None);
    }
}
