//! Report snapshots attached to journals.
//!
//! # Responsibility
//! - Summarize inbox task outcomes for one period window.
//!
//! # Invariants
//! - Snapshots are plain JSON; journals store them verbatim and never read
//!   them back.

use crate::model::collections::InboxTaskCollection;
use crate::model::entity::{Entity, EntityId};
use crate::model::inbox_task::{InboxTask, InboxTaskStatus};
use crate::repo::{EntityRepository, StoreError, UnitOfWork};
use crate::schedule::{RecurringTaskPeriod, Schedule};
use crate::service::{load_trunk, ServiceResult};
use jiff::civil::Date;
use jiff::tz::TimeZone;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Produces the snapshot stored on a new journal.
pub trait ReportService {
    fn snapshot(
        &self,
        uow: &UnitOfWork<'_>,
        workspace_ref_id: EntityId,
        today: Date,
        period: RecurringTaskPeriod,
        timezone: &TimeZone,
    ) -> ServiceResult<Value>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub done: u64,
    pub not_done: u64,
    /// Live tasks, not completed, due inside the window.
    pub in_flight: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboxTaskReport {
    pub period: RecurringTaskPeriod,
    pub timeline: String,
    pub first_day: Date,
    pub end_day: Date,
    pub total: OutcomeCounts,
    /// Keyed by inbox task source.
    pub per_source: BTreeMap<String, OutcomeCounts>,
}

/// Counts inbox task outcomes whose completion falls in the window.
///
/// Archived tasks still count when they were completed in the window, so a
/// garbage-collected week reports the same as before collection.
#[derive(Debug, Default, Clone, Copy)]
pub struct InboxTaskReportService;

impl InboxTaskReportService {
    pub fn build(
        &self,
        tasks: &[Entity<InboxTask>],
        today: Date,
        period: RecurringTaskPeriod,
        timezone: &TimeZone,
    ) -> InboxTaskReport {
        let schedule = Schedule::for_period(period, today);
        let mut total = OutcomeCounts::default();
        let mut per_source: BTreeMap<String, OutcomeCounts> = BTreeMap::new();
        for task in tasks {
            let counts = per_source
                .entry(task.data.source.as_str().to_string())
                .or_default();
            match (task.data.status, task.data.completed_time) {
                (InboxTaskStatus::Done, Some(time)) if schedule.contains_timestamp(time, timezone) => {
                    counts.done += 1;
                    total.done += 1;
                }
                (InboxTaskStatus::NotDone, Some(time))
                    if schedule.contains_timestamp(time, timezone) =>
                {
                    counts.not_done += 1;
                    total.not_done += 1;
                }
                (status, _)
                    if !status.is_completed()
                        && task.is_live()
                        && task.data.due_date.map_or(false, |due| schedule.contains_date(due)) =>
                {
                    counts.in_flight += 1;
                    total.in_flight += 1;
                }
                _ => {}
            }
        }
        per_source.retain(|_, counts| *counts != OutcomeCounts::default());
        InboxTaskReport {
            period,
            timeline: schedule.timeline,
            first_day: schedule.first_day,
            end_day: schedule.end_day,
            total,
            per_source,
        }
    }
}

impl ReportService for InboxTaskReportService {
    fn snapshot(
        &self,
        uow: &UnitOfWork<'_>,
        workspace_ref_id: EntityId,
        today: Date,
        period: RecurringTaskPeriod,
        timezone: &TimeZone,
    ) -> ServiceResult<Value> {
        let collection = load_trunk::<InboxTaskCollection>(uow, workspace_ref_id)?;
        let tasks = uow
            .entities::<InboxTask>()
            .find_all(collection.ref_id, true, None)?;
        let report = self.build(&tasks, today, period, timezone);
        Ok(serde_json::to_value(&report).map_err(StoreError::from)?)
    }
}

#[cfg(test)]
mod tests {
    use super::InboxTaskReportService;
    use crate::context::{DomainContext, EventSource};
    use crate::model::entity::Entity;
    use crate::model::inbox_task::{Eisen, InboxTask, InboxTaskStatus};
    use crate::schedule::RecurringTaskPeriod;
    use jiff::civil::date;
    use jiff::tz::TimeZone;
    use jiff::Timestamp;

    fn task(name: &str, status: InboxTaskStatus, now: Timestamp) -> Entity<InboxTask> {
        let ctx = DomainContext::new(EventSource::Cli, now);
        let data = InboxTask::new_user(
            name,
            status,
            1,
            Eisen::Regular,
            None,
            None,
            Some(date(2024, 12, 5)),
            now,
        )
        .unwrap();
        Entity::new(Some(1), data, &ctx)
    }

    #[test]
    fn counts_outcomes_inside_the_window() {
        let in_week: Timestamp = "2024-12-03T10:00:00Z".parse().unwrap();
        let last_week: Timestamp = "2024-11-26T10:00:00Z".parse().unwrap();
        let tasks = vec![
            task("a", InboxTaskStatus::Done, in_week),
            task("b", InboxTaskStatus::NotDone, in_week),
            task("c", InboxTaskStatus::Done, last_week),
            task("d", InboxTaskStatus::InProgress, in_week),
        ];

        let report = InboxTaskReportService.build(
            &tasks,
            date(2024, 12, 4),
            RecurringTaskPeriod::Weekly,
            &TimeZone::UTC,
        );

        assert_eq!(report.timeline, "2024-W49");
        assert_eq!(report.total.done, 1);
        assert_eq!(report.total.not_done, 1);
        assert_eq!(report.total.in_flight, 1);
        assert_eq!(report.per_source["user"].done, 1);
    }
}
