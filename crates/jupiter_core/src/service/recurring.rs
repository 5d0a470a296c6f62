//! Uniform view over every entity that stamps out inbox tasks per window.
//!
//! # Responsibility
//! - Derive instance fields (name, project, dates, timeline) from a
//!   template and a schedule window.
//! - Propagate template edits onto live, not completed instances.
//!
//! # Invariants
//! - Instances are keyed by `(source, source_entity_ref_id,
//!   recurring_timeline, recurring_repeat_index)`.
//! - Propagation never touches status, lifecycle timestamps, source
//!   linkage or `recurring_gen_right_now`.

use crate::context::DomainContext;
use crate::model::chore::Chore;
use crate::model::entity::{ArchivalReason, Entity, EntityId, EntitySummary, EventKind};
use crate::model::habit::Habit;
use crate::model::inbox_task::{
    Difficulty, Eisen, InboxTask, InboxTaskSource, InboxTaskStatus, RecurringSlot,
};
use crate::model::journal::{Journal, JournalCollection};
use crate::model::metric::{Metric, MetricCollection};
use crate::model::person::{Person, PersonCollection};
use crate::model::working_mem::{WorkingMem, WorkingMemCollection};
use crate::repo::{EntityRepository, FieldFilter, UnitOfWork};
use crate::schedule::{local_date, RecurringTaskGenParams, RecurringTaskPeriod, Schedule};
use crate::service::{ServiceError, ServiceResult};
use jiff::civil::Date;
use jiff::tz::TimeZone;
use jiff::{Timestamp, ToSpan};
use log::info;

#[derive(Debug, Clone, PartialEq)]
pub struct RecurringTemplate {
    pub source: InboxTaskSource,
    pub ref_id: EntityId,
    /// Instance name before any repeat suffix.
    pub task_name: String,
    pub project_ref_id: EntityId,
    pub gen_params: RecurringTaskGenParams,
    pub repeat_indexes: Vec<Option<u32>>,
    pub last_modified_time: Timestamp,
    pub suspended: bool,
    /// Inclusive start and optional end of the active range (chores).
    pub active_between: Option<(Date, Option<Date>)>,
    /// Windows fully inside a vacation are not materialized.
    pub skip_on_vacation: bool,
    /// Birthday reminders become actionable this many days before due.
    pub actionable_days_before_due: Option<u32>,
    pub initial_status: InboxTaskStatus,
}

impl RecurringTemplate {
    fn base(
        source: InboxTaskSource,
        ref_id: EntityId,
        task_name: String,
        project_ref_id: EntityId,
        gen_params: RecurringTaskGenParams,
        last_modified_time: Timestamp,
    ) -> Self {
        let initial_status = match source {
            InboxTaskSource::Habit | InboxTaskSource::Chore => InboxTaskStatus::Recurring,
            _ => InboxTaskStatus::NotStartedGen,
        };
        Self {
            source,
            ref_id,
            task_name,
            project_ref_id,
            gen_params,
            repeat_indexes: vec![None],
            last_modified_time,
            suspended: false,
            active_between: None,
            skip_on_vacation: false,
            actionable_days_before_due: None,
            initial_status,
        }
    }

    pub fn from_habit(habit: &Entity<Habit>) -> Self {
        Self {
            repeat_indexes: habit.data.repeat_indexes(),
            suspended: habit.data.suspended,
            skip_on_vacation: true,
            ..Self::base(
                InboxTaskSource::Habit,
                habit.ref_id,
                habit.data.name.clone(),
                habit.data.project_ref_id,
                habit.data.gen_params.clone(),
                habit.last_modified_time,
            )
        }
    }

    pub fn from_chore(chore: &Entity<Chore>) -> Self {
        Self {
            suspended: chore.data.suspended,
            active_between: Some((chore.data.start_at_date, chore.data.end_at_date)),
            skip_on_vacation: !chore.data.must_do,
            ..Self::base(
                InboxTaskSource::Chore,
                chore.ref_id,
                chore.data.name.clone(),
                chore.data.project_ref_id,
                chore.data.gen_params.clone(),
                chore.last_modified_time,
            )
        }
    }

    /// `None` when the metric has no collection schedule.
    pub fn from_metric(metric: &Entity<Metric>, collection: &MetricCollection) -> Option<Self> {
        let params = metric.data.collection_params.clone()?;
        Some(Self::base(
            InboxTaskSource::Metric,
            metric.ref_id,
            format!("Collect value for metric {}", metric.data.name),
            collection.collection_project_ref_id,
            params,
            metric.last_modified_time,
        ))
    }

    pub fn person_catch_up(person: &Entity<Person>, collection: &PersonCollection) -> Option<Self> {
        let params = person.data.catch_up_params.clone()?;
        Some(Self::base(
            InboxTaskSource::PersonCatchUp,
            person.ref_id,
            format!("Catch up with {}", person.data.name),
            collection.catch_up_project_ref_id,
            params,
            person.last_modified_time,
        ))
    }

    /// Yearly reminder due on the birthday itself.
    pub fn person_birthday(
        person: &Entity<Person>,
        collection: &PersonCollection,
        preparation_days: u32,
    ) -> Option<Self> {
        let birthday = person.data.birthday?;
        let params = RecurringTaskGenParams::simple(RecurringTaskPeriod::Yearly, Eisen::Regular, None)
            .with_due_at(Some(birthday.month), Some(birthday.day));
        Some(Self {
            actionable_days_before_due: Some(preparation_days),
            ..Self::base(
                InboxTaskSource::PersonBirthday,
                person.ref_id,
                format!("Wish happy birthday to {}", person.data.name),
                collection.catch_up_project_ref_id,
                params,
                person.last_modified_time,
            )
        })
    }

    pub fn journal_writing(journal: &Entity<Journal>, collection: &JournalCollection) -> Self {
        Self::base(
            InboxTaskSource::JournalWriting,
            journal.ref_id,
            format!(
                "Write {} journal entry for {}",
                journal.data.period, journal.data.right_now
            ),
            collection.writing_task_project_ref_id,
            RecurringTaskGenParams::simple(
                journal.data.period,
                collection.writing_task_eisen,
                collection.writing_task_difficulty,
            ),
            journal.last_modified_time,
        )
    }

    pub fn working_mem_cleanup(
        working_mem: &Entity<WorkingMem>,
        collection: &WorkingMemCollection,
    ) -> Self {
        Self::base(
            InboxTaskSource::WorkingMemCleanup,
            working_mem.ref_id,
            format!(
                "{} working_mem.txt for {}",
                working_mem.data.period, working_mem.data.right_now
            ),
            collection.cleanup_project_ref_id,
            RecurringTaskGenParams::simple(
                working_mem.data.period,
                Eisen::Regular,
                Some(Difficulty::Easy),
            ),
            working_mem.last_modified_time,
        )
    }

    /// Window containing `right_now`, with template-specific date rules.
    pub fn schedule(&self, right_now: Date) -> Schedule {
        let mut schedule = Schedule::for_date(&self.gen_params, right_now);
        if let (Some(days), Some(due)) = (self.actionable_days_before_due, schedule.due_date) {
            schedule.actionable_date = due.checked_sub(i64::from(days).days()).ok();
        }
        if let (Some(actionable), Some(due)) = (schedule.actionable_date, schedule.due_date) {
            if actionable > due {
                schedule.actionable_date = Some(due);
            }
        }
        schedule
    }

    /// Whether the template's own active range overlaps the window.
    pub fn is_active_in(&self, schedule: &Schedule) -> bool {
        match self.active_between {
            Some((start, end)) => {
                start <= schedule.end_day && end.map_or(true, |end| schedule.first_day <= end)
            }
            None => true,
        }
    }

    pub fn instance_name(&self, repeat_index: Option<u32>) -> String {
        match repeat_index {
            Some(index) => format!("{} [{}]", self.task_name, index + 1),
            None => self.task_name.clone(),
        }
    }

    /// Fresh instance for one slot of `schedule`.
    pub fn new_instance(
        &self,
        schedule: &Schedule,
        repeat_index: Option<u32>,
        timezone: &TimeZone,
        now: Timestamp,
    ) -> ServiceResult<InboxTask> {
        let gen_right_now = schedule.window_end_timestamp(timezone).map_err(|err| {
            ServiceError::DomainRuleViolation(format!(
                "window {} has no end in timezone: {err}",
                schedule.timeline
            ))
        })?;
        Ok(InboxTask::new_generated(
            self.source,
            self.ref_id,
            &self.instance_name(repeat_index),
            self.initial_status,
            self.project_ref_id,
            self.gen_params.eisen,
            self.gen_params.difficulty,
            schedule.actionable_date,
            schedule.due_date,
            Some(RecurringSlot {
                timeline: schedule.timeline.clone(),
                repeat_index,
                gen_right_now,
            }),
            now,
        )?)
    }

    /// Instance with template-derived fields rewritten, `None` when unchanged.
    ///
    /// The window is re-derived from the instance anchor so it stays in
    /// the window it was generated for.
    pub fn resynced(&self, task: &InboxTask, timezone: &TimeZone) -> Option<InboxTask> {
        let anchor = task.recurring_gen_right_now?;
        let schedule = self.schedule(local_date(anchor, timezone));
        let mut updated = task.clone();
        updated.name = self.instance_name(task.recurring_repeat_index);
        updated.project_ref_id = self.project_ref_id;
        updated.eisen = self.gen_params.eisen;
        updated.difficulty = self.gen_params.difficulty;
        updated.actionable_date = schedule.actionable_date;
        updated.due_date = schedule.due_date;
        updated.recurring_timeline = Some(schedule.timeline);
        (updated != *task).then_some(updated)
    }
}

/// Inbox tasks generated from `(source, ref_id)`.
pub fn find_instances(
    uow: &UnitOfWork<'_>,
    source: InboxTaskSource,
    ref_id: EntityId,
    allow_archived: bool,
) -> ServiceResult<Vec<Entity<InboxTask>>> {
    let filters = [
        FieldFilter::of("source", &[source])?,
        FieldFilter::ref_ids("source_entity_ref_id", &[ref_id]),
    ];
    Ok(uow
        .entities::<InboxTask>()
        .find_all_generic(None, allow_archived, &filters)?)
}

/// Rewrites every live, not completed instance of `template`.
pub fn propagate(
    uow: &UnitOfWork<'_>,
    ctx: &DomainContext,
    template: &RecurringTemplate,
    timezone: &TimeZone,
) -> ServiceResult<Vec<EntitySummary>> {
    let repo = uow.entities::<InboxTask>();
    let mut updated = Vec::new();
    for task in find_instances(uow, template.source, template.ref_id, false)? {
        if task.data.is_completed() {
            continue;
        }
        let Some(data) = template.resynced(&task.data, timezone) else {
            continue;
        };
        let saved = repo.save(task.modify(ctx, EventKind::RegeneratedFromTemplate, |current| {
            *current = data;
        }))?;
        updated.push(saved.summary());
    }
    info!(
        "event=template_propagate module=service status=ok source={} template_ref_id={} updated={}",
        template.source,
        template.ref_id,
        updated.len()
    );
    Ok(updated)
}

/// Archives live, not completed instances of a schedule that no longer exists.
pub fn retire_in_flight(
    uow: &UnitOfWork<'_>,
    ctx: &DomainContext,
    source: InboxTaskSource,
    ref_id: EntityId,
) -> ServiceResult<Vec<EntitySummary>> {
    let repo = uow.entities::<InboxTask>();
    let mut archived = Vec::new();
    for task in find_instances(uow, source, ref_id, false)? {
        if task.data.is_completed() {
            continue;
        }
        let saved = repo.save(task.mark_archived(ArchivalReason::Cascading, ctx))?;
        archived.push(saved.summary());
    }
    Ok(archived)
}
