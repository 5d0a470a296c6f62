mod common;

use common::{ctx_at, Fixture};
use jiff::civil::{date, Date};
use jupiter_core::model::inbox_task::{Eisen, InboxTaskSource, InboxTaskStatus};
use jupiter_core::model::logs::{GenFilters, GenLogEntry};
use jupiter_core::model::person::{PersonBirthday, PersonRelationship};
use jupiter_core::service::chore_service::{ChoreCreate, ChoreService};
use jupiter_core::service::habit_service::HabitService;
use jupiter_core::service::inbox_task_service::InboxTaskService;
use jupiter_core::service::person_service::PersonService;
use jupiter_core::service::vacation_service::VacationService;
use jupiter_core::{
    Entity, GenRequest, GenService, NoOpProgressReporter, RecordingProgressReporter,
    RecurringTaskGenParams, RecurringTaskPeriod, RecurringTaskSkipRule, ServiceError,
    ServiceResult, SyncTarget, WorkspaceFeature, WorkspaceService,
};

fn params(period: RecurringTaskPeriod) -> RecurringTaskGenParams {
    RecurringTaskGenParams::simple(period, Eisen::Regular, None)
}

fn run_gen(fx: &mut Fixture, today: Date, targets: &[SyncTarget]) -> ServiceResult<Entity<GenLogEntry>> {
    let request = GenRequest {
        today,
        targets: targets.to_vec(),
        filters: GenFilters::new(),
        gen_even_if_not_modified: false,
    };
    let workspace_ref_id = fx.workspace_ref_id;
    GenService::new(&mut fx.store, &fx.config).generate(
        &ctx_at(today),
        workspace_ref_id,
        &request,
        &NoOpProgressReporter,
    )
}

fn create_habit(
    fx: &mut Fixture,
    today: Date,
    name: &str,
    gen_params: RecurringTaskGenParams,
    repeats: Option<u32>,
) -> i64 {
    let workspace_ref_id = fx.workspace_ref_id;
    HabitService::new(&mut fx.store)
        .create(&ctx_at(today), workspace_ref_id, name, None, gen_params, repeats)
        .unwrap()
        .ref_id
}

#[test]
fn daily_habit_materializes_one_task_per_day() {
    let today = date(2024, 12, 2);
    let mut fx = Fixture::new(today);
    create_habit(&mut fx, today, "Meditate", params(RecurringTaskPeriod::Daily), None);

    let entry = run_gen(&mut fx, today, &[SyncTarget::Habits]).unwrap();

    assert!(entry.data.closed);
    assert_eq!(entry.data.entity_created_records.len(), 1);
    let tasks = fx.tasks_from(InboxTaskSource::Habit);
    assert_eq!(tasks.len(), 1);
    let task = &tasks[0].data;
    assert_eq!(task.name, "Meditate");
    assert_eq!(task.status, InboxTaskStatus::Recurring);
    assert_eq!(task.recurring_timeline.as_deref(), Some("2024-D337"));
    assert_eq!(task.due_date, Some(today));
    assert_eq!(task.project_ref_id, fx.root_project_ref_id);
}

#[test]
fn rerunning_the_same_day_creates_nothing() {
    let today = date(2024, 12, 2);
    let mut fx = Fixture::new(today);
    create_habit(&mut fx, today, "Meditate", params(RecurringTaskPeriod::Daily), None);

    run_gen(&mut fx, today, &[SyncTarget::Habits]).unwrap();
    let second = run_gen(&mut fx, today, &[SyncTarget::Habits]).unwrap();

    assert!(second.data.entity_created_records.is_empty());
    assert!(second.data.entity_updated_records.is_empty());
    assert_eq!(fx.tasks_from(InboxTaskSource::Habit).len(), 1);
}

#[test]
fn next_window_gets_its_own_instance() {
    let today = date(2024, 12, 2);
    let mut fx = Fixture::new(today);
    create_habit(&mut fx, today, "Meditate", params(RecurringTaskPeriod::Daily), None);

    run_gen(&mut fx, today, &[SyncTarget::Habits]).unwrap();
    run_gen(&mut fx, date(2024, 12, 3), &[SyncTarget::Habits]).unwrap();

    let timelines: Vec<Option<String>> = fx
        .tasks_from(InboxTaskSource::Habit)
        .into_iter()
        .map(|task| task.data.recurring_timeline)
        .collect();
    assert_eq!(
        timelines,
        vec![Some("2024-D337".to_string()), Some("2024-D338".to_string())]
    );
}

#[test]
fn repeats_are_numbered_within_the_window() {
    let today = date(2024, 12, 4);
    let mut fx = Fixture::new(today);
    create_habit(&mut fx, today, "Run", params(RecurringTaskPeriod::Weekly), Some(3));

    run_gen(&mut fx, today, &[SyncTarget::Habits]).unwrap();

    let tasks = fx.tasks_from(InboxTaskSource::Habit);
    let names: Vec<&str> = tasks.iter().map(|task| task.data.name.as_str()).collect();
    assert_eq!(names, vec!["Run [1]", "Run [2]", "Run [3]"]);
    let indexes: Vec<Option<u32>> = tasks
        .iter()
        .map(|task| task.data.recurring_repeat_index)
        .collect();
    assert_eq!(indexes, vec![Some(0), Some(1), Some(2)]);
    assert!(tasks
        .iter()
        .all(|task| task.data.due_date == Some(date(2024, 12, 8))));
}

#[test]
fn skip_rule_drops_windows() {
    let monday = date(2024, 12, 2);
    let mut fx = Fixture::new(monday);
    let mondays_only = params(RecurringTaskPeriod::Daily)
        .with_skip_rule(RecurringTaskSkipRule::custom_daily_rel_weekly(vec![1]).unwrap());
    create_habit(&mut fx, monday, "Plan the week", mondays_only, None);

    run_gen(&mut fx, monday, &[SyncTarget::Habits]).unwrap();
    let tuesday = run_gen(&mut fx, date(2024, 12, 3), &[SyncTarget::Habits]).unwrap();

    assert!(tuesday.data.entity_created_records.is_empty());
    assert_eq!(fx.tasks_from(InboxTaskSource::Habit).len(), 1);
}

#[test]
fn vacation_skips_habits_but_not_must_do_chores() {
    let today = date(2024, 12, 2);
    let mut fx = Fixture::new(today);
    let ctx = ctx_at(today);
    let workspace_ref_id = fx.workspace_ref_id;
    create_habit(&mut fx, today, "Gym", params(RecurringTaskPeriod::Weekly), None);
    ChoreService::new(&mut fx.store)
        .create(
            &ctx,
            workspace_ref_id,
            today,
            &ChoreCreate {
                must_do: true,
                ..ChoreCreate::new("Water plants", params(RecurringTaskPeriod::Weekly))
            },
        )
        .unwrap();
    ChoreService::new(&mut fx.store)
        .create(
            &ctx,
            workspace_ref_id,
            today,
            &ChoreCreate::new("Vacuum", params(RecurringTaskPeriod::Weekly)),
        )
        .unwrap();
    VacationService::new(&mut fx.store)
        .create(&ctx, workspace_ref_id, "Ski trip", date(2024, 12, 1), date(2024, 12, 10))
        .unwrap();

    run_gen(&mut fx, today, &[SyncTarget::Habits, SyncTarget::Chores]).unwrap();

    assert!(fx.tasks_from(InboxTaskSource::Habit).is_empty());
    let chores = fx.tasks_from(InboxTaskSource::Chore);
    assert_eq!(chores.len(), 1);
    assert_eq!(chores[0].data.name, "Water plants");
}

#[test]
fn chore_outside_its_active_range_is_not_generated() {
    let today = date(2024, 12, 2);
    let mut fx = Fixture::new(today);
    let workspace_ref_id = fx.workspace_ref_id;
    ChoreService::new(&mut fx.store)
        .create(
            &ctx_at(today),
            workspace_ref_id,
            today,
            &ChoreCreate {
                start_at_date: Some(date(2025, 1, 1)),
                ..ChoreCreate::new("Renew passport", params(RecurringTaskPeriod::Monthly))
            },
        )
        .unwrap();

    run_gen(&mut fx, today, &[SyncTarget::Chores]).unwrap();
    assert!(fx.tasks_from(InboxTaskSource::Chore).is_empty());

    run_gen(&mut fx, date(2025, 1, 6), &[SyncTarget::Chores]).unwrap();
    let tasks = fx.tasks_from(InboxTaskSource::Chore);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].data.recurring_timeline.as_deref(), Some("2025-M01"));
}

#[test]
fn archived_instances_are_not_recreated() {
    let today = date(2024, 12, 2);
    let mut fx = Fixture::new(today);
    create_habit(&mut fx, today, "Meditate", params(RecurringTaskPeriod::Daily), None);
    run_gen(&mut fx, today, &[SyncTarget::Habits]).unwrap();
    let task_ref_id = fx.tasks_from(InboxTaskSource::Habit)[0].ref_id;
    InboxTaskService::new(&mut fx.store)
        .archive(&ctx_at(today), task_ref_id)
        .unwrap();

    let entry = run_gen(&mut fx, today, &[SyncTarget::Habits]).unwrap();

    assert!(entry.data.entity_created_records.is_empty());
    let tasks = fx.tasks_from(InboxTaskSource::Habit);
    assert_eq!(tasks.len(), 1);
    assert!(tasks[0].archived);
}

#[test]
fn suspended_habits_are_skipped() {
    let today = date(2024, 12, 2);
    let mut fx = Fixture::new(today);
    let habit_ref_id = create_habit(&mut fx, today, "Journal", params(RecurringTaskPeriod::Daily), None);
    HabitService::new(&mut fx.store)
        .suspend(&ctx_at(today), habit_ref_id)
        .unwrap();

    run_gen(&mut fx, today, &[SyncTarget::Habits]).unwrap();

    assert!(fx.tasks_from(InboxTaskSource::Habit).is_empty());
}

#[test]
fn disabled_feature_fails_before_any_write() {
    let today = date(2024, 12, 2);
    let mut fx = Fixture::new(today);
    let workspace_ref_id = fx.workspace_ref_id;
    create_habit(&mut fx, today, "Meditate", params(RecurringTaskPeriod::Daily), None);
    WorkspaceService::new(&mut fx.store)
        .set_feature(&ctx_at(today), workspace_ref_id, WorkspaceFeature::Habits, false)
        .unwrap();

    let err = run_gen(&mut fx, today, &[SyncTarget::Habits]).unwrap_err();

    assert!(matches!(
        err,
        ServiceError::FeatureUnavailable(WorkspaceFeature::Habits)
    ));
    assert!(fx.inbox_tasks().is_empty());
}

#[test]
fn same_inputs_produce_the_same_tasks() {
    fn snapshot() -> Vec<(String, Option<String>, Option<Date>, Option<Date>)> {
        let today = date(2024, 12, 4);
        let mut fx = Fixture::new(today);
        create_habit(&mut fx, today, "Run", params(RecurringTaskPeriod::Weekly), Some(2));
        create_habit(
            &mut fx,
            today,
            "Budget",
            params(RecurringTaskPeriod::Monthly)
                .with_actionable_from(None, Some(25))
                .with_due_at(None, Some(28)),
            None,
        );
        run_gen(&mut fx, today, &[SyncTarget::Habits]).unwrap();
        fx.tasks_from(InboxTaskSource::Habit)
            .into_iter()
            .map(|task| {
                (
                    task.data.name,
                    task.data.recurring_timeline,
                    task.data.actionable_date,
                    task.data.due_date,
                )
            })
            .collect()
    }

    let first = snapshot();
    assert_eq!(first.len(), 3);
    assert_eq!(first, snapshot());
    assert_eq!(
        first[2],
        (
            "Budget".to_string(),
            Some("2024-M12".to_string()),
            Some(date(2024, 12, 25)),
            Some(date(2024, 12, 28)),
        )
    );
}

#[test]
fn birthday_reminder_is_actionable_two_weeks_ahead() {
    let today = date(2024, 12, 2);
    let mut fx = Fixture::new(today);
    let workspace_ref_id = fx.workspace_ref_id;
    PersonService::new(&mut fx.store, &fx.config)
        .create(
            &ctx_at(today),
            workspace_ref_id,
            "Ben",
            PersonRelationship::Friend,
            None,
            Some(PersonBirthday::new(20, 12).unwrap()),
        )
        .unwrap();

    run_gen(&mut fx, today, &[SyncTarget::Persons]).unwrap();

    let tasks = fx.tasks_from(InboxTaskSource::PersonBirthday);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].data.name, "Wish happy birthday to Ben");
    assert_eq!(tasks[0].data.status, InboxTaskStatus::NotStartedGen);
    assert_eq!(tasks[0].data.due_date, Some(date(2024, 12, 20)));
    assert_eq!(tasks[0].data.actionable_date, Some(date(2024, 12, 6)));
    assert!(fx.tasks_from(InboxTaskSource::PersonCatchUp).is_empty());
}

#[test]
fn journals_and_working_mem_bring_their_own_tasks() {
    let today = date(2024, 12, 2);
    let mut fx = Fixture::new(today);
    let reporter = RecordingProgressReporter::default();
    let workspace_ref_id = fx.workspace_ref_id;

    GenService::new(&mut fx.store, &fx.config)
        .generate(
            &ctx_at(today),
            workspace_ref_id,
            &GenRequest::all(today),
            &reporter,
        )
        .unwrap();

    let journal_tasks = fx.tasks_from(InboxTaskSource::JournalWriting);
    assert_eq!(journal_tasks.len(), 1);
    assert_eq!(
        journal_tasks[0].data.name,
        "Write weekly journal entry for 2024-12-02"
    );
    assert_eq!(
        journal_tasks[0].data.recurring_timeline.as_deref(),
        Some("2024-W49")
    );
    let cleanup = fx.tasks_from(InboxTaskSource::WorkingMemCleanup);
    assert_eq!(cleanup.len(), 1);
    assert_eq!(cleanup[0].data.recurring_timeline.as_deref(), Some("2024-D337"));
    assert!(!reporter.created().is_empty());

    let again = run_gen(&mut fx, today, &SyncTarget::GEN).unwrap();
    assert!(again.data.entity_created_records.is_empty());
}

#[test]
fn filters_restrict_the_run_to_listed_templates() {
    let today = date(2024, 12, 2);
    let mut fx = Fixture::new(today);
    let kept = create_habit(&mut fx, today, "Read", params(RecurringTaskPeriod::Daily), None);
    create_habit(&mut fx, today, "Stretch", params(RecurringTaskPeriod::Daily), None);
    let workspace_ref_id = fx.workspace_ref_id;
    let request = GenRequest {
        targets: vec![SyncTarget::Habits],
        filters: GenFilters::from([(SyncTarget::Habits, vec![kept])]),
        ..GenRequest::all(today)
    };

    GenService::new(&mut fx.store, &fx.config)
        .generate(&ctx_at(today), workspace_ref_id, &request, &NoOpProgressReporter)
        .unwrap();

    let tasks = fx.tasks_from(InboxTaskSource::Habit);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].data.source_entity_ref_id, Some(kept));
}
