mod common;

use common::{ctx_at, Fixture};
use jiff::civil::{date, Date};
use jupiter_core::model::inbox_task::{Difficulty, Eisen, InboxTaskSource, InboxTaskStatus};
use jupiter_core::model::logs::GenFilters;
use jupiter_core::model::person::{PersonBirthday, PersonRelationship};
use jupiter_core::model::update_action::UpdateAction;
use jupiter_core::service::chore_service::{ChoreCreate, ChoreService, ChoreUpdate};
use jupiter_core::service::habit_service::{HabitService, HabitUpdate};
use jupiter_core::service::inbox_task_service::{InboxTaskService, InboxTaskUpdate};
use jupiter_core::service::person_service::{PersonService, PersonUpdate};
use jupiter_core::service::project_service::ProjectService;
use jupiter_core::{
    ArchivalReason, EntityId, GenRequest, GenService, NoOpProgressReporter, RecurringTaskGenParams,
    RecurringTaskPeriod, ServiceError, SyncTarget,
};

fn generate(fx: &mut Fixture, today: Date) {
    generate_targets(fx, today, &[SyncTarget::Habits, SyncTarget::Chores]);
}

fn generate_targets(fx: &mut Fixture, today: Date, targets: &[SyncTarget]) {
    let workspace_ref_id = fx.workspace_ref_id;
    let request = GenRequest {
        today,
        targets: targets.to_vec(),
        filters: GenFilters::new(),
        gen_even_if_not_modified: false,
    };
    GenService::new(&mut fx.store, &fx.config)
        .generate(&ctx_at(today), workspace_ref_id, &request, &NoOpProgressReporter)
        .unwrap();
}

fn weekly_habit(fx: &mut Fixture, today: Date, name: &str) -> EntityId {
    let workspace_ref_id = fx.workspace_ref_id;
    HabitService::new(&mut fx.store)
        .create(
            &ctx_at(today),
            workspace_ref_id,
            name,
            None,
            RecurringTaskGenParams::simple(RecurringTaskPeriod::Weekly, Eisen::Regular, None),
            None,
        )
        .unwrap()
        .ref_id
}

#[test]
fn template_edits_reach_in_flight_instances_only() {
    let today = date(2024, 12, 4);
    let mut fx = Fixture::new(today);
    let ctx = ctx_at(today);
    let workspace_ref_id = fx.workspace_ref_id;
    let running = weekly_habit(&mut fx, today, "Run");
    let swim = weekly_habit(&mut fx, today, "Swim");
    generate(&mut fx, today);

    let tasks = fx.tasks_from(InboxTaskSource::Habit);
    let run_task = tasks[0].clone();
    let swim_task = tasks[1].clone();
    InboxTaskService::new(&mut fx.store)
        .change_status(&ctx, workspace_ref_id, run_task.ref_id, InboxTaskStatus::InProgress)
        .unwrap();
    InboxTaskService::new(&mut fx.store)
        .change_status(&ctx, workspace_ref_id, swim_task.ref_id, InboxTaskStatus::Done)
        .unwrap();

    for (ref_id, name) in [(running, "Long run"), (swim, "Long swim")] {
        HabitService::new(&mut fx.store)
            .update(
                &ctx,
                workspace_ref_id,
                ref_id,
                HabitUpdate {
                    name: UpdateAction::change_to(name.to_string()),
                    gen_params: UpdateAction::change_to(RecurringTaskGenParams::simple(
                        RecurringTaskPeriod::Weekly,
                        Eisen::Important,
                        Some(Difficulty::Hard),
                    )),
                    ..HabitUpdate::default()
                },
            )
            .unwrap();
    }

    let tasks = fx.tasks_from(InboxTaskSource::Habit);
    let run_after = &tasks[0];
    assert_eq!(run_after.data.name, "Long run");
    assert_eq!(run_after.data.eisen, Eisen::Important);
    assert_eq!(run_after.data.difficulty, Some(Difficulty::Hard));
    assert_eq!(run_after.data.status, InboxTaskStatus::InProgress);
    assert_eq!(
        run_after.data.recurring_gen_right_now,
        run_task.data.recurring_gen_right_now
    );
    assert_eq!(run_after.data.recurring_timeline.as_deref(), Some("2024-W49"));

    let swim_after = &tasks[1];
    assert_eq!(swim_after.data.name, "Swim");
    assert_eq!(swim_after.data.status, InboxTaskStatus::Done);
}

#[test]
fn chore_due_day_change_moves_the_in_flight_due_date() {
    let today = date(2024, 12, 4);
    let mut fx = Fixture::new(today);
    let ctx = ctx_at(today);
    let workspace_ref_id = fx.workspace_ref_id;
    let params = RecurringTaskGenParams::simple(RecurringTaskPeriod::Monthly, Eisen::Regular, None);
    let chore = ChoreService::new(&mut fx.store)
        .create(
            &ctx,
            workspace_ref_id,
            today,
            &ChoreCreate::new("Pay rent", params.clone()),
        )
        .unwrap();
    generate(&mut fx, today);
    assert_eq!(
        fx.tasks_from(InboxTaskSource::Chore)[0].data.due_date,
        Some(date(2024, 12, 31))
    );

    ChoreService::new(&mut fx.store)
        .update(
            &ctx,
            workspace_ref_id,
            today,
            chore.ref_id,
            ChoreUpdate {
                gen_params: UpdateAction::change_to(params.with_due_at(None, Some(5))),
                ..ChoreUpdate::default()
            },
        )
        .unwrap();

    let tasks = fx.tasks_from(InboxTaskSource::Chore);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].data.due_date, Some(date(2024, 12, 5)));
    assert_eq!(tasks[0].data.status, InboxTaskStatus::Recurring);
}

#[test]
fn chore_end_date_before_today_is_rejected() {
    let today = date(2024, 12, 4);
    let mut fx = Fixture::new(today);
    let ctx = ctx_at(today);
    let workspace_ref_id = fx.workspace_ref_id;
    let chore = ChoreService::new(&mut fx.store)
        .create(
            &ctx,
            workspace_ref_id,
            today,
            &ChoreCreate::new(
                "Clean gutters",
                RecurringTaskGenParams::simple(RecurringTaskPeriod::Monthly, Eisen::Regular, None),
            ),
        )
        .unwrap();

    let err = ChoreService::new(&mut fx.store)
        .update(
            &ctx,
            workspace_ref_id,
            today,
            chore.ref_id,
            ChoreUpdate {
                end_at_date: UpdateAction::change_to(Some(date(2024, 12, 1))),
                ..ChoreUpdate::default()
            },
        )
        .unwrap_err();

    assert!(matches!(err, ServiceError::InputValidation(_)));
}

#[test]
fn generated_tasks_refuse_template_owned_edits() {
    let today = date(2024, 12, 4);
    let mut fx = Fixture::new(today);
    let ctx = ctx_at(today);
    let workspace_ref_id = fx.workspace_ref_id;
    weekly_habit(&mut fx, today, "Run");
    generate(&mut fx, today);
    let task = fx.tasks_from(InboxTaskSource::Habit).remove(0);

    let rename = InboxTaskUpdate {
        name: UpdateAction::change_to("Walk".to_string()),
        ..InboxTaskUpdate::default()
    };
    let err = InboxTaskService::new(&mut fx.store)
        .update(&ctx, workspace_ref_id, task.ref_id, rename)
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::CannotModifyGenerated {
            field: "name",
            source: InboxTaskSource::Habit,
        }
    ));

    let reprioritize = InboxTaskUpdate {
        eisen: UpdateAction::change_to(Eisen::Urgent),
        ..InboxTaskUpdate::default()
    };
    let err = InboxTaskService::new(&mut fx.store)
        .update(&ctx, workspace_ref_id, task.ref_id, reprioritize)
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::CannotModifyGenerated { field: "eisen", .. }
    ));

    let same_name = InboxTaskUpdate {
        name: UpdateAction::change_to("Run".to_string()),
        due_date: UpdateAction::change_to(Some(date(2024, 12, 6))),
        ..InboxTaskUpdate::default()
    };
    let updated = InboxTaskService::new(&mut fx.store)
        .update(&ctx, workspace_ref_id, task.ref_id, same_name)
        .unwrap();
    assert_eq!(updated.data.due_date, Some(date(2024, 12, 6)));

    let accepted = InboxTaskService::new(&mut fx.store)
        .change_status(&ctx, workspace_ref_id, task.ref_id, InboxTaskStatus::Accepted)
        .unwrap();
    assert_eq!(accepted.data.status, InboxTaskStatus::Accepted);
    assert!(accepted.data.accepted_time.is_some());
}

fn friend_with_reminders(fx: &mut Fixture, today: Date, name: &str) -> EntityId {
    let workspace_ref_id = fx.workspace_ref_id;
    PersonService::new(&mut fx.store, &fx.config)
        .create(
            &ctx_at(today),
            workspace_ref_id,
            name,
            PersonRelationship::Friend,
            Some(RecurringTaskGenParams::simple(
                RecurringTaskPeriod::Weekly,
                Eisen::Regular,
                None,
            )),
            Some(PersonBirthday::new(20, 12).unwrap()),
        )
        .unwrap()
        .ref_id
}

#[test]
fn renaming_a_person_rewrites_open_reminders_only() {
    let first_week = date(2024, 12, 4);
    let second_week = date(2024, 12, 10);
    let mut fx = Fixture::new(first_week);
    let workspace_ref_id = fx.workspace_ref_id;
    let ana = friend_with_reminders(&mut fx, first_week, "Ana");
    generate_targets(&mut fx, first_week, &[SyncTarget::Persons]);
    let done_catch_up = fx.tasks_from(InboxTaskSource::PersonCatchUp).remove(0);
    InboxTaskService::new(&mut fx.store)
        .change_status(
            &ctx_at(first_week),
            workspace_ref_id,
            done_catch_up.ref_id,
            InboxTaskStatus::Done,
        )
        .unwrap();
    generate_targets(&mut fx, second_week, &[SyncTarget::Persons]);

    let ctx = ctx_at(second_week);
    PersonService::new(&mut fx.store, &fx.config)
        .update(
            &ctx,
            workspace_ref_id,
            ana,
            PersonUpdate {
                name: UpdateAction::change_to("Anna".to_string()),
                ..PersonUpdate::default()
            },
        )
        .unwrap();

    let catch_ups = fx.tasks_from(InboxTaskSource::PersonCatchUp);
    assert_eq!(catch_ups.len(), 2);
    for task in &catch_ups {
        match task.data.recurring_timeline.as_deref() {
            Some("2024-W49") => {
                assert_eq!(task.data.name, "Catch up with Ana");
                assert_eq!(task.data.status, InboxTaskStatus::Done);
            }
            Some("2024-W50") => assert_eq!(task.data.name, "Catch up with Anna"),
            other => panic!("unexpected timeline {other:?}"),
        }
    }
    let birthdays = fx.tasks_from(InboxTaskSource::PersonBirthday);
    assert_eq!(birthdays.len(), 1);
    assert_eq!(birthdays[0].data.name, "Wish happy birthday to Anna");
    assert_eq!(birthdays[0].data.due_date, Some(date(2024, 12, 20)));

    let friends = ProjectService::new(&mut fx.store)
        .create(&ctx, workspace_ref_id, "Friends", None)
        .unwrap();
    PersonService::new(&mut fx.store, &fx.config)
        .change_catch_up_project(&ctx, workspace_ref_id, friends.ref_id)
        .unwrap();

    for task in fx.tasks_from(InboxTaskSource::PersonCatchUp) {
        let expected = if task.data.is_completed() {
            fx.root_project_ref_id
        } else {
            friends.ref_id
        };
        assert_eq!(task.data.project_ref_id, expected);
    }
    assert_eq!(
        fx.tasks_from(InboxTaskSource::PersonBirthday)[0].data.project_ref_id,
        friends.ref_id
    );
}

#[test]
fn clearing_catch_up_params_retires_open_catch_ups() {
    let today = date(2024, 12, 4);
    let mut fx = Fixture::new(today);
    let workspace_ref_id = fx.workspace_ref_id;
    let ben = friend_with_reminders(&mut fx, today, "Ben");
    generate_targets(&mut fx, today, &[SyncTarget::Persons]);

    PersonService::new(&mut fx.store, &fx.config)
        .update(
            &ctx_at(today),
            workspace_ref_id,
            ben,
            PersonUpdate {
                catch_up_params: UpdateAction::change_to(None),
                ..PersonUpdate::default()
            },
        )
        .unwrap();

    let catch_ups = fx.tasks_from(InboxTaskSource::PersonCatchUp);
    assert_eq!(catch_ups.len(), 1);
    assert!(catch_ups[0].archived);
    assert_eq!(catch_ups[0].archival_reason, Some(ArchivalReason::Cascading));
    let birthdays = fx.tasks_from(InboxTaskSource::PersonBirthday);
    assert!(birthdays[0].is_live());
}
