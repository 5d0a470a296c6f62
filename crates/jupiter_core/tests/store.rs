mod common;

use common::{ctx_at, Fixture};
use jiff::civil::date;
use jupiter_core::model::entity::EventKind;
use jupiter_core::model::inbox_task::{Eisen, InboxTaskSource, InboxTaskStatus};
use jupiter_core::model::logs::GenFilters;
use jupiter_core::model::project::Project;
use jupiter_core::repo::{EntityRepository, FieldFilter};
use jupiter_core::service::habit_service::HabitService;
use jupiter_core::service::inbox_task_service::InboxTaskService;
use jupiter_core::service::project_service::ProjectService;
use jupiter_core::{
    ArchivalReason, GenRequest, GenService, NoOpProgressReporter, RecurringTaskGenParams,
    RecurringTaskPeriod, ServiceError, StoreError, SyncTarget,
};

#[test]
fn saving_a_stale_copy_fails() {
    let today = date(2024, 12, 2);
    let mut fx = Fixture::new(today);
    let ctx = ctx_at(today);
    let root = fx.root_project_ref_id;
    let uow = fx.store.unit_of_work().unwrap();
    let repo = uow.entities::<Project>();

    let first = repo.load_by_id(root, false).unwrap();
    let second = repo.load_by_id(root, false).unwrap();
    let saved = repo
        .save(first.modify(&ctx, EventKind::Updated, |data| data.name = "Everything".to_string()))
        .unwrap();
    assert_eq!(saved.version, 2);

    let err = repo
        .save(second.modify(&ctx, EventKind::Updated, |data| data.name = "Other".to_string()))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::StaleEntity {
            expected: 1,
            actual: 2,
            ..
        }
    ));
}

#[test]
fn archive_and_restore_are_recorded_as_events() {
    let today = date(2024, 12, 2);
    let mut fx = Fixture::new(today);
    let ctx = ctx_at(today);
    let workspace_ref_id = fx.workspace_ref_id;
    let root = fx.root_project_ref_id;
    let side = ProjectService::new(&mut fx.store)
        .create(&ctx, workspace_ref_id, "Side gigs", Some(root))
        .unwrap();

    let uow = fx.store.unit_of_work().unwrap();
    let repo = uow.entities::<Project>();
    let archived = repo
        .save(side.mark_archived(ArchivalReason::User, &ctx))
        .unwrap();
    assert!(archived.archived);
    assert!(matches!(
        repo.load_by_id(archived.ref_id, false),
        Err(StoreError::NotFound { .. })
    ));
    assert!(repo.load_optional(archived.ref_id, false).unwrap().is_none());

    let restored = repo.save(archived.restore(&ctx)).unwrap();
    assert!(restored.is_live());
    let kinds: Vec<EventKind> = repo
        .load_events(restored.ref_id)
        .unwrap()
        .into_iter()
        .map(|event| event.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![EventKind::Created, EventKind::Archived, EventKind::Restored]
    );
}

#[test]
fn field_filters_match_payload_values() {
    let today = date(2024, 12, 2);
    let mut fx = Fixture::new(today);
    let ctx = ctx_at(today);
    let workspace_ref_id = fx.workspace_ref_id;
    ProjectService::new(&mut fx.store)
        .create(&ctx, workspace_ref_id, "Garden", None)
        .unwrap();

    let uow = fx.store.unit_of_work().unwrap();
    let repo = uow.entities::<Project>();
    let found = repo
        .find_all_generic(None, false, &[FieldFilter::of("name", &["Garden"]).unwrap()])
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].data.name, "Garden");

    let none = repo
        .find_all_generic(None, false, &[FieldFilter::new("name", Vec::new())])
        .unwrap();
    assert!(none.is_empty());

    let roots = repo
        .find_all_generic(
            None,
            false,
            &[FieldFilter::new("parent_project_ref_id", vec![serde_json::Value::Null])],
        )
        .unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].data.name, "Life");
}

#[test]
fn archiving_a_habit_retires_only_unfinished_instances() {
    let today = date(2024, 12, 2);
    let mut fx = Fixture::new(today);
    let ctx = ctx_at(today);
    let workspace_ref_id = fx.workspace_ref_id;
    let habit = HabitService::new(&mut fx.store)
        .create(
            &ctx,
            workspace_ref_id,
            "Floss",
            None,
            RecurringTaskGenParams::simple(RecurringTaskPeriod::Daily, Eisen::Regular, None),
            None,
        )
        .unwrap();
    for day in [date(2024, 12, 2), date(2024, 12, 3)] {
        let request = GenRequest {
            today: day,
            targets: vec![SyncTarget::Habits],
            filters: GenFilters::new(),
            gen_even_if_not_modified: false,
        };
        GenService::new(&mut fx.store, &fx.config)
            .generate(&ctx_at(day), workspace_ref_id, &request, &NoOpProgressReporter)
            .unwrap();
    }
    let first = fx.tasks_from(InboxTaskSource::Habit)[0].ref_id;
    InboxTaskService::new(&mut fx.store)
        .change_status(&ctx, workspace_ref_id, first, InboxTaskStatus::Done)
        .unwrap();

    let outcome = HabitService::new(&mut fx.store)
        .archive(&ctx, habit.ref_id)
        .unwrap();

    assert_eq!(outcome.cascaded().len(), 1);
    let tasks = fx.tasks_from(InboxTaskSource::Habit);
    assert!(tasks[0].is_live());
    assert!(tasks[1].archived);
    assert_eq!(tasks[1].archival_reason, Some(ArchivalReason::Cascading));
}

#[test]
fn pinned_projects_cannot_be_archived() {
    let today = date(2024, 12, 2);
    let mut fx = Fixture::new(today);
    let ctx = ctx_at(today);
    let workspace_ref_id = fx.workspace_ref_id;
    let root = fx.root_project_ref_id;

    let err = ProjectService::new(&mut fx.store)
        .archive(&ctx, workspace_ref_id, root)
        .unwrap_err();

    assert!(matches!(err, ServiceError::DomainRuleViolation(_)));
}
