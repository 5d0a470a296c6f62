mod common;

use common::{ctx_at, Fixture};
use jiff::civil::date;
use jupiter_core::model::entity::EntityTag;
use jupiter_core::model::inbox_task::{Eisen, InboxTaskSource, InboxTaskStatus};
use jupiter_core::model::update_action::UpdateAction;
use jupiter_core::service::inbox_task_service::{InboxTaskCreate, InboxTaskService};
use jupiter_core::service::journal_service::JournalService;
use jupiter_core::service::metric_service::{MetricService, MetricUpdate};
use jupiter_core::service::vacation_service::VacationService;
use jupiter_core::{
    ArchivalReason, GenRequest, GenService, NoOpProgressReporter, RecurringTaskGenParams,
    RecurringTaskPeriod, ServiceError, SyncTarget,
};

#[test]
fn user_journal_snapshots_the_week_and_rejects_duplicates() {
    let today = date(2024, 12, 4);
    let mut fx = Fixture::new(today);
    let ctx = ctx_at(today);
    let workspace_ref_id = fx.workspace_ref_id;
    let mut tasks = InboxTaskService::new(&mut fx.store);
    let done = tasks
        .create(&ctx, workspace_ref_id, &InboxTaskCreate::named("Send invoice"))
        .unwrap();
    tasks
        .create(&ctx, workspace_ref_id, &InboxTaskCreate::named("Fix bike"))
        .unwrap();
    tasks
        .change_status(&ctx, workspace_ref_id, done.ref_id, InboxTaskStatus::Done)
        .unwrap();

    let created = JournalService::new(&mut fx.store)
        .create(&ctx, workspace_ref_id, today, RecurringTaskPeriod::Weekly)
        .unwrap();

    assert_eq!(created.journal.data.timeline, "2024-W49");
    let tags: Vec<EntityTag> = created.created.iter().map(|summary| summary.entity_tag).collect();
    assert_eq!(tags, vec![EntityTag::Journal, EntityTag::Note, EntityTag::InboxTask]);
    let report = &created.journal.data.report;
    assert_eq!(report["total"]["done"], 1);
    assert_eq!(report["total"]["not_done"], 0);
    assert_eq!(report["timeline"], "2024-W49");
    assert_eq!(fx.tasks_from(InboxTaskSource::JournalWriting).len(), 1);

    let err = JournalService::new(&mut fx.store)
        .create(&ctx, workspace_ref_id, date(2024, 12, 6), RecurringTaskPeriod::Weekly)
        .unwrap_err();
    assert!(matches!(err, ServiceError::DomainRuleViolation(_)));
}

#[test]
fn dropping_a_metric_schedule_retires_its_collection_task() {
    let today = date(2024, 12, 4);
    let mut fx = Fixture::new(today);
    let ctx = ctx_at(today);
    let workspace_ref_id = fx.workspace_ref_id;
    let weight = MetricService::new(&mut fx.store)
        .create(
            &ctx,
            workspace_ref_id,
            "Weight",
            Some(RecurringTaskGenParams::simple(
                RecurringTaskPeriod::Weekly,
                Eisen::Regular,
                None,
            )),
            None,
            None,
        )
        .unwrap();
    let request = GenRequest {
        targets: vec![SyncTarget::Metrics],
        ..GenRequest::all(today)
    };
    GenService::new(&mut fx.store, &fx.config)
        .generate(&ctx, workspace_ref_id, &request, &NoOpProgressReporter)
        .unwrap();
    let collect = fx.tasks_from(InboxTaskSource::Metric);
    assert_eq!(collect.len(), 1);
    assert_eq!(collect[0].data.name, "Collect value for metric Weight");

    MetricService::new(&mut fx.store)
        .update(
            &ctx,
            workspace_ref_id,
            weight.ref_id,
            MetricUpdate {
                collection_params: UpdateAction::change_to(None),
                ..MetricUpdate::default()
            },
        )
        .unwrap();

    let collect = fx.tasks_from(InboxTaskSource::Metric);
    assert!(collect[0].archived);
    assert_eq!(collect[0].archival_reason, Some(ArchivalReason::Cascading));

    let mut entries = MetricService::new(&mut fx.store);
    entries
        .create_entry(&ctx, weight.ref_id, date(2024, 12, 5), 71.5, None)
        .unwrap();
    entries
        .create_entry(&ctx, weight.ref_id, date(2024, 12, 3), 72.0, Some("after run".into()))
        .unwrap();
    let values: Vec<f64> = entries
        .entries(weight.ref_id)
        .unwrap()
        .into_iter()
        .map(|entry| entry.data.value)
        .collect();
    assert_eq!(values, vec![72.0, 71.5]);
}

#[test]
fn vacation_must_not_end_before_it_starts() {
    let today = date(2024, 12, 4);
    let mut fx = Fixture::new(today);
    let workspace_ref_id = fx.workspace_ref_id;

    let err = VacationService::new(&mut fx.store)
        .create(
            &ctx_at(today),
            workspace_ref_id,
            "Ski trip",
            date(2025, 1, 10),
            date(2025, 1, 3),
        )
        .unwrap_err();

    assert!(matches!(err, ServiceError::InputValidation(_)));
}
