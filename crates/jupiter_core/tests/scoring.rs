mod common;

use common::{ctx_at, Fixture};
use jiff::civil::Date;
use jiff::civil::date;
use jupiter_core::model::big_plan::BigPlanStatus;
use jupiter_core::model::inbox_task::{Difficulty, InboxTaskStatus};
use jupiter_core::model::update_action::UpdateAction;
use jupiter_core::service::big_plan_service::{BigPlanService, BigPlanUpdate};
use jupiter_core::service::inbox_task_service::{InboxTaskCreate, InboxTaskService};
use jupiter_core::service::score_service::ScoreService;
use jupiter_core::model::entity::EntityId;
use jupiter_core::{RecurringTaskPeriod, StatsService, SyncTarget};

#[test]
fn completed_work_is_scored_once() {
    let today = date(2024, 12, 4);
    let mut fx = Fixture::new(today);
    let ctx = ctx_at(today);
    let workspace_ref_id = fx.workspace_ref_id;

    let mut tasks = InboxTaskService::new(&mut fx.store);
    let hard = tasks
        .create(
            &ctx,
            workspace_ref_id,
            &InboxTaskCreate {
                difficulty: Some(Difficulty::Hard),
                ..InboxTaskCreate::named("File taxes")
            },
        )
        .unwrap();
    let easy = tasks
        .create(&ctx, workspace_ref_id, &InboxTaskCreate::named("Water plants"))
        .unwrap();
    tasks
        .change_status(&ctx, workspace_ref_id, hard.ref_id, InboxTaskStatus::Done)
        .unwrap();
    tasks
        .change_status(&ctx, workspace_ref_id, hard.ref_id, InboxTaskStatus::InProgress)
        .unwrap();
    tasks
        .change_status(&ctx, workspace_ref_id, hard.ref_id, InboxTaskStatus::Done)
        .unwrap();
    tasks
        .change_status(&ctx, workspace_ref_id, easy.ref_id, InboxTaskStatus::NotDone)
        .unwrap();

    let plan = BigPlanService::new(&mut fx.store)
        .create(&ctx, workspace_ref_id, "Launch site", None, None, None)
        .unwrap();
    BigPlanService::new(&mut fx.store)
        .update(
            &ctx,
            workspace_ref_id,
            plan.ref_id,
            BigPlanUpdate {
                status: UpdateAction::change_to(BigPlanStatus::Done),
                ..BigPlanUpdate::default()
            },
        )
        .unwrap();

    let mut scores = ScoreService::new(&mut fx.store);
    let lifetime = scores.stats_for(workspace_ref_id, None, today).unwrap().unwrap();
    assert_eq!(lifetime.total_score, 5 - 1 + 10);
    assert_eq!(lifetime.inbox_task_cnt, 2);
    assert_eq!(lifetime.big_plan_cnt, 1);

    let week = scores
        .stats_for(workspace_ref_id, Some(RecurringTaskPeriod::Weekly), today)
        .unwrap()
        .unwrap();
    assert_eq!(week.timeline, "2024-W49");
    assert_eq!(week.total_score, 14);

    let best_day = scores
        .best_for(
            workspace_ref_id,
            Some(RecurringTaskPeriod::Monthly),
            today,
            RecurringTaskPeriod::Daily,
        )
        .unwrap()
        .unwrap();
    assert_eq!(best_day.total_score, 14);

    assert!(scores
        .stats_for(workspace_ref_id, Some(RecurringTaskPeriod::Weekly), date(2024, 12, 10))
        .unwrap()
        .is_none());
}

#[test]
fn period_best_picks_the_strongest_day() {
    let mut fx = Fixture::new(date(2024, 12, 2));
    let workspace_ref_id = fx.workspace_ref_id;
    for (day, names) in [
        (date(2024, 12, 2), vec!["Email"]),
        (date(2024, 12, 3), vec!["Gym", "Groceries", "Laundry"]),
    ] {
        let ctx = ctx_at(day);
        let mut tasks = InboxTaskService::new(&mut fx.store);
        for name in names {
            tasks
                .create(
                    &ctx,
                    workspace_ref_id,
                    &InboxTaskCreate {
                        status: InboxTaskStatus::Done,
                        ..InboxTaskCreate::named(name)
                    },
                )
                .unwrap();
        }
    }

    let mut scores = ScoreService::new(&mut fx.store);
    let best = scores
        .best_for(
            workspace_ref_id,
            Some(RecurringTaskPeriod::Weekly),
            date(2024, 12, 4),
            RecurringTaskPeriod::Daily,
        )
        .unwrap()
        .unwrap();
    assert_eq!(best.total_score, 3);
    assert_eq!(best.inbox_task_cnt, 3);
    let week = scores
        .stats_for(workspace_ref_id, Some(RecurringTaskPeriod::Weekly), date(2024, 12, 4))
        .unwrap()
        .unwrap();
    assert_eq!(week.total_score, 4);
}

#[test]
fn stats_count_live_completed_and_archived() {
    let today = date(2024, 12, 4);
    let mut fx = Fixture::new(today);
    let ctx = ctx_at(today);
    let workspace_ref_id = fx.workspace_ref_id;
    let mut tasks = InboxTaskService::new(&mut fx.store);
    let done = tasks
        .create(&ctx, workspace_ref_id, &InboxTaskCreate::named("Renew lease"))
        .unwrap();
    tasks
        .create(&ctx, workspace_ref_id, &InboxTaskCreate::named("Fix bike"))
        .unwrap();
    let dropped = tasks
        .create(&ctx, workspace_ref_id, &InboxTaskCreate::named("Old idea"))
        .unwrap();
    tasks
        .change_status(&ctx, workspace_ref_id, done.ref_id, InboxTaskStatus::Done)
        .unwrap();
    tasks.archive(&ctx, dropped.ref_id).unwrap();

    let entry = StatsService::new(&mut fx.store)
        .run(
            &ctx,
            workspace_ref_id,
            today,
            &[SyncTarget::BigPlans, SyncTarget::InboxTasks],
        )
        .unwrap();

    assert!(entry.data.closed);
    let targets: Vec<SyncTarget> = entry.data.stats.iter().map(|stats| stats.target).collect();
    assert_eq!(targets, vec![SyncTarget::InboxTasks, SyncTarget::BigPlans]);
    let inbox = &entry.data.stats[0];
    assert_eq!((inbox.live, inbox.completed, inbox.archived), (2, 1, 1));
    assert_eq!(entry.data.entity_records.len(), 2);
}

type Totals = (i64, i64, i64);

fn snapshot(fx: &mut Fixture, workspace_ref_id: EntityId) -> Vec<Option<Totals>> {
    use RecurringTaskPeriod::{Daily, Monthly, Weekly, Yearly};
    let stats_queries: [(Option<RecurringTaskPeriod>, Date); 6] = [
        (None, date(2024, 12, 4)),
        (Some(Daily), date(2024, 11, 29)),
        (Some(Weekly), date(2024, 11, 29)),
        (Some(Weekly), date(2024, 12, 4)),
        (Some(Monthly), date(2024, 12, 4)),
        (Some(Yearly), date(2024, 12, 4)),
    ];
    let best_queries: [(Option<RecurringTaskPeriod>, RecurringTaskPeriod); 5] = [
        (None, Weekly),
        (Some(Monthly), Weekly),
        (Some(Monthly), Daily),
        (Some(Yearly), Monthly),
        (Some(Yearly), Weekly),
    ];
    let mut scores = ScoreService::new(&mut fx.store);
    let mut rows = Vec::new();
    for (period, day) in stats_queries {
        let stats = scores.stats_for(workspace_ref_id, period, day).unwrap();
        rows.push(stats.map(|s| (s.total_score, s.inbox_task_cnt, s.big_plan_cnt)));
    }
    for (period, sub_period) in best_queries {
        let best = scores
            .best_for(workspace_ref_id, period, date(2024, 12, 4), sub_period)
            .unwrap();
        rows.push(best.map(|b| (b.total_score, b.inbox_task_cnt, b.big_plan_cnt)));
    }
    rows
}

#[test]
fn recording_matches_a_full_rebuild_across_a_month_boundary() {
    let mut fx = Fixture::new(date(2024, 11, 29));
    let workspace_ref_id = fx.workspace_ref_id;
    for (day, done, not_done) in [
        (date(2024, 11, 29), 3, 0),
        (date(2024, 12, 1), 1, 0),
        (date(2024, 12, 3), 2, 0),
        (date(2024, 12, 4), 0, 1),
    ] {
        let ctx = ctx_at(day);
        let mut tasks = InboxTaskService::new(&mut fx.store);
        let outcomes = std::iter::repeat(InboxTaskStatus::Done)
            .take(done)
            .chain(std::iter::repeat(InboxTaskStatus::NotDone).take(not_done));
        for (index, status) in outcomes.enumerate() {
            tasks
                .create(
                    &ctx,
                    workspace_ref_id,
                    &InboxTaskCreate {
                        status,
                        ..InboxTaskCreate::named(&format!("Errand {day} {index}"))
                    },
                )
                .unwrap();
        }
    }

    let recorded = snapshot(&mut fx, workspace_ref_id);
    assert_eq!(
        recorded,
        vec![
            Some((5, 7, 0)),
            Some((3, 3, 0)),
            Some((4, 4, 0)),
            Some((1, 3, 0)),
            Some((2, 4, 0)),
            Some((5, 7, 0)),
            // W48 whole, then W48 clipped to December beating the W49 tie.
            Some((4, 4, 0)),
            Some((1, 1, 0)),
            Some((2, 2, 0)),
            Some((3, 3, 0)),
            Some((4, 4, 0)),
        ]
    );

    ScoreService::new(&mut fx.store)
        .rebuild(&ctx_at(date(2024, 12, 4)), workspace_ref_id)
        .unwrap();
    assert_eq!(snapshot(&mut fx, workspace_ref_id), recorded);
}
