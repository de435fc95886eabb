use planner_core::prelude::*;
use planner_core::{AggregateView, FanOutProgress, RowStatus, ValuationLevel, View, DEFAULT_FAN_OUT_LIMIT};
use planner_test_utils::{leaf_record, operational_record, summary, CallLog, FakeCatalog, Gate};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn operator() -> SessionContext {
    SessionContext::operator(TenantRef::from_id(TenantId(7)).with_slug("norte"))
}

fn admin_with(tenant: i64) -> SessionContext {
    SessionContext::administrator().with_tenant(TenantRef::from_id(TenantId(tenant)))
}

fn dashboard(api: &Arc<FakeCatalog>, session: SessionContext) -> Dashboard {
    Dashboard::new(api.clone(), PlannerConfig::default(), session)
}

fn ready(screen: Screen) -> AggregateView {
    match screen {
        Screen::Summary {
            summary: SummaryScreen::Ready { view },
        } => view,
        other => panic!("expected a ready summary, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_a_single_leaf() {
    let mut leaf = summary(3, 66.5);
    leaf.records = vec![
        leaf_record("Ana", "2024-01-01T10:00:00Z"),
        leaf_record("", "2024-02-01T10:00:00Z"),
    ];
    let api = Arc::new(FakeCatalog::new().with_program(1, &[10]).with_summary(10, leaf));
    let dash = dashboard(&api, operator());

    let view = ready(dash.open_summary().await);
    assert_eq!(view.rows.len(), 1);
    let row = &view.rows[0];
    assert_eq!(row.program_name, "P1");
    assert_eq!(row.responsible_label(), "Ana");
    assert_eq!(row.last_updated_label(), "2024-02-01");
    assert_eq!(row.progress, 66.5);
    assert_eq!(row.evidence_count, 3);
    assert_eq!(api.log().summaries, vec![(TenantId(7), LeafId(10))]);
}

#[tokio::test]
async fn scenario_b_failed_leaf_is_degraded_row() {
    let api = Arc::new(
        FakeCatalog::new()
            .with_program(1, &[1, 2])
            .with_failure(1, PlannerError::Transport("connection reset".into()))
            .with_summary(2, summary(4, 50.0)),
    );
    let dash = dashboard(&api, operator());

    let view = ready(dash.open_summary().await);
    assert_eq!(view.rows.len(), 2);
    assert!(view.rows[0].is_degraded());
    assert_eq!(view.rows[0].evidence_count, 0);
    assert_eq!(view.rows[0].progress, 0.0);
    assert_eq!(view.rows[1].status, RowStatus::Ok);
    assert_eq!(view.rows[1].evidence_count, 4);
    assert_eq!(view.totals.degraded, 1);
}

#[tokio::test]
async fn scenario_c_no_programs() {
    let api = Arc::new(FakeCatalog::new());
    let dash = dashboard(&api, operator());

    assert_eq!(
        dash.open_summary().await,
        Screen::Summary {
            summary: SummaryScreen::NoPrograms
        }
    );
    let log = api.log();
    assert_eq!(log.list_programs, 1);
    assert!(log.list_leaves.is_empty());
    assert!(log.summaries.is_empty());
}

#[tokio::test]
async fn leaf_list_failure_is_structural() {
    let api = Arc::new(
        FakeCatalog::new()
            .with_program(1, &[10])
            .with_program(2, &[20])
            .with_leaf_list_failure(2, PlannerError::http(500, "boom")),
    );
    let dash = dashboard(&api, operator());

    match dash.open_summary().await {
        Screen::Summary {
            summary: SummaryScreen::Failed { notice },
        } => assert!(matches!(notice, Notice::Failed { .. })),
        other => panic!("unexpected {other:?}"),
    }
    assert!(api.log().summaries.is_empty());
}

#[tokio::test]
async fn role_mismatch_leaf_is_explained() {
    let api = Arc::new(
        FakeCatalog::new()
            .with_program(1, &[10])
            .with_failure(10, PlannerError::http(403, "Requiere rol cliente (IES)")),
    );
    let dash = dashboard(&api, admin_with(7));

    let view = ready(dash.open_summary().await);
    match &view.rows[0].status {
        RowStatus::Degraded { notice } => {
            assert!(matches!(notice, Notice::RoleMismatch { .. }));
        }
        RowStatus::Ok => panic!("expected degraded row"),
    }
}

#[tokio::test]
async fn missing_primary_summary_uses_legacy_endpoint() {
    let api = Arc::new(
        FakeCatalog::new()
            .with_program(1, &[10])
            .with_legacy_summary(10, summary(2, 30.0)),
    );
    let dash = dashboard(&api, operator());

    let view = ready(dash.open_summary().await);
    assert_eq!(view.rows[0].evidence_count, 2);
    assert_eq!(api.log().legacy_summaries, vec![LeafId(10)]);
}

#[tokio::test(start_paused = true)]
async fn fan_out_never_exceeds_limit() {
    let mut fake = FakeCatalog::new().with_program(1, &(1..=12).collect::<Vec<i64>>());
    for leaf in 1..=12 {
        fake = fake
            .with_summary(leaf, summary(1, 10.0))
            .with_delay(leaf, Duration::from_millis((leaf as u64 * 37) % 11 + 1));
    }
    let api = Arc::new(fake);
    let dash = dashboard(&api, operator());

    let view = ready(dash.open_summary().await);
    let ids: Vec<i64> = view.rows.iter().map(|r| r.leaf_id.0).collect();
    assert_eq!(ids, (1..=12).collect::<Vec<_>>());
    assert_eq!(api.log().peak_in_flight, DEFAULT_FAN_OUT_LIMIT);
    assert_eq!(api.in_flight(), 0);
}

#[tokio::test]
async fn late_results_are_discarded_after_going_home() {
    let gate = Gate::new();
    let api = Arc::new(
        FakeCatalog::new()
            .with_program(1, &[10, 11])
            .with_summary(10, summary(1, 10.0))
            .with_summary(11, summary(1, 20.0))
            .with_gate(gate.clone()),
    );
    let dash = dashboard(&api, operator());

    let (screen, ()) = tokio::join!(dash.open_summary(), async {
        api.wait_for_in_flight(2).await;
        assert_eq!(
            dash.screen(),
            Screen::Summary {
                summary: SummaryScreen::Loading {
                    progress: FanOutProgress { done: 0, total: 2 }
                }
            }
        );
        dash.go_home().await;
        gate.open();
    });

    assert_eq!(
        screen,
        Screen::Home {
            locked: false,
            tenant: Some("norte".into())
        }
    );
    // Not cancelled: both requests ran to completion.
    assert_eq!(api.log().summaries.len(), 2);
    assert_eq!(api.in_flight(), 0);
}

#[tokio::test]
async fn reentering_summary_refetches() {
    let api = Arc::new(FakeCatalog::new().with_program(1, &[10]).with_summary(10, summary(1, 1.0)));
    let dash = dashboard(&api, operator());

    dash.open_summary().await;
    dash.open_summary().await;
    assert_eq!(api.log().list_programs, 2);
    assert_eq!(api.log().summaries.len(), 2);
}

#[tokio::test]
async fn tenant_change_returns_home_and_rescopes() {
    let api = Arc::new(
        FakeCatalog::new()
            .with_program(1, &[10])
            .with_summary(10, summary(1, 1.0))
            .with_tenant(8, "Universidad Sur", "sur"),
    );
    let dash = dashboard(&api, admin_with(7));

    ready(dash.open_summary().await);
    let screen = dash.select_tenant_by_id(TenantId(8)).await.unwrap();
    assert_eq!(
        screen,
        Screen::Home {
            locked: false,
            tenant: Some("Universidad Sur".into())
        }
    );

    ready(dash.open_summary().await);
    assert_eq!(
        api.log().summaries,
        vec![(TenantId(7), LeafId(10)), (TenantId(8), LeafId(10))]
    );

    let screen = dash.select_tenant(None).await.unwrap();
    assert_eq!(
        screen,
        Screen::Home {
            locked: true,
            tenant: None
        }
    );
}

#[tokio::test]
async fn locked_admin_stays_home_without_requests() {
    let api = Arc::new(FakeCatalog::new().with_program(1, &[10]));
    let dash = dashboard(&api, SessionContext::administrator());

    let locked_home = Screen::Home {
        locked: true,
        tenant: None,
    };
    assert_eq!(dash.open_summary().await, locked_home);
    assert_eq!(
        dash.open_operational(LeafRef {
            id: LeafId(10),
            name: "L10".into()
        })
        .await,
        locked_home
    );
    assert_eq!(
        dash.notices(),
        vec![Notice::SelectTenantFirst, Notice::AdminCannotEditOperational]
    );
    assert_eq!(api.log(), CallLog::default());
}

#[tokio::test]
async fn operational_round_trip() {
    let api = Arc::new(
        FakeCatalog::new().with_records(10, vec![operational_record(1), operational_record(2)]),
    );
    let dash = dashboard(&api, operator());

    dash.open_operational(LeafRef {
        id: LeafId(10),
        name: "L10".into(),
    })
    .await;
    assert!(matches!(dash.navigation_state().view, View::Operational { .. }));

    let receipt = dash
        .save_record(
            RecordId(1),
            RecordPatch::new()
                .with_level(ValuationLevel::NearlySatisfactory)
                .with_responsible("  Ana  "),
        )
        .await
        .unwrap();
    assert_eq!(receipt.stored_id, Some(1001));

    let log = api.log();
    assert_eq!(log.records, vec![("norte".to_string(), LeafId(10))]);
    assert_eq!(log.patches[0].1.responsible.as_deref(), Some("Ana"));
    assert_eq!(log.patches[0].1.valuation, Some(75));

    dash.go_home().await;
    assert!(dash
        .save_record(RecordId(1), RecordPatch::new().with_presents(true))
        .await
        .is_err());
    assert_eq!(api.log().patches.len(), 1);
}
