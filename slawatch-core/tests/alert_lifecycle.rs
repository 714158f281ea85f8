mod common;

use common::{gateway_with, operator_setup};
use serde_json::json;
use slawatch_core::models::{ActionType, AlertStatus};
use slawatch_core::{AlertController, ConsoleError};
use slawatch_devkit::wait_until;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_list_replaces_snapshot_newest_first() {
    let (backend, _token, _session, gateway) = operator_setup().await;
    let first = backend.seed_alert("ORD-1", 0.85);
    let second = backend.seed_alert("ORD-2", 0.95);
    let controller = AlertController::new(gateway);

    let snapshot = controller.list(50).await.unwrap();
    let ids: Vec<i64> = snapshot.alerts.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![second, first]);
    assert!(snapshot.fetched_at.is_some());
    assert_eq!(controller.snapshot().alerts.len(), 2);

    let limited = controller.list(1).await.unwrap();
    assert_eq!(limited.alerts.len(), 1);
    assert_eq!(controller.snapshot().alerts.len(), 1);
}

#[tokio::test]
async fn test_late_poll_does_not_undo_newer_list() {
    let (backend, _token, _session, gateway) = operator_setup().await;
    let id = backend.seed_alert("ORD-1", 0.9);
    let controller = Arc::new(AlertController::new(gateway));

    // poll answered with the pre-ack state, delivered late
    backend.hold_next("/alerts", Duration::from_millis(400));
    let slow = tokio::spawn({
        let controller = controller.clone();
        async move { controller.list(50).await }
    });
    assert!(wait_until(1000, || {
        let seen = backend.requests_to("/alerts").len() == 1;
        async move { seen }
    }).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    controller.acknowledge(id).await.unwrap();
    let fresh = controller.list(50).await.unwrap();
    assert_eq!(fresh.status_of(id), Some(AlertStatus::Acknowledged));

    let late = slow.await.unwrap().unwrap();
    assert_eq!(late.status_of(id), Some(AlertStatus::Acknowledged));
    assert_eq!(controller.snapshot().status_of(id), Some(AlertStatus::Acknowledged));
}

#[tokio::test]
async fn test_status_filter() {
    let (backend, _token, _session, gateway) = operator_setup().await;
    let open = backend.seed_alert("ORD-1", 0.85);
    let closed = backend.seed_alert("ORD-2", 0.95);
    backend.resolve_elsewhere(closed, true);
    let controller = AlertController::new(gateway);

    let snapshot = controller.list_with_status(50, AlertStatus::Open).await.unwrap();
    assert_eq!(snapshot.alerts.len(), 1);
    assert_eq!(snapshot.alerts[0].id, open);
    assert!(backend.requests_to("/alerts")[0].query.as_deref().unwrap_or("").contains("status=open"));
}

#[tokio::test]
async fn test_acknowledge_twice_is_rejected() {
    let (backend, _token, _session, gateway) = operator_setup().await;
    let id = backend.seed_alert("ORD-7", 0.9);
    let controller = AlertController::new(gateway);
    controller.list(50).await.unwrap();

    controller.acknowledge(id).await.unwrap();
    // snapshot still says open: the backend is the one refusing
    let err = controller.acknowledge(id).await.unwrap_err();
    assert!(err.is_transition_rejected(), "got {err}");

    let snapshot = controller.list(50).await.unwrap();
    let alert = snapshot.get(id).unwrap();
    assert_eq!(alert.status, AlertStatus::Acknowledged);
    assert!(alert.acknowledged_at.is_some());
    assert!(alert.resolved_at.is_none());

    // now the snapshot knows, so no request is sent
    backend.clear_requests();
    let err = controller.acknowledge(id).await.unwrap_err();
    assert!(matches!(
        err,
        ConsoleError::TransitionRejected { current: Some(AlertStatus::Acknowledged), .. }
    ));
    assert!(backend.requests_to(&format!("/alerts/{id}/ack")).is_empty());
}

#[tokio::test]
async fn test_resolve_is_terminal() {
    let (backend, _token, _session, gateway) = operator_setup().await;
    let id = backend.seed_alert("ORD-3", 0.88);
    let controller = AlertController::new(gateway);

    controller.resolve(id, true, Some("  carrier confirmed late  ")).await.unwrap();
    let snapshot = controller.list(50).await.unwrap();
    let alert = snapshot.get(id).unwrap();
    assert_eq!(alert.status, AlertStatus::Resolved);
    assert!(alert.resolved_at.is_some());
    assert!(alert.is_consistent());
    assert_eq!(alert.resolution_notes.as_deref(), Some("carrier confirmed late"));
    assert_eq!(alert.sla_verdict(), Some("SLA Missed"));

    assert!(controller.acknowledge(id).await.unwrap_err().is_transition_rejected());
    assert!(controller.resolve(id, false, None).await.unwrap_err().is_transition_rejected());
}

#[tokio::test]
async fn test_resolve_from_acknowledged_with_blank_notes() {
    let (backend, _token, _session, gateway) = operator_setup().await;
    let id = backend.seed_alert("ORD-4", 0.82);
    let controller = AlertController::new(gateway);

    controller.acknowledge(id).await.unwrap();
    controller.resolve(id, false, Some("   ")).await.unwrap();

    let alert = backend.alert(id).unwrap();
    assert_eq!(alert["status"], "resolved");
    assert_eq!(alert["actual_sla_missed"], 0);
    assert!(alert["resolution_notes"].is_null());
}

#[tokio::test]
async fn test_concurrent_resolve_loses() {
    let (backend, token, _session, gateway) = operator_setup().await;
    let id = backend.seed_alert("ORD-5", 0.91);

    let mine = AlertController::new(gateway);
    mine.list(50).await.unwrap();

    let (_other_session, other_gateway) = gateway_with(backend.base_url(), Some(&token));
    let theirs = AlertController::new(other_gateway);
    theirs.resolve(id, false, Some("handled by night shift")).await.unwrap();

    let err = mine.resolve(id, true, None).await.unwrap_err();
    match err {
        ConsoleError::TransitionRejected { alert_id, current, .. } => {
            assert_eq!(alert_id, id);
            assert_eq!(current, None);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(backend.alert(id).unwrap()["resolution_notes"], "handled by night shift");
}

#[tokio::test]
async fn test_unknown_alert_is_rejected() {
    let (_backend, _token, _session, gateway) = operator_setup().await;
    let controller = AlertController::new(gateway);
    assert!(controller.acknowledge(404).await.unwrap_err().is_transition_rejected());
}

#[tokio::test]
async fn test_action_trail_round_trip() {
    let (backend, _token, _session, gateway) = operator_setup().await;
    let id = backend.seed_alert("ORD-8", 0.93);
    let controller = AlertController::new(gateway);

    assert!(controller.list_actions(id).await.unwrap().is_empty());
    assert!(controller.cached_actions(id).unwrap().is_empty());

    controller
        .record_action(id, ActionType::Reroute, Some(json!({"hub": "north"})))
        .await
        .unwrap();
    // recording does not refresh the cache
    assert!(controller.cached_actions(id).unwrap().is_empty());

    let actions = controller.list_actions(id).await.unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].action_type, ActionType::Reroute);
    assert_eq!(actions[0].alert_id, id);
    assert_eq!(actions[0].payload, Some(json!({"hub": "north"})));
    assert!(!actions[0].created_at.is_empty());

    // actions do not move the alert
    assert_eq!(backend.alert_status(id).as_deref(), Some("open"));

    controller.forget_actions(id);
    assert!(controller.cached_actions(id).is_none());
}

#[tokio::test]
async fn test_action_on_resolved_alert() {
    let (backend, _token, _session, gateway) = operator_setup().await;
    let id = backend.seed_alert("ORD-9", 0.97);
    let controller = AlertController::new(gateway);
    controller.list(50).await.unwrap();

    // stale snapshot: the backend refuses with 409
    backend.resolve_elsewhere(id, true);
    let err = controller.record_action(id, ActionType::Escalate, None).await.unwrap_err();
    assert!(err.is_transition_rejected(), "got {err}");

    // fresh snapshot: refused before any request
    controller.list(50).await.unwrap();
    backend.clear_requests();
    let err = controller
        .record_action(id, ActionType::Other("CALL_CUSTOMER".into()), None)
        .await
        .unwrap_err();
    assert!(err.is_transition_rejected());
    assert!(backend.requests().is_empty());
    assert_eq!(backend.action_count(id), 0);
}

#[tokio::test]
async fn test_action_on_missing_alert_is_plain_failure() {
    let (_backend, _token, _session, gateway) = operator_setup().await;
    let controller = AlertController::new(gateway);
    let err = controller.record_action(77, ActionType::Reroute, None).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_failed_list_keeps_last_snapshot() {
    let (backend, _token, _session, gateway) = operator_setup().await;
    backend.seed_alert("ORD-1", 0.9);
    backend.seed_alert("ORD-2", 0.9);
    let controller = AlertController::new(gateway);
    controller.list(50).await.unwrap();

    backend.fail_next("/alerts", 503);
    let err = controller.list(50).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert_eq!(controller.snapshot().alerts.len(), 2);
}
