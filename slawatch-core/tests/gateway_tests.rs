mod common;

use common::{closed_port_url, gateway_with, operator_setup};
use slawatch_core::models::Alert;
use slawatch_core::{ConsoleError, RequestOptions};

#[tokio::test]
async fn test_bearer_sent_on_authenticated_calls() {
    let (backend, token, _session, gateway) = operator_setup().await;
    backend.seed_alert("ORD-1", 0.9);

    let alerts: Vec<Alert> = gateway
        .get_json("/alerts", &[("limit", "10".to_string())], &RequestOptions::authenticated())
        .await
        .unwrap();
    assert_eq!(alerts.len(), 1);

    let recorded = backend.requests_to("/alerts");
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].authorization, Some(format!("Bearer {token}")));
    assert_eq!(recorded[0].query.as_deref(), Some("limit=10"));
}

#[tokio::test]
async fn test_public_calls_carry_no_credential() {
    let (backend, _token, session, gateway) = operator_setup().await;
    assert!(session.is_authenticated());

    gateway.probe("/health", &RequestOptions::public()).await.unwrap();
    let recorded = backend.requests_to("/health");
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].authorization, None);
}

#[tokio::test]
async fn test_no_bearer_after_logout() {
    let (backend, _token, session, gateway) = operator_setup().await;
    session.logout().unwrap();

    let err = gateway
        .get_loose("/logs", &[], &RequestOptions::authenticated())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(backend.requests_to("/logs")[0].authorization, None);
}

#[tokio::test]
async fn test_extra_headers_are_forwarded() {
    let (backend, token, _session, gateway) = operator_setup().await;
    let opts = RequestOptions::authenticated().with_header("x-request-source", "console");
    gateway.get_loose("/stats/ops", &[], &opts).await.unwrap();

    let recorded = backend.requests_to("/stats/ops");
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].header("X-Request-Source"), Some("console"));
    assert_eq!(recorded[0].header("authorization"), Some(format!("Bearer {token}").as_str()));

    let public = RequestOptions::public().with_header("x-request-source", "console");
    gateway.probe("/health", &public).await.unwrap();
    let health = &backend.requests_to("/health")[0];
    assert_eq!(health.header("x-request-source"), Some("console"));
    assert_eq!(health.header("authorization"), None);
}

#[tokio::test]
async fn test_non_2xx_is_request_failed() {
    let (backend, _token, _session, gateway) = operator_setup().await;
    backend.fail_next("/alerts", 500);

    let err = gateway
        .get_json::<Vec<Alert>>("/alerts", &[], &RequestOptions::authenticated())
        .await
        .unwrap_err();
    match err {
        ConsoleError::RequestFailed { status, endpoint } => {
            assert_eq!(status, 500);
            assert_eq!(endpoint, "/alerts");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_closed_port_is_unreachable() {
    let url = closed_port_url().await;
    let (_session, gateway) = gateway_with(&url, Some("token"));

    let err = gateway.probe("/health", &RequestOptions::public()).await.unwrap_err();
    assert!(err.is_unreachable(), "got {err}");
}

#[tokio::test]
async fn test_strict_decode_failure_is_malformed() {
    let (backend, _token, _session, gateway) = operator_setup().await;
    backend.set_raw_body("/logs", "{\"rows\": ");

    let err = gateway
        .get_json::<Vec<serde_json::Value>>("/logs", &[], &RequestOptions::authenticated())
        .await
        .unwrap_err();
    assert!(matches!(err, ConsoleError::MalformedResponse { .. }));

    let loose = gateway.get_loose("/logs", &[], &RequestOptions::authenticated()).await.unwrap();
    assert!(loose.is_null());
}
