//! Integration tests for the Airflow channel over real HTTP.

#[path = "../helpers/mod.rs"]
mod helpers;

use alertnotify::notification::{build_notifier, NotifyError, TransportError};
use helpers::{context, factory_config, firing_batch, receiver};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_airflow_triggers_dag_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/dags/somedag/dagRuns"))
        .and(header("Content-Type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = receiver("airflow", json!({ "url": server.uri(), "dagId": "somedag" }));
    let notifier = build_notifier(factory_config(&config)).unwrap();

    let ok = notifier
        .notify(&context(), &firing_batch(&[("alertname", "alert1"), ("lbl1", "val1")]))
        .await
        .unwrap();
    assert!(ok);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let trigger = &body["conf"]["trigger"];
    assert_eq!(trigger["client"], "alertnotify");
    assert_eq!(trigger["title"], "[FIRING:1] alert1 (val1)");
    assert_eq!(trigger["client_url"], "http://localhost:3000/alerting/list");
    assert!(body.get("dag_run_id").is_none());
}

#[tokio::test]
async fn test_airflow_trailing_slash_and_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/dags/etl/dagRuns"))
        // "admin:secret"
        .and(header("Authorization", "Basic YWRtaW46c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = receiver(
        "airflow",
        json!({ "url": format!("{}/", server.uri()), "dagId": "etl", "username": "admin" }),
    );
    config
        .secure_settings
        .insert("password".to_string(), b"secret".to_vec());
    let notifier = build_notifier(factory_config(&config)).unwrap();

    assert!(notifier
        .notify(&context(), &firing_batch(&[("alertname", "alert1")]))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_airflow_missing_dag_id_never_sends() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = receiver("airflow", json!({ "url": server.uri() }));
    let err = build_notifier(factory_config(&config)).unwrap_err();

    assert!(err.to_string().contains("DAG ID"), "{err}");
}

#[tokio::test]
async fn test_airflow_error_status_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("scheduler down"))
        .mount(&server)
        .await;

    let config = receiver("airflow", json!({ "url": server.uri(), "dagId": "somedag" }));
    let notifier = build_notifier(factory_config(&config)).unwrap();

    let err = notifier
        .notify(&context(), &firing_batch(&[("alertname", "alert1")]))
        .await
        .unwrap_err();

    match err {
        NotifyError::Transport(TransportError::Status { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "scheduler down");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
