//! Integration tests for fanning a batch out to several receivers over HTTP.

#[path = "../helpers/mod.rs"]
mod helpers;

use alertnotify::{
    core::{Alert, AlertBatch},
    dispatch::{DeliveryOutcome, Dispatcher},
    notification::TransportError,
    secrets::{decrypt_fn, PlaintextDecrypter},
    templates::TemplateEngine,
};
use chrono::{Duration as ChronoDuration, Utc};
use helpers::{context, firing_batch, http_sender, labels, receiver};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn dispatcher(receivers: &[alertnotify::core::NotificationChannelConfig]) -> Dispatcher {
    let (dispatcher, errors) = Dispatcher::from_receivers(
        receivers,
        &decrypt_fn(Arc::new(PlaintextDecrypter)),
        http_sender(),
        Arc::new(TemplateEngine::new("http://localhost:3000").unwrap()),
    );
    assert!(errors.is_empty(), "{errors:?}");
    dispatcher
}

#[tokio::test]
async fn test_one_failing_receiver_does_not_block_others() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let mut broken = receiver("webhook", json!({ "url": format!("{}/broken", server.uri()) }));
    broken.name = "broken".to_string();
    let ok = receiver("webhook", json!({ "url": format!("{}/ok", server.uri()) }));

    let reports = dispatcher(&[broken, ok])
        .dispatch(&context(), &firing_batch(&[("alertname", "alert1")]))
        .await;

    assert_eq!(reports[0].receiver, "broken");
    match &reports[0].outcome {
        DeliveryOutcome::Failed(e) => {
            assert!(matches!(e.transport(), Some(TransportError::Status { status: 500, .. })))
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(matches!(reports[1].outcome, DeliveryOutcome::Delivered));
}

#[tokio::test]
async fn test_resolved_batch_skips_receivers_without_resolve_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut quiet = receiver("webhook", json!({ "url": format!("{}/quiet", server.uri()) }));
    quiet.name = "quiet".to_string();
    quiet.disable_resolve_message = true;
    let loud = receiver("webhook", json!({ "url": format!("{}/loud", server.uri()) }));

    let mut alert = Alert::firing(labels(&[("alertname", "alert1")]));
    alert.ends_at = Some(Utc::now() - ChronoDuration::seconds(30));
    let batch = AlertBatch::new(vec![alert]).unwrap();

    let reports = dispatcher(&[quiet, loud]).dispatch(&context(), &batch).await;

    assert!(matches!(reports[0].outcome, DeliveryOutcome::Suppressed));
    assert!(matches!(reports[1].outcome, DeliveryOutcome::Delivered));
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.path(), "/loud");
}

#[tokio::test]
async fn test_cancellation_aborts_slow_receivers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let slow = receiver("webhook", json!({ "url": server.uri() }));
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let ctx = context().with_cancellation(cancel_rx);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel_tx.send(true).unwrap();
    });

    let reports = dispatcher(&[slow])
        .dispatch(&ctx, &firing_batch(&[("alertname", "alert1")]))
        .await;

    match &reports[0].outcome {
        DeliveryOutcome::Failed(e) => assert_eq!(e.transport(), Some(&TransportError::Cancelled)),
        other => panic!("unexpected outcome: {other:?}"),
    }
}
