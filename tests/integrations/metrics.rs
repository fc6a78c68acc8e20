//! Delivery metrics recorded by the dispatcher.

#[path = "../helpers/mod.rs"]
mod helpers;

use alertnotify::{
    core::{Alert, AlertBatch, NotificationChannelConfig},
    dispatch::Dispatcher,
    recorder::LoggingRecorder,
    secrets::{decrypt_fn, PlaintextDecrypter},
    templates::TemplateEngine,
};
use chrono::{Duration, Utc};
use helpers::{context, firing_batch, http_sender, labels, receiver};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn webhook(name: &str, url: String) -> NotificationChannelConfig {
    let mut config = receiver("webhook", json!({ "url": url }));
    config.name = name.to_string();
    config
}

#[tokio::test]
async fn test_dispatch_counts_every_outcome() {
    let recorder = LoggingRecorder::new();
    metrics::set_global_recorder(recorder.clone()).unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut quiet = webhook("quiet", format!("{}/ok", server.uri()));
    quiet.disable_resolve_message = true;
    let receivers = [
        quiet,
        webhook("loud", format!("{}/ok", server.uri())),
        webhook("broken", format!("{}/broken", server.uri())),
    ];
    let (dispatcher, errors) = Dispatcher::from_receivers(
        &receivers,
        &decrypt_fn(Arc::new(PlaintextDecrypter)),
        http_sender(),
        Arc::new(TemplateEngine::new("http://localhost:3000").unwrap()),
    );
    assert!(errors.is_empty(), "{errors:?}");

    let mut resolved = Alert::firing(labels(&[("alertname", "alert1")]));
    resolved.ends_at = Some(Utc::now() - Duration::minutes(1));
    let resolved = AlertBatch::new(vec![resolved]).unwrap();
    dispatcher.dispatch(&context(), &resolved).await;

    let count = |result: &str| {
        recorder.counter(
            "notifications_total",
            &[("channel", "webhook"), ("result", result)],
        )
    };
    assert_eq!(count("delivered"), 1);
    assert_eq!(count("failed"), 1);
    assert_eq!(count("suppressed"), 1);
    // suppressed deliveries are not timed
    let durations = recorder.histogram("notification_duration_seconds", &[("channel", "webhook")]);
    assert_eq!(durations.len(), 2);

    dispatcher
        .dispatch(&context(), &firing_batch(&[("alertname", "alert1")]))
        .await;

    assert_eq!(count("delivered"), 3);
    assert_eq!(count("failed"), 2);
    assert_eq!(count("suppressed"), 1);
}
