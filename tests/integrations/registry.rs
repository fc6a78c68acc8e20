//! Integration tests for building notifiers from receiver configuration.

#[path = "../helpers/mod.rs"]
mod helpers;

use alertnotify::notification::{build_notifier, BuildError, ChannelType, SettingsError};
use helpers::{factory_config, receiver};
use serde_json::json;

#[test]
fn test_every_channel_type_builds_from_minimal_settings() {
    let cases = [
        ("airflow", json!({ "url": "http://airflow", "dagId": "d" })),
        ("webhook", json!({ "url": "http://hook" })),
        ("slack", json!({ "url": "https://hooks.slack.com/services/x" })),
        ("pagerduty", json!({ "integrationKey": "key" })),
        ("line", json!({ "token": "tok" })),
    ];
    assert_eq!(cases.len(), ChannelType::ALL.len());

    for (kind, settings) in cases {
        let config = receiver(kind, settings);
        let notifier = build_notifier(factory_config(&config))
            .unwrap_or_else(|e| panic!("{kind} failed to build: {e}"));

        let base = notifier.base();
        assert_eq!(base.kind.as_str(), kind);
        assert_eq!(base.uid, format!("{kind}-uid"));
        assert_eq!(base.name, format!("{kind}_integration"));
        assert!(notifier.send_resolved());
    }
}

#[test]
fn test_unknown_type_is_rejected() {
    let config = receiver("carrier-pigeon", json!({}));

    let err = build_notifier(factory_config(&config)).unwrap_err();

    assert_eq!(err, BuildError::UnsupportedChannelType("carrier-pigeon".to_string()));
}

#[test]
fn test_init_error_names_the_receiver() {
    let config = receiver("webhook", json!({ "httpMethod": "POST" }));

    let err = build_notifier(factory_config(&config)).unwrap_err();

    match &err {
        BuildError::ReceiverInit { name, kind, source } => {
            assert_eq!(name, "webhook_integration");
            assert_eq!(kind, "webhook");
            assert!(matches!(source, SettingsError::Config(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        r#"failed to validate receiver "webhook_integration" of type "webhook": could not find url property in settings"#
    );
}

#[test]
fn test_disable_resolve_message_is_carried_to_the_notifier() {
    let mut config = receiver("webhook", json!({ "url": "http://hook" }));
    config.disable_resolve_message = true;

    let notifier = build_notifier(factory_config(&config)).unwrap();

    assert!(!notifier.send_resolved());
}
