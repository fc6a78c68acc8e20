//! Integration tests for configuration loading.

#[path = "../helpers/mod.rs"]
mod helpers;

use alertnotify::cli::Cli;
use alertnotify::config::Config;
use clap::Parser;
use helpers::config_file;
use serial_test::serial;
use std::time::Duration;

const FULL_CONFIG: &str = r#"
log_level = "debug"
external_url = "https://grafana.example.com/"
group_by = ["alertname", "team"]
log_metrics = true

[http]
timeout_seconds = 10
user_agent = "ops-notifier"

[templates]
short = "{{num_firing}} firing"

[[receivers]]
name = "etl"
type = "airflow"
settings = { url = "http://airflow:8080", dagId = "alert_handler", username = "admin" }
secure_settings = { password = "hunter2" }

[[receivers]]
uid = "hook-1"
name = "hook"
type = "webhook"
disable_resolve_message = true
settings = { url = "http://hooks/alert", maxAlerts = 5, title = "{{> short}}" }
"#;

#[test]
#[serial]
fn test_load_full_config() {
    let file = config_file(FULL_CONFIG);

    let config = Config::load_from_path(file.path()).unwrap();

    assert_eq!(config.log_level, "debug");
    assert_eq!(config.external_url, "https://grafana.example.com/");
    assert_eq!(config.http.timeout(), Duration::from_secs(10));
    assert_eq!(config.http.user_agent, "ops-notifier");
    assert_eq!(config.templates["short"], "{{num_firing}} firing");
    assert_eq!(config.group_by, vec!["alertname", "team"]);
    assert!(config.log_metrics);

    let channels = config.channel_configs();
    assert_eq!(channels.len(), 2);
    assert_eq!(channels[0].uid, "etl");
    assert_eq!(channels[0].kind, "airflow");
    assert_eq!(channels[0].settings["dagId"], "alert_handler");
    assert_eq!(channels[0].secure_settings["password"], b"hunter2".to_vec());
    assert_eq!(channels[1].uid, "hook-1");
    assert_eq!(channels[1].settings["maxAlerts"], 5);
    assert!(channels[1].disable_resolve_message);
}

#[test]
#[serial]
fn test_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();

    let config = Config::load_from_path(dir.path().join("absent.toml")).unwrap();

    assert_eq!(config, Config::default());
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let file = config_file(FULL_CONFIG);
    std::env::set_var("ALERTNOTIFY_LOG_LEVEL", "warn");
    std::env::set_var("ALERTNOTIFY_HTTP__TIMEOUT_SECONDS", "3");

    let result = Config::load_from_path(file.path());

    std::env::remove_var("ALERTNOTIFY_LOG_LEVEL");
    std::env::remove_var("ALERTNOTIFY_HTTP__TIMEOUT_SECONDS");
    let config = result.unwrap();
    assert_eq!(config.log_level, "warn");
    assert_eq!(config.http.timeout_seconds, 3);
    assert_eq!(config.http.user_agent, "ops-notifier");
}

#[test]
#[serial]
fn test_cli_arguments_take_precedence() {
    let file = config_file(FULL_CONFIG);
    std::env::set_var("ALERTNOTIFY_EXTERNAL_URL", "https://from-env.example.com/");
    let cli = Cli::parse_from([
        "alertnotify",
        "--config",
        file.path().to_str().unwrap(),
        "--external-url",
        "https://from-cli.example.com/",
        "--timeout",
        "7",
        "validate",
    ]);

    let result = Config::load(&cli);

    std::env::remove_var("ALERTNOTIFY_EXTERNAL_URL");
    let config = result.unwrap();
    assert_eq!(config.external_url, "https://from-cli.example.com/");
    assert_eq!(config.http.timeout_seconds, 7);
    assert_eq!(config.log_level, "debug");
}

#[test]
#[serial]
fn test_receiver_without_type_is_rejected() {
    let file = config_file(
        r#"
[[receivers]]
name = "nameless"
"#,
    );

    assert!(Config::load_from_path(file.path()).is_err());
}
