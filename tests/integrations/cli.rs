//! End-to-end tests for the `alertnotify` binary.

#[path = "../helpers/mod.rs"]
mod helpers;

use assert_cmd::Command;
use helpers::config_file;
use predicates::prelude::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn alertnotify() -> Command {
    let mut cmd = Command::cargo_bin("alertnotify").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_validate_succeeds_for_valid_receivers() {
    let file = config_file(
        r#"
[[receivers]]
name = "etl"
type = "airflow"
settings = { url = "http://airflow:8080", dagId = "alert_handler" }
"#,
    );

    alertnotify()
        .args(["--config", file.path().to_str().unwrap(), "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok    etl (airflow)"));
}

#[test]
fn test_validate_fails_for_invalid_receivers() {
    let file = config_file(
        r#"
[[receivers]]
name = "etl"
type = "airflow"
settings = { url = "http://airflow:8080" }

[[receivers]]
name = "mystery"
type = "fax"
"#,
    );

    alertnotify()
        .args(["--config", file.path().to_str().unwrap(), "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            r#"failed to validate receiver "etl" of type "airflow": could not find DAG ID property in settings"#,
        ))
        .stderr(predicate::str::contains(r#"unsupported channel type: "fax""#));
}

#[test]
fn test_validate_reports_templates_that_do_not_compile() {
    let file = config_file(
        r#"
[[receivers]]
name = "hook"
type = "webhook"
settings = { url = "http://localhost/hook", title = "{{#if firing}}unclosed" }
"#,
    );

    alertnotify()
        .args(["--config", file.path().to_str().unwrap(), "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("warn  hook (webhook): invalid template in title: "))
        .stdout(predicate::str::contains("ok    hook").not());
}

#[test]
fn test_unreadable_config_fails() {
    let file = config_file("receivers = 12");

    alertnotify()
        .args(["--config", file.path().to_str().unwrap(), "validate"])
        .assert()
        .failure();
}

#[tokio::test]
async fn test_send_posts_alerts_from_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/dags/handler/dagRuns"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_file(&format!(
        r#"
[[receivers]]
name = "etl"
type = "airflow"
settings = {{ url = "{}", dagId = "handler" }}
"#,
        server.uri()
    ));
    let dir = tempfile::tempdir().unwrap();
    let alerts = dir.path().join("alerts.json");
    std::fs::write(
        &alerts,
        r#"[{"labels": {"alertname": "DiskFull"}, "starts_at": "2024-05-01T12:00:00Z"}]"#,
    )
    .unwrap();

    let config_path = config.path().to_path_buf();
    let output = tokio::task::spawn_blocking(move || {
        alertnotify()
            .args(["--config", config_path.to_str().unwrap(), "send", "--alerts"])
            .arg(&alerts)
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "{output:?}");
    assert!(String::from_utf8_lossy(&output.stdout).contains("sent  etl (airflow)"));
}

#[tokio::test]
async fn test_test_command_reports_delivery_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = config_file(&format!(
        r#"
[[receivers]]
name = "hook"
type = "webhook"
settings = {{ url = "{}/hook" }}
"#,
        server.uri()
    ));

    let config_path = config.path().to_path_buf();
    let output = tokio::task::spawn_blocking(move || {
        alertnotify()
            .args(["--config", config_path.to_str().unwrap(), "test"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("FAIL  hook (webhook)"));
}
