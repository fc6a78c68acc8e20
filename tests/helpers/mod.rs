#![allow(dead_code)]

use alertnotify::{
    core::{Alert, AlertBatch, Labels, NotificationChannelConfig, NotifyContext},
    notification::{FactoryConfig, HttpWebhookSender, WebhookSender},
    secrets::{decrypt_fn, PlaintextDecrypter},
    templates::TemplateEngine,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

pub fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn firing_batch(pairs: &[(&str, &str)]) -> AlertBatch {
    AlertBatch::new(vec![Alert::firing(labels(pairs))]).unwrap()
}

/// The context the router hands to notifiers for a group of `alert1` alerts.
pub fn context() -> NotifyContext {
    NotifyContext::new(
        r#"{}:{alertname="alert1"}"#,
        labels(&[("alertname", "alert1")]),
    )
    .with_receiver("integration")
}

pub fn receiver(kind: &str, settings: serde_json::Value) -> NotificationChannelConfig {
    NotificationChannelConfig {
        uid: format!("{kind}-uid"),
        name: format!("{kind}_integration"),
        kind: kind.to_string(),
        settings,
        ..Default::default()
    }
}

pub fn http_sender() -> Arc<dyn WebhookSender> {
    Arc::new(HttpWebhookSender::new(Duration::from_secs(5), "alertnotify-tests").unwrap())
}

/// Factory inputs that send over real HTTP.
pub fn factory_config(config: &NotificationChannelConfig) -> FactoryConfig<'_> {
    FactoryConfig {
        config,
        decrypt: decrypt_fn(Arc::new(PlaintextDecrypter)),
        sender: http_sender(),
        template: Arc::new(TemplateEngine::new("http://localhost:3000/").unwrap()),
    }
}

/// Writes `content` to a temporary TOML file that lives as long as the handle.
pub fn config_file(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(file, "{}", content).unwrap();
    file
}
