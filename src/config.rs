//! Configuration management for alertnotify
//!
//! Settings are layered with `figment`: built-in defaults, an optional
//! `alertnotify.toml` file, `ALERTNOTIFY_` environment variables (nested
//! keys separated by `__`), and finally command-line arguments.

use crate::cli::Cli;
use crate::core::NotificationChannelConfig;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "alertnotify.toml";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level, used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Base URL used for links back to the alerting UI.
    pub external_url: String,
    pub http: HttpConfig,
    /// Labels alerts are grouped by when sent from the command line.
    #[serde(default = "default_group_by")]
    pub group_by: Vec<String>,
    /// Log a snapshot of the delivery metrics before exiting.
    #[serde(default)]
    pub log_metrics: bool,
    /// Operator-defined named templates, usable as `{{> name}}`.
    #[serde(default)]
    pub templates: BTreeMap<String, String>,
    #[serde(default)]
    pub receivers: Vec<ReceiverConfig>,
}

/// Outbound HTTP settings shared by every receiver.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// One configured receiver as written in the config file.
///
/// Secure settings are given in plain text here and pass through the
/// configured `SecretsDecrypter` when the receiver is built.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ReceiverConfig {
    #[serde(default)]
    pub uid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "empty_settings")]
    pub settings: serde_json::Value,
    #[serde(default)]
    pub secure_settings: BTreeMap<String, String>,
    #[serde(default)]
    pub disable_resolve_message: bool,
}

fn default_group_by() -> Vec<String> {
    vec!["alertname".to_string()]
}

fn empty_settings() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

impl From<&ReceiverConfig> for NotificationChannelConfig {
    fn from(receiver: &ReceiverConfig) -> Self {
        let uid = if receiver.uid.is_empty() {
            receiver.name.clone()
        } else {
            receiver.uid.clone()
        };
        Self {
            uid,
            name: receiver.name.clone(),
            kind: receiver.kind.clone(),
            settings: receiver.settings.clone(),
            secure_settings: receiver
                .secure_settings
                .iter()
                .map(|(k, v)| (k.clone(), v.clone().into_bytes()))
                .collect(),
            disable_resolve_message: receiver.disable_resolve_message,
        }
    }
}

impl Config {
    /// Loads the configuration by layering defaults, the TOML file,
    /// environment variables and CLI arguments.
    pub fn load(cli: &Cli) -> Result<Self, figment::Error> {
        let path = cli
            .config
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Self::figment(path).merge(cli.clone()).extract()
    }

    /// Loads the configuration from a file and the environment only.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Self::figment(path.as_ref()).extract()
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            // e.g. ALERTNOTIFY_HTTP__TIMEOUT_SECONDS=5
            .merge(Env::prefixed("ALERTNOTIFY_").split("__"))
    }

    /// Receivers converted to the channel configuration notifiers are
    /// built from.
    pub fn channel_configs(&self) -> Vec<NotificationChannelConfig> {
        self.receivers.iter().map(Into::into).collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            external_url: "http://localhost:3000/".to_string(),
            http: HttpConfig {
                timeout_seconds: 30,
                user_agent: format!("alertnotify/{}", env!("CARGO_PKG_VERSION")),
            },
            group_by: default_group_by(),
            log_metrics: false,
            templates: BTreeMap::new(),
            receivers: Vec::new(),
        }
    }
}
