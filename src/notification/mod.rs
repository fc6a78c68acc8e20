//! Delivery of alert batches to third-party integrations.
//!
//! Every integration is a `Notifier` built once per receiver by the
//! `registry`. A notifier owns an immutable, already-validated config and
//! shares the template engine and webhook sender with every other notifier.
pub mod channels;
pub mod error;
pub mod registry;
pub mod sender;
pub mod settings;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::core::{AlertBatch, NotificationChannelConfig, NotifyContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use error::{
    BuildError, ConfigError, NotifyError, SettingsError, TemplateError, TransportError,
    ValidationError,
};
pub use registry::{build_notifier, factory, FactoryConfig};
pub use sender::{HttpWebhookSender, WebhookMessage, WebhookSender};

/// Name reported to integrations as the notification client.
pub const CLIENT_NAME: &str = "alertnotify";

/// The closed set of supported integrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Airflow,
    Webhook,
    Slack,
    PagerDuty,
    Line,
}

impl ChannelType {
    pub const ALL: [ChannelType; 5] = [
        ChannelType::Airflow,
        ChannelType::Webhook,
        ChannelType::Slack,
        ChannelType::PagerDuty,
        ChannelType::Line,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Airflow => "airflow",
            ChannelType::Webhook => "webhook",
            ChannelType::Slack => "slack",
            ChannelType::PagerDuty => "pagerduty",
            ChannelType::Line => "line",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelType {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChannelType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| BuildError::UnsupportedChannelType(s.to_string()))
    }
}

/// Receiver identity shared by every notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base {
    pub uid: String,
    pub name: String,
    pub kind: ChannelType,
    pub disable_resolve_message: bool,
}

impl Base {
    pub fn new(config: &NotificationChannelConfig, kind: ChannelType) -> Self {
        Self {
            uid: config.uid.clone(),
            name: config.name.clone(),
            kind,
            disable_resolve_message: config.disable_resolve_message,
        }
    }
}

/// Delivers alert batches for one receiver.
///
/// Implementations hold no per-call mutable state, so one instance may be
/// called concurrently for independent batches.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn base(&self) -> &Base;

    /// Renders and delivers the whole batch in a single request.
    ///
    /// # Returns
    /// * `Ok(true)` once the integration accepted the batch
    /// * `Err(NotifyError::Transport)` carrying the sender's error unchanged
    async fn notify(&self, ctx: &NotifyContext, alerts: &AlertBatch)
        -> Result<bool, NotifyError>;

    /// Custom templates that failed to compile when the notifier was built.
    /// Delivery still goes ahead with best-effort content.
    fn template_errors(&self) -> &[TemplateError] {
        &[]
    }

    /// Whether resolved-only batches should be delivered at all.
    fn send_resolved(&self) -> bool {
        !self.base().disable_resolve_message
    }
}

impl fmt::Debug for dyn Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = self.base();
        f.debug_struct("Notifier")
            .field("uid", &base.uid)
            .field("name", &base.name)
            .field("type", &base.kind)
            .finish()
    }
}
