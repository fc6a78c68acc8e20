//! Maps channel types to notifier constructors.

use super::channels::{airflow, line, pagerduty, slack, webhook};
use super::error::{BuildError, SettingsError, TemplateError};
use super::sender::WebhookSender;
use super::{ChannelType, Notifier};
use crate::core::NotificationChannelConfig;
use crate::secrets::DecryptFn;
use crate::templates::TemplateEngine;
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a constructor needs. Lives for one factory call.
#[derive(Clone)]
pub struct FactoryConfig<'a> {
    pub config: &'a NotificationChannelConfig,
    pub decrypt: DecryptFn,
    pub sender: Arc<dyn WebhookSender>,
    pub template: Arc<TemplateEngine>,
}

impl FactoryConfig<'_> {
    /// Wraps a settings error with the receiver's name and type.
    pub fn init_error(&self, source: impl Into<SettingsError>) -> BuildError {
        BuildError::ReceiverInit {
            name: self.config.name.clone(),
            kind: self.config.kind.clone(),
            source: source.into(),
        }
    }

    /// Compiles the receiver's custom templates and logs the ones that fail.
    pub fn check_templates(&self, fields: &[(&'static str, &str)]) -> Vec<TemplateError> {
        let errors = TemplateEngine::check_all(fields);
        for error in &errors {
            warn!(
                receiver = %self.config.name,
                error = %error,
                "Receiver template does not compile, notifications will use best-effort content"
            );
        }
        errors
    }
}

pub type Factory = fn(FactoryConfig<'_>) -> Result<Box<dyn Notifier>, BuildError>;

/// Returns the constructor for a channel type.
pub fn factory(kind: ChannelType) -> Factory {
    match kind {
        ChannelType::Airflow => airflow::factory,
        ChannelType::Webhook => webhook::factory,
        ChannelType::Slack => slack::factory,
        ChannelType::PagerDuty => pagerduty::factory,
        ChannelType::Line => line::factory,
    }
}

/// Builds a notifier for the receiver described by `fc.config`.
pub fn build_notifier(fc: FactoryConfig<'_>) -> Result<Box<dyn Notifier>, BuildError> {
    let kind: ChannelType = fc.config.kind.parse()?;
    debug!(receiver = %fc.config.name, kind = %kind, "Building notifier");
    factory(kind)(fc)
}
