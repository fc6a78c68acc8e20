//! Posts the alertmanager-style webhook payload to an arbitrary endpoint.

use crate::core::{AlertBatch, Labels, NotificationChannelConfig, NotifyContext};
use crate::notification::error::{
    BuildError, NotifyError, SettingsError, TemplateError, ValidationError,
};
use crate::notification::registry::FactoryConfig;
use crate::notification::sender::{WebhookMessage, WebhookSender};
use crate::notification::settings::SettingsReader;
use crate::notification::{Base, ChannelType, Notifier};
use crate::secrets::DecryptFn;
use crate::templates::{AlertData, TemplateEngine, DEFAULT_MESSAGE_EMBED, DEFAULT_TITLE_EMBED};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookConfig {
    pub url: String,
    pub http_method: String,
    pub user: String,
    pub password: String,
    pub authorization_scheme: String,
    pub authorization_credentials: String,
    /// 0 means no limit.
    pub max_alerts: usize,
    pub title: String,
    pub message: String,
}

impl WebhookConfig {
    pub fn new(
        config: &NotificationChannelConfig,
        decrypt: &DecryptFn,
    ) -> Result<Self, SettingsError> {
        let settings = SettingsReader::new(config, decrypt)?;
        let url = settings.required("url", "url")?;
        let http_method = settings.one_of("httpMethod", &["POST", "PUT"], "POST")?;
        let max_alerts = settings.u64("maxAlerts")?.unwrap_or(0) as usize;

        let user = settings.string("username");
        let password = settings.secret("password");
        let authorization_credentials = settings.secret("authorization_credentials");
        if !user.is_empty() && !authorization_credentials.is_empty() {
            return Err(ValidationError::new(
                "authorization_credentials",
                "both HTTP Basic Authentication and Authorization Header are set, only 1 is permitted",
            )
            .into());
        }

        Ok(Self {
            url,
            http_method,
            user,
            password,
            authorization_scheme: settings.string_or("authorization_scheme", "Bearer"),
            authorization_credentials,
            max_alerts,
            title: settings.string_or("title", DEFAULT_TITLE_EMBED),
            message: settings.string_or("message", DEFAULT_MESSAGE_EMBED),
        })
    }
}

pub fn factory(fc: FactoryConfig<'_>) -> Result<Box<dyn Notifier>, BuildError> {
    let config = WebhookConfig::new(fc.config, &fc.decrypt).map_err(|e| fc.init_error(e))?;
    let template_errors = fc.check_templates(&[
        ("title", config.title.as_str()),
        ("message", config.message.as_str()),
    ]);
    Ok(Box::new(WebhookNotifier {
        base: Base::new(fc.config, ChannelType::Webhook),
        config,
        sender: fc.sender,
        template: fc.template,
        template_errors,
    }))
}

/// Wire shape of the webhook body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload {
    receiver: String,
    status: &'static str,
    alerts: Vec<PayloadAlert>,
    group_labels: Labels,
    common_labels: Labels,
    common_annotations: Labels,
    #[serde(rename = "externalURL")]
    external_url: String,
    version: &'static str,
    group_key: String,
    truncated_alerts: usize,
    title: String,
    state: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PayloadAlert {
    status: &'static str,
    labels: Labels,
    annotations: Labels,
    starts_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ends_at: Option<String>,
    #[serde(rename = "generatorURL", skip_serializing_if = "Option::is_none")]
    generator_url: Option<String>,
    fingerprint: String,
}

impl From<AlertData> for PayloadAlert {
    fn from(alert: AlertData) -> Self {
        Self {
            status: alert.status,
            labels: alert.labels,
            annotations: alert.annotations,
            starts_at: alert.starts_at,
            ends_at: alert.ends_at,
            generator_url: alert.generator_url,
            fingerprint: alert.fingerprint,
        }
    }
}

pub struct WebhookNotifier {
    base: Base,
    config: WebhookConfig,
    sender: Arc<dyn WebhookSender>,
    template: Arc<TemplateEngine>,
    template_errors: Vec<TemplateError>,
}

impl WebhookNotifier {
    fn build_payload(&self, ctx: &NotifyContext, alerts: &AlertBatch) -> WebhookPayload {
        let mut expander = self.template.expander(ctx, alerts);
        let title = expander.expand(&self.config.title);
        let message = expander.expand(&self.config.message);
        let data = expander.data().clone();
        let (title, message) = expander.finish((title, message)).or_warn(&self.base.name);

        let mut payload_alerts: Vec<PayloadAlert> =
            data.alerts.into_iter().map(Into::into).collect();
        let mut truncated_alerts = 0;
        if self.config.max_alerts > 0 && payload_alerts.len() > self.config.max_alerts {
            truncated_alerts = payload_alerts.len() - self.config.max_alerts;
            payload_alerts.truncate(self.config.max_alerts);
        }

        WebhookPayload {
            receiver: self.base.name.clone(),
            status: data.status,
            alerts: payload_alerts,
            group_labels: data.group_labels,
            common_labels: data.common_labels,
            common_annotations: data.common_annotations,
            external_url: data.external_url,
            version: "1",
            group_key: data.group_key,
            truncated_alerts,
            title,
            state: if data.status == "firing" { "alerting" } else { "ok" },
            message,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn base(&self) -> &Base {
        &self.base
    }

    fn template_errors(&self) -> &[TemplateError] {
        &self.template_errors
    }

    #[instrument(skip_all, fields(receiver = %self.base.name, alerts = alerts.len()))]
    async fn notify(&self, ctx: &NotifyContext, alerts: &AlertBatch) -> Result<bool, NotifyError> {
        let body = serde_json::to_string(&self.build_payload(ctx, alerts))?;

        let mut message = WebhookMessage::post(&self.config.url, body)
            .with_header("Content-Type", "application/json")
            .with_basic_auth(&self.config.user, &self.config.password);
        message.method = self.config.http_method.clone();
        if !self.config.authorization_credentials.is_empty() {
            message = message.with_header(
                "Authorization",
                format!(
                    "{} {}",
                    self.config.authorization_scheme, self.config.authorization_credentials
                ),
            );
        }

        super::deliver(&self.base, self.sender.as_ref(), ctx, &message).await
    }
}
