//! Sends events to the PagerDuty Events API v2.

use super::truncate;
use crate::core::{AlertBatch, NotificationChannelConfig, NotifyContext};
use crate::notification::error::{BuildError, NotifyError, SettingsError, TemplateError};
use crate::notification::registry::FactoryConfig;
use crate::notification::sender::{WebhookMessage, WebhookSender};
use crate::notification::settings::SettingsReader;
use crate::notification::{Base, ChannelType, Notifier, CLIENT_NAME};
use crate::secrets::DecryptFn;
use crate::templates::{TemplateEngine, DEFAULT_MESSAGE_EMBED, DEFAULT_TITLE_EMBED};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

pub const PAGERDUTY_EVENTS_ENDPOINT: &str = "https://events.pagerduty.com/v2/enqueue";

/// PagerDuty rejects longer summaries.
const MAX_SUMMARY_LENGTH: usize = 1024;

const SEVERITIES: [&str; 4] = ["critical", "error", "warning", "info"];

#[derive(Debug, Clone, PartialEq)]
pub struct PagerDutyConfig {
    pub integration_key: String,
    pub severity: String,
    pub class: String,
    pub component: String,
    pub group: String,
    pub summary: String,
    pub source: String,
}

impl PagerDutyConfig {
    pub fn new(
        config: &NotificationChannelConfig,
        decrypt: &DecryptFn,
    ) -> Result<Self, SettingsError> {
        let settings = SettingsReader::new(config, decrypt)?;
        let integration_key = settings.required_secret("integrationKey", "integration key")?;

        Ok(Self {
            integration_key,
            severity: settings.one_of("severity", &SEVERITIES, "critical")?,
            class: settings.string("class"),
            component: settings.string("component"),
            group: settings.string("group"),
            summary: settings.string_or("summary", DEFAULT_TITLE_EMBED),
            source: settings.string_or("source", CLIENT_NAME),
        })
    }
}

pub fn factory(fc: FactoryConfig<'_>) -> Result<Box<dyn Notifier>, BuildError> {
    let config = PagerDutyConfig::new(fc.config, &fc.decrypt).map_err(|e| fc.init_error(e))?;
    let template_errors = fc.check_templates(&[("summary", config.summary.as_str())]);
    Ok(Box::new(PagerDutyNotifier {
        base: Base::new(fc.config, ChannelType::PagerDuty),
        config,
        sender: fc.sender,
        template: fc.template,
        template_errors,
    }))
}

#[derive(Debug, Serialize)]
struct Event {
    routing_key: String,
    dedup_key: String,
    event_action: &'static str,
    payload: EventPayload,
    client: &'static str,
    client_url: String,
    links: Vec<Link>,
}

#[derive(Debug, Serialize)]
struct EventPayload {
    summary: String,
    source: String,
    severity: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    class: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    component: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    group: String,
    custom_details: CustomDetails,
}

#[derive(Debug, Serialize)]
struct CustomDetails {
    firing: String,
    num_firing: String,
    num_resolved: String,
}

#[derive(Debug, Serialize)]
struct Link {
    href: String,
    text: &'static str,
}

pub struct PagerDutyNotifier {
    base: Base,
    config: PagerDutyConfig,
    sender: Arc<dyn WebhookSender>,
    template: Arc<TemplateEngine>,
    template_errors: Vec<TemplateError>,
}

impl PagerDutyNotifier {
    fn build_event(&self, ctx: &NotifyContext, alerts: &AlertBatch) -> Event {
        let mut expander = self.template.expander(ctx, alerts);
        let summary = expander.expand(&self.config.summary);
        let details = expander.expand(DEFAULT_MESSAGE_EMBED);
        let (num_firing, num_resolved) = (expander.data().num_firing, expander.data().num_resolved);
        let (summary, details) = expander.finish((summary, details)).or_warn(&self.base.name);

        let client_url = self.template.external_link("/alerting/list");
        Event {
            routing_key: self.config.integration_key.clone(),
            dedup_key: blake3::hash(ctx.group_key.as_bytes()).to_hex().to_string(),
            event_action: if num_firing > 0 { "trigger" } else { "resolve" },
            payload: EventPayload {
                summary: truncate(&summary, MAX_SUMMARY_LENGTH),
                source: self.config.source.clone(),
                severity: self.config.severity.clone(),
                class: self.config.class.clone(),
                component: self.config.component.clone(),
                group: self.config.group.clone(),
                custom_details: CustomDetails {
                    firing: details,
                    num_firing: num_firing.to_string(),
                    num_resolved: num_resolved.to_string(),
                },
            },
            client: CLIENT_NAME,
            links: vec![Link {
                href: client_url.clone(),
                text: "External URL",
            }],
            client_url,
        }
    }
}

#[async_trait]
impl Notifier for PagerDutyNotifier {
    fn base(&self) -> &Base {
        &self.base
    }

    fn template_errors(&self) -> &[TemplateError] {
        &self.template_errors
    }

    #[instrument(skip_all, fields(receiver = %self.base.name, alerts = alerts.len()))]
    async fn notify(&self, ctx: &NotifyContext, alerts: &AlertBatch) -> Result<bool, NotifyError> {
        let body = serde_json::to_string(&self.build_event(ctx, alerts))?;
        let message = WebhookMessage::post(PAGERDUTY_EVENTS_ENDPOINT, body)
            .with_header("Content-Type", "application/json");

        super::deliver(&self.base, self.sender.as_ref(), ctx, &message).await
    }
}
