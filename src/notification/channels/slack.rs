//! Sends alert batches to Slack, via an incoming webhook or the chat API.

use crate::core::{AlertBatch, NotificationChannelConfig, NotifyContext};
use crate::notification::error::{
    BuildError, ConfigError, NotifyError, SettingsError, TemplateError,
};
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

pub const SLACK_API_ENDPOINT: &str = "https://slack.com/api/chat.postMessage";

const COLOR_FIRING: &str = "#D63232";
const COLOR_RESOLVED: &str = "#36a64f";

#[derive(Debug, Clone, PartialEq)]
pub struct SlackConfig {
    pub url: String,
    pub token: String,
    pub recipient: String,
    pub username: String,
    pub icon_emoji: String,
    pub icon_url: String,
    pub mention_channel: String,
    pub mention_users: Vec<String>,
    pub mention_groups: Vec<String>,
    pub title: String,
    pub text: String,
}

impl SlackConfig {
    pub fn new(
        config: &NotificationChannelConfig,
        decrypt: &DecryptFn,
    ) -> Result<Self, SettingsError> {
        let settings = SettingsReader::new(config, decrypt)?;

        let mut url = settings.secret("url");
        if url.trim().is_empty() {
            url = SLACK_API_ENDPOINT.to_string();
        }
        let token = settings.secret("token");
        let recipient = settings.string("recipient").trim().to_string();
        if url == SLACK_API_ENDPOINT {
            if recipient.is_empty() {
                return Err(ConfigError::MissingField("recipient").into());
            }
            if token.is_empty() {
                return Err(ConfigError::MissingField("token").into());
            }
        }

        Ok(Self {
            url,
            token,
            recipient,
            username: settings.string("username"),
            icon_emoji: settings.string("icon_emoji"),
            icon_url: settings.string("icon_url"),
            mention_channel: settings.one_of("mentionChannel", &["here", "channel"], "")?,
            mention_users: settings.list("mentionUsers"),
            mention_groups: settings.list("mentionGroups"),
            title: settings.string_or("title", DEFAULT_TITLE_EMBED),
            text: settings.string_or("text", DEFAULT_MESSAGE_EMBED),
        })
    }

    /// The mention prefix posted as the message text.
    fn mentions(&self) -> String {
        let mut parts = Vec::new();
        if !self.mention_channel.is_empty() {
            parts.push(format!("<!{0}|{0}>", self.mention_channel));
        }
        parts.extend(self.mention_users.iter().map(|user| format!("<@{user}>")));
        parts.extend(self.mention_groups.iter().map(|group| format!("<!subteam^{group}>")));
        parts.join(" ")
    }
}

pub fn factory(fc: FactoryConfig<'_>) -> Result<Box<dyn Notifier>, BuildError> {
    let config = SlackConfig::new(fc.config, &fc.decrypt).map_err(|e| fc.init_error(e))?;
    let template_errors = fc.check_templates(&[
        ("title", config.title.as_str()),
        ("text", config.text.as_str()),
    ]);
    Ok(Box::new(SlackNotifier {
        base: Base::new(fc.config, ChannelType::Slack),
        config,
        sender: fc.sender,
        template: fc.template,
        template_errors,
    }))
}

#[derive(Debug, Serialize)]
struct SlackMessage {
    #[serde(skip_serializing_if = "String::is_empty")]
    channel: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    icon_emoji: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    icon_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    text: String,
    attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
struct Attachment {
    color: &'static str,
    title: String,
    title_link: String,
    text: String,
    fallback: String,
    footer: &'static str,
    mrkdwn_in: [&'static str; 1],
}

pub struct SlackNotifier {
    base: Base,
    config: SlackConfig,
    sender: Arc<dyn WebhookSender>,
    template: Arc<TemplateEngine>,
    template_errors: Vec<TemplateError>,
}

impl SlackNotifier {
    fn build_message(&self, ctx: &NotifyContext, alerts: &AlertBatch) -> SlackMessage {
        let mut expander = self.template.expander(ctx, alerts);
        let title = expander.expand(&self.config.title);
        let text = expander.expand(&self.config.text);
        let firing = expander.data().status == "firing";
        let (title, text) = expander.finish((title, text)).or_warn(&self.base.name);

        SlackMessage {
            channel: self.config.recipient.clone(),
            username: self.config.username.clone(),
            icon_emoji: self.config.icon_emoji.clone(),
            icon_url: self.config.icon_url.clone(),
            text: self.config.mentions(),
            attachments: vec![Attachment {
                color: if firing { COLOR_FIRING } else { COLOR_RESOLVED },
                fallback: title.clone(),
                title,
                title_link: self.template.external_link("/alerting/list"),
                text,
                footer: CLIENT_NAME,
                mrkdwn_in: ["pretext"],
            }],
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn base(&self) -> &Base {
        &self.base
    }

    fn template_errors(&self) -> &[TemplateError] {
        &self.template_errors
    }

    #[instrument(skip_all, fields(receiver = %self.base.name, alerts = alerts.len()))]
    async fn notify(&self, ctx: &NotifyContext, alerts: &AlertBatch) -> Result<bool, NotifyError> {
        let body = serde_json::to_string(&self.build_message(ctx, alerts))?;

        let mut message = WebhookMessage::post(&self.config.url, body)
            .with_header("Content-Type", "application/json; charset=utf-8");
        if !self.config.token.is_empty() {
            message = message.with_header("Authorization", format!("Bearer {}", self.config.token));
        }

        super::deliver(&self.base, self.sender.as_ref(), ctx, &message).await
    }
}
