//! Sends form-encoded messages to LINE Notify.

use crate::core::{AlertBatch, NotificationChannelConfig, NotifyContext};
use crate::notification::error::{BuildError, NotifyError, SettingsError, TemplateError};
use crate::notification::registry::FactoryConfig;
use crate::notification::sender::{WebhookMessage, WebhookSender};
use crate::notification::settings::SettingsReader;
use crate::notification::{Base, ChannelType, Notifier};
use crate::secrets::DecryptFn;
use crate::templates::{TemplateEngine, DEFAULT_MESSAGE_EMBED, DEFAULT_TITLE_EMBED};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;
use url::form_urlencoded;

pub const LINE_NOTIFY_ENDPOINT: &str = "https://notify-api.line.me/api/notify";

#[derive(Debug, Clone, PartialEq)]
pub struct LineConfig {
    pub token: String,
    pub title: String,
    pub description: String,
}

impl LineConfig {
    pub fn new(
        config: &NotificationChannelConfig,
        decrypt: &DecryptFn,
    ) -> Result<Self, SettingsError> {
        let settings = SettingsReader::new(config, decrypt)?;
        Ok(Self {
            token: settings.required_secret("token", "token")?,
            title: settings.string_or("title", DEFAULT_TITLE_EMBED),
            description: settings.string_or("description", DEFAULT_MESSAGE_EMBED),
        })
    }
}

pub fn factory(fc: FactoryConfig<'_>) -> Result<Box<dyn Notifier>, BuildError> {
    let config = LineConfig::new(fc.config, &fc.decrypt).map_err(|e| fc.init_error(e))?;
    let template_errors = fc.check_templates(&[
        ("title", config.title.as_str()),
        ("description", config.description.as_str()),
    ]);
    Ok(Box::new(LineNotifier {
        base: Base::new(fc.config, ChannelType::Line),
        config,
        sender: fc.sender,
        template: fc.template,
        template_errors,
    }))
}

pub struct LineNotifier {
    base: Base,
    config: LineConfig,
    sender: Arc<dyn WebhookSender>,
    template: Arc<TemplateEngine>,
    template_errors: Vec<TemplateError>,
}

impl LineNotifier {
    fn build_form(&self, ctx: &NotifyContext, alerts: &AlertBatch) -> String {
        let mut expander = self.template.expander(ctx, alerts);
        let title = expander.expand(&self.config.title);
        let description = expander.expand(&self.config.description);
        let (title, description) = expander.finish((title, description)).or_warn(&self.base.name);

        let text = format!(
            "{}\n{}\n\n{}",
            title,
            self.template.external_link("/alerting/list"),
            description
        );
        form_urlencoded::Serializer::new(String::new())
            .append_pair("message", &text)
            .finish()
    }
}

#[async_trait]
impl Notifier for LineNotifier {
    fn base(&self) -> &Base {
        &self.base
    }

    fn template_errors(&self) -> &[TemplateError] {
        &self.template_errors
    }

    #[instrument(skip_all, fields(receiver = %self.base.name, alerts = alerts.len()))]
    async fn notify(&self, ctx: &NotifyContext, alerts: &AlertBatch) -> Result<bool, NotifyError> {
        let message = WebhookMessage::post(LINE_NOTIFY_ENDPOINT, self.build_form(ctx, alerts))
            .with_header("Content-Type", "application/x-www-form-urlencoded;charset=UTF-8")
            .with_header("Authorization", format!("Bearer {}", self.config.token));

        super::deliver(&self.base, self.sender.as_ref(), ctx, &message).await
    }
}
