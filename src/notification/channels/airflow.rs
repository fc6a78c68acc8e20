//! Triggers an Apache Airflow DAG run for every alert batch.

use crate::core::{AlertBatch, NotificationChannelConfig, NotifyContext};
use crate::notification::error::{BuildError, NotifyError, SettingsError};
use crate::notification::registry::FactoryConfig;
use crate::notification::sender::{WebhookMessage, WebhookSender};
use crate::notification::settings::SettingsReader;
use crate::notification::{Base, ChannelType, Notifier, CLIENT_NAME};
use crate::secrets::DecryptFn;
use crate::templates::{TemplateEngine, DEFAULT_MESSAGE_EMBED, DEFAULT_TITLE_EMBED};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct AirflowConfig {
    pub url: String,
    pub dag_id: String,
    pub user: String,
    pub password: String,
    pub run_id: String,
    pub logical_date: String,
    pub state: String,
    /// Extra DAG run configuration merged into `conf`.
    pub conf: Map<String, Value>,
}

impl AirflowConfig {
    pub fn new(
        config: &NotificationChannelConfig,
        decrypt: &DecryptFn,
    ) -> Result<Self, SettingsError> {
        let settings = SettingsReader::new(config, decrypt)?;
        let dag_id = settings.required("dagId", "DAG ID")?;
        let url = settings.required("url", "url")?;

        Ok(Self {
            url,
            dag_id,
            user: settings.string("username"),
            password: settings.secret("password"),
            run_id: settings.string("runId"),
            logical_date: settings.string("logicalDate"),
            state: settings.string("state"),
            conf: parse_conf(&settings.string("conf")),
        })
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/api/v1/dags/{}/dagRuns",
            self.url.trim_end_matches('/'),
            self.dag_id
        )
    }
}

/// Parses the custom `conf` setting. Single quotes are accepted in place of
/// double quotes; anything that is not a JSON object yields an empty map.
fn parse_conf(raw: &str) -> Map<String, Value> {
    if raw.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(&raw.replace('\'', "\"")) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            warn!("Airflow conf is not a JSON object, ignoring it");
            Map::new()
        }
        Err(e) => {
            warn!(error = %e, "Failed to parse Airflow conf, ignoring it");
            Map::new()
        }
    }
}

pub fn factory(fc: FactoryConfig<'_>) -> Result<Box<dyn Notifier>, BuildError> {
    let config = AirflowConfig::new(fc.config, &fc.decrypt).map_err(|e| fc.init_error(e))?;
    Ok(Box::new(AirflowNotifier::new(
        Base::new(fc.config, ChannelType::Airflow),
        config,
        fc.sender,
        fc.template,
    )))
}

pub struct AirflowNotifier {
    base: Base,
    config: AirflowConfig,
    sender: Arc<dyn WebhookSender>,
    template: Arc<TemplateEngine>,
}

impl AirflowNotifier {
    pub fn new(
        base: Base,
        config: AirflowConfig,
        sender: Arc<dyn WebhookSender>,
        template: Arc<TemplateEngine>,
    ) -> Self {
        Self {
            base,
            config,
            sender,
            template,
        }
    }

    fn build_body(&self, ctx: &NotifyContext, alerts: &AlertBatch) -> Value {
        let mut expander = self.template.expander(ctx, alerts);
        let title = expander.expand(DEFAULT_TITLE_EMBED);
        let description = expander.expand(DEFAULT_MESSAGE_EMBED);
        let (title, description) = expander.finish((title, description)).or_warn(&self.base.name);

        let mut conf = self.config.conf.clone();
        conf.insert(
            "trigger".to_string(),
            json!({
                "client": CLIENT_NAME,
                "client_url": self.template.external_link("/alerting/list"),
                "description": description,
                "title": title,
            }),
        );

        let mut body = Map::new();
        for (key, value) in [
            ("dag_run_id", &self.config.run_id),
            ("logical_date", &self.config.logical_date),
            ("state", &self.config.state),
        ] {
            if !value.is_empty() {
                body.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        body.insert("conf".to_string(), Value::Object(conf));
        Value::Object(body)
    }
}

#[async_trait]
impl Notifier for AirflowNotifier {
    fn base(&self) -> &Base {
        &self.base
    }

    #[instrument(skip_all, fields(receiver = %self.base.name, alerts = alerts.len()))]
    async fn notify(&self, ctx: &NotifyContext, alerts: &AlertBatch) -> Result<bool, NotifyError> {
        debug!("Executing Airflow notification");
        let body = serde_json::to_string(&self.build_body(ctx, alerts))?;

        let message = WebhookMessage::post(self.config.endpoint(), body)
            .with_header("Content-Type", "application/json")
            .with_header("Accept", "application/json")
            .with_basic_auth(&self.config.user, &self.config.password);

        super::deliver(&self.base, self.sender.as_ref(), ctx, &message).await
    }
}
