//! The application logic behind the CLI commands, decoupled from the entry point.

use crate::{
    config::Config,
    core::{Alert, AlertBatch, Labels, NotifyContext},
    dispatch::{DeliveryReport, Dispatcher},
    notification::{BuildError, HttpWebhookSender, Notifier, WebhookSender, CLIENT_NAME},
    secrets::{decrypt_fn, PlaintextDecrypter, SecretsDecrypter},
    templates::TemplateEngine,
};
use anyhow::{bail, Context, Result};
use std::{path::Path, sync::Arc};
use tokio::sync::watch;
use tracing::{debug, info};

/// Every configured receiver, built and ready to notify.
pub struct App {
    dispatcher: Dispatcher,
    build_errors: Vec<BuildError>,
    group_by: Vec<String>,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl App {
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    pub fn notifiers(&self) -> &[Arc<dyn Notifier>] {
        self.dispatcher.notifiers()
    }

    /// Receivers that could not be built from their configuration.
    pub fn build_errors(&self) -> &[BuildError] {
        &self.build_errors
    }

    /// Sends a synthetic firing alert to the selected receivers.
    pub async fn test_receivers(&mut self, receivers: &[String]) -> Result<Vec<DeliveryReport>> {
        let mut alert = Alert::firing(Labels::from([
            ("alertname".to_string(), "TestAlert".to_string()),
            ("instance".to_string(), CLIENT_NAME.to_string()),
        ]));
        alert
            .annotations
            .insert("summary".to_string(), "Notification test".to_string());

        self.send(vec![alert], receivers, None).await
    }

    /// Sends one batch of alerts to the selected receivers.
    pub async fn send(
        &mut self,
        alerts: Vec<Alert>,
        receivers: &[String],
        group_key: Option<String>,
    ) -> Result<Vec<DeliveryReport>> {
        let batch = AlertBatch::new(alerts).context("nothing to send")?;
        self.select_receivers(receivers)?;

        let group_labels = group_labels(&batch, &self.group_by);
        let group_key = group_key.unwrap_or_else(|| default_group_key(&group_labels));
        let mut ctx = NotifyContext::new(group_key, group_labels);
        if let Some(cancel_rx) = &self.cancel_rx {
            ctx = ctx.with_cancellation(cancel_rx.clone());
        }

        info!(
            alerts = batch.len(),
            receivers = self.notifiers().len(),
            "Sending notifications"
        );
        Ok(self.dispatcher.dispatch(&ctx, &batch).await)
    }

    fn select_receivers(&mut self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        for name in names {
            if !self.notifiers().iter().any(|n| n.base().name == *name) {
                bail!("no usable receiver named {name:?}");
            }
        }
        self.dispatcher.retain_receivers(names);
        Ok(())
    }
}

/// Reads a JSON array of alerts.
pub fn read_alerts(path: &Path) -> Result<Vec<Alert>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read alerts from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid alerts file {}", path.display()))
}

/// Labels shared by every alert in the batch, limited to `group_by`.
pub fn group_labels(batch: &AlertBatch, group_by: &[String]) -> Labels {
    batch
        .common_labels()
        .into_iter()
        .filter(|(name, _)| group_by.contains(name))
        .collect()
}

/// A group key in the `{}:{label="value",...}` form used by the router.
pub fn default_group_key(group_labels: &Labels) -> String {
    let pairs: Vec<String> = group_labels
        .iter()
        .map(|(k, v)| format!("{k}={v:?}"))
        .collect();
    format!("{{}}:{{{}}}", pairs.join(","))
}

pub struct AppBuilder {
    config: Config,
    sender: Option<Arc<dyn WebhookSender>>,
    decrypter: Option<Arc<dyn SecretsDecrypter>>,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl AppBuilder {
    fn new(config: Config) -> Self {
        Self {
            config,
            sender: None,
            decrypter: None,
            cancel_rx: None,
        }
    }

    /// Replaces the HTTP sender, e.g. with a recording fake.
    pub fn webhook_sender(mut self, sender: Arc<dyn WebhookSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn decrypter(mut self, decrypter: Arc<dyn SecretsDecrypter>) -> Self {
        self.decrypter = Some(decrypter);
        self
    }

    /// In-flight requests are aborted once `true` is sent on this channel.
    pub fn cancellation(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn build(self) -> Result<App> {
        let config = self.config;
        let template = TemplateEngine::with_templates(&config.external_url, &config.templates)
            .context("failed to set up templates")?;
        let sender = match self.sender {
            Some(sender) => sender,
            None => Arc::new(
                HttpWebhookSender::new(config.http.timeout(), &config.http.user_agent)
                    .context("failed to build HTTP client")?,
            ),
        };
        let decrypter = self
            .decrypter
            .unwrap_or_else(|| Arc::new(PlaintextDecrypter));

        let receivers = config.channel_configs();
        debug!(count = receivers.len(), "Building receivers");
        let (dispatcher, build_errors) = Dispatcher::from_receivers(
            &receivers,
            &decrypt_fn(decrypter),
            sender,
            Arc::new(template),
        );

        Ok(App {
            dispatcher,
            build_errors,
            group_by: config.group_by,
            cancel_rx: self.cancel_rx,
        })
    }
}
