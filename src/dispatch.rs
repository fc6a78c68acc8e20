//! Fans one alert batch out to every configured receiver.
//!
//! The dispatcher is the calling side of the notifier contract: it applies
//! resolve suppression, runs notifiers concurrently and records the outcome.
//! It does not retry; a failed delivery is reported and left to the caller.

use crate::core::{AlertBatch, NotificationChannelConfig, NotifyContext};
use crate::notification::{
    build_notifier, BuildError, ChannelType, FactoryConfig, Notifier, NotifyError, WebhookSender,
};
use crate::secrets::DecryptFn;
use crate::templates::TemplateEngine;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

/// What happened to one receiver during a dispatch.
#[derive(Debug)]
pub enum DeliveryOutcome {
    Delivered,
    /// Resolved-only batch for a receiver that disables resolve messages.
    Suppressed,
    Failed(NotifyError),
}

#[derive(Debug)]
pub struct DeliveryReport {
    pub receiver: String,
    pub kind: ChannelType,
    pub outcome: DeliveryOutcome,
}

impl DeliveryReport {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, DeliveryOutcome::Failed(_))
    }
}

pub struct Dispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    /// Builds a notifier for every receiver. Receivers that fail to build are
    /// returned as errors and left out of the dispatcher.
    pub fn from_receivers(
        receivers: &[NotificationChannelConfig],
        decrypt: &DecryptFn,
        sender: Arc<dyn WebhookSender>,
        template: Arc<TemplateEngine>,
    ) -> (Self, Vec<BuildError>) {
        let mut notifiers = Vec::with_capacity(receivers.len());
        let mut errors = Vec::new();
        for config in receivers {
            let fc = FactoryConfig {
                config,
                decrypt: decrypt.clone(),
                sender: sender.clone(),
                template: template.clone(),
            };
            match build_notifier(fc) {
                Ok(notifier) => notifiers.push(Arc::from(notifier)),
                Err(e) => {
                    error!(receiver = %config.name, error = %e, "Skipping receiver");
                    errors.push(e);
                }
            }
        }
        (Self::new(notifiers), errors)
    }

    pub fn notifiers(&self) -> &[Arc<dyn Notifier>] {
        &self.notifiers
    }

    /// Keeps only the receivers whose names are listed.
    pub fn retain_receivers(&mut self, names: &[String]) {
        self.notifiers
            .retain(|notifier| names.iter().any(|name| *name == notifier.base().name));
    }

    /// Sends the batch to every notifier concurrently.
    #[instrument(skip_all, fields(group_key = %ctx.group_key, alerts = alerts.len()))]
    pub async fn dispatch(&self, ctx: &NotifyContext, alerts: &AlertBatch) -> Vec<DeliveryReport> {
        let resolved_only = alerts.all_resolved();
        let deliveries = self.notifiers.iter().map(|notifier| async move {
            let base = notifier.base();
            let outcome = if resolved_only && !notifier.send_resolved() {
                info!(receiver = %base.name, "Resolve message disabled, not sending");
                DeliveryOutcome::Suppressed
            } else {
                let ctx = ctx.clone().with_receiver(base.name.clone());
                let start = Instant::now();
                let result = notifier.notify(&ctx, alerts).await;
                metrics::histogram!(
                    "notification_duration_seconds",
                    "channel" => base.kind.as_str()
                )
                .record(start.elapsed().as_secs_f64());
                match result {
                    Ok(_) => DeliveryOutcome::Delivered,
                    Err(e) => DeliveryOutcome::Failed(e),
                }
            };
            let result_label = match &outcome {
                DeliveryOutcome::Delivered => "delivered",
                DeliveryOutcome::Suppressed => "suppressed",
                DeliveryOutcome::Failed(_) => "failed",
            };
            metrics::counter!(
                "notifications_total",
                "channel" => base.kind.as_str(),
                "result" => result_label
            )
            .increment(1);
            DeliveryReport {
                receiver: base.name.clone(),
                kind: base.kind,
                outcome,
            }
        });
        join_all(deliveries).await
    }
}
