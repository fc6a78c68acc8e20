use crate::{
    core::{Alert, AlertBatch, Labels, NotificationChannelConfig, NotifyContext},
    notification::{error::TransportError, sender::WebhookMessage, sender::WebhookSender},
    secrets::{decrypt_fn, DecryptFn, PlaintextDecrypter},
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Fake webhook sender that records every message instead of sending it.
#[derive(Clone, Default)]
pub struct RecordingSender {
    // Queued results, consumed front first. Empty means success.
    responses: Arc<Mutex<VecDeque<Result<(), TransportError>>>>,
    sent: Arc<Mutex<Vec<WebhookMessage>>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call fail with `error`.
    pub fn fail_next(&self, error: TransportError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn sent(&self) -> Vec<WebhookMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// The most recent message, if any.
    pub fn last(&self) -> Option<WebhookMessage> {
        self.sent.lock().unwrap().last().cloned()
    }

    /// The most recent body, parsed as JSON.
    pub fn last_json(&self) -> serde_json::Value {
        let message = self.last().expect("no webhook was sent");
        serde_json::from_str(&message.body).expect("webhook body is not JSON")
    }
}

#[async_trait]
impl WebhookSender for RecordingSender {
    async fn send_webhook_sync(
        &self,
        _ctx: &NotifyContext,
        message: &WebhookMessage,
    ) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(message.clone());
        self.responses.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

/// Builds a label set from pairs.
pub fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A one-alert batch with the given labels.
pub fn batch_of(pairs: &[(&str, &str)]) -> AlertBatch {
    AlertBatch::new(vec![Alert::firing(labels(pairs))]).unwrap()
}

/// The context a dispatcher would pass for a batch grouped by `alertname`.
pub fn test_context() -> NotifyContext {
    NotifyContext::new("{}:{alertname=\"alert1\"}", labels(&[("alertname", "alert1")]))
        .with_receiver("test")
}

/// A receiver config with plaintext secure settings.
pub fn channel_config(
    kind: &str,
    settings: serde_json::Value,
    secure: &[(&str, &str)],
) -> NotificationChannelConfig {
    NotificationChannelConfig {
        uid: format!("{kind}-uid"),
        name: format!("{kind}_testing"),
        kind: kind.to_string(),
        settings,
        secure_settings: secure
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect(),
        disable_resolve_message: false,
    }
}

pub fn plaintext_decrypt() -> DecryptFn {
    decrypt_fn(Arc::new(PlaintextDecrypter))
}
