//! Synchronous webhook delivery.
//!
//! `WebhookSender` is the seam between notifiers and the transport. Every
//! notifier builds a `WebhookMessage` and hands it over; the sender performs
//! exactly one request and never retries.

use super::error::TransportError;
use crate::core::NotifyContext;
use async_trait::async_trait;
use reqwest::Method;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument};

/// Response bodies longer than this are cut in error messages.
const MAX_ERROR_BODY_LENGTH: usize = 1024;

/// An outbound HTTP request, fully prepared by a notifier.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WebhookMessage {
    pub url: String,
    /// Empty means `POST`.
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub basic_auth_user: String,
    pub basic_auth_password: String,
    pub body: String,
}

impl WebhookMessage {
    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "POST".to_string(),
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }

    pub fn with_basic_auth(mut self, user: &str, password: &str) -> Self {
        self.basic_auth_user = user.to_string();
        self.basic_auth_password = password.to_string();
        self
    }
}

/// Performs one synchronous delivery.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    /// Sends the message, honouring the context's cancellation and deadline.
    ///
    /// # Returns
    /// * `Ok(())` when the endpoint answered with a 2xx status
    /// * `Err(TransportError)` otherwise; callers own any retry
    async fn send_webhook_sync(
        &self,
        ctx: &NotifyContext,
        message: &WebhookMessage,
    ) -> Result<(), TransportError>;
}

/// A `WebhookSender` backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpWebhookSender {
    client: reqwest::Client,
}

impl HttpWebhookSender {
    /// Creates a sender whose requests time out after `timeout`.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    fn build_request(
        &self,
        message: &WebhookMessage,
    ) -> Result<reqwest::RequestBuilder, TransportError> {
        let method = if message.method.is_empty() {
            Method::POST
        } else {
            Method::from_bytes(message.method.to_uppercase().as_bytes())
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?
        };
        let url = reqwest::Url::parse(&message.url)
            .map_err(|e| TransportError::InvalidRequest(format!("{}: {e}", message.url)))?;

        let mut request = self.client.request(method, url).body(message.body.clone());
        for (name, value) in &message.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !message.basic_auth_user.is_empty() {
            request =
                request.basic_auth(&message.basic_auth_user, Some(&message.basic_auth_password));
        }
        Ok(request)
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<(), TransportError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            debug!(status = %status, "Webhook delivered");
            return Ok(());
        }
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY_LENGTH {
            let mut cut = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    #[instrument(skip_all, fields(url = %message.url, method = %message.method))]
    async fn send_webhook_sync(
        &self,
        ctx: &NotifyContext,
        message: &WebhookMessage,
    ) -> Result<(), TransportError> {
        if ctx.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        let request = self.build_request(message)?;
        let delivery = async {
            match ctx.deadline() {
                Some(deadline) => tokio::time::timeout_at(deadline, self.execute(request))
                    .await
                    .unwrap_or(Err(TransportError::Timeout)),
                None => self.execute(request).await,
            }
        };

        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(TransportError::Cancelled),
            result = delivery => result,
        }
    }
}
