//! One module per integration.
pub mod airflow;
pub mod line;
pub mod pagerduty;
pub mod slack;
pub mod webhook;

use super::error::NotifyError;
use super::sender::{WebhookMessage, WebhookSender};
use super::Base;
use crate::core::NotifyContext;
use tracing::{debug, error};

/// Hands a prepared message to the sender. A transport failure is logged
/// with the outbound body and returned unchanged.
pub(crate) async fn deliver(
    base: &Base,
    sender: &dyn WebhookSender,
    ctx: &NotifyContext,
    message: &WebhookMessage,
) -> Result<bool, NotifyError> {
    match sender.send_webhook_sync(ctx, message).await {
        Ok(()) => {
            debug!(receiver = %base.name, kind = %base.kind, "Notification delivered");
            Ok(true)
        }
        Err(e) => {
            error!(
                receiver = %base.name,
                kind = %base.kind,
                error = %e,
                body = %message.body,
                "Failed to send notification"
            );
            Err(e.into())
        }
    }
}

/// Truncates `s` to at most `max` characters, marking the cut with `…`.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
