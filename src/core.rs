//! Core domain types for alertnotify
//!
//! This module defines the alert and receiver data structures that flow from
//! the evaluation engine into the notifiers, along with the per-call
//! `NotifyContext` the dispatch loop hands to every notifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::watch;
use tokio::time::Instant;

/// Label and annotation sets. Ordered so that rendered output is stable.
pub type Labels = BTreeMap<String, String>;

/// The encrypted-at-rest subset of a receiver's settings.
pub type SecureSettings = BTreeMap<String, Vec<u8>>;

/// A single alert produced upstream by the evaluation engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub annotations: Labels,
    pub starts_at: DateTime<Utc>,
    /// Set once the alert is resolved, or to the expected resolve time.
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    /// Link back to the rule that generated the alert.
    #[serde(default)]
    pub generator_url: Option<String>,
}

impl Alert {
    /// Creates a firing alert with the given labels, starting now.
    pub fn firing(labels: Labels) -> Self {
        Self {
            labels,
            annotations: Labels::new(),
            starts_at: Utc::now(),
            ends_at: None,
            generator_url: None,
        }
    }

    /// Returns the value of the `alertname` label, or an empty string.
    pub fn name(&self) -> &str {
        self.labels.get("alertname").map(String::as_str).unwrap_or("")
    }

    /// An alert is resolved once its end time has passed.
    pub fn resolved_at(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.is_some_and(|ends_at| ends_at <= now)
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_at(Utc::now())
    }

    /// A short, stable identifier derived from the label set.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (name, value) in &self.labels {
            hasher.update(name.as_bytes());
            hasher.update(&[0xff]);
            hasher.update(value.as_bytes());
            hasher.update(&[0xff]);
        }
        hasher.finalize().to_hex()[..16].to_string()
    }
}

/// Error returned when trying to build an `AlertBatch` with no alerts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("an alert batch must contain at least one alert")]
pub struct EmptyBatch;

/// A non-empty, ordered group of alerts delivered together in one call.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertBatch {
    alerts: Vec<Alert>,
}

impl AlertBatch {
    pub fn new(alerts: Vec<Alert>) -> Result<Self, EmptyBatch> {
        if alerts.is_empty() {
            return Err(EmptyBatch);
        }
        Ok(Self { alerts })
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Alert> {
        self.alerts.iter()
    }

    /// `"resolved"` when every alert is resolved, `"firing"` otherwise.
    pub fn status(&self) -> &'static str {
        if self.all_resolved() {
            "resolved"
        } else {
            "firing"
        }
    }

    pub fn all_resolved(&self) -> bool {
        let now = Utc::now();
        self.alerts.iter().all(|alert| alert.resolved_at(now))
    }

    /// Labels shared with identical values by every alert in the batch.
    pub fn common_labels(&self) -> Labels {
        common_pairs(self.alerts.iter().map(|alert| &alert.labels))
    }

    /// Annotations shared with identical values by every alert in the batch.
    pub fn common_annotations(&self) -> Labels {
        common_pairs(self.alerts.iter().map(|alert| &alert.annotations))
    }
}

impl<'a> IntoIterator for &'a AlertBatch {
    type Item = &'a Alert;
    type IntoIter = std::slice::Iter<'a, Alert>;

    fn into_iter(self) -> Self::IntoIter {
        self.alerts.iter()
    }
}

fn common_pairs<'a>(mut sets: impl Iterator<Item = &'a Labels>) -> Labels {
    let Some(first) = sets.next() else {
        return Labels::new();
    };
    let mut common = first.clone();
    for set in sets {
        common.retain(|name, value| set.get(name) == Some(value));
    }
    common
}

/// The persisted receiver definition, passed as an immutable snapshot into
/// notifier construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NotificationChannelConfig {
    #[serde(default)]
    pub uid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Opaque per-channel settings document.
    #[serde(default = "empty_settings")]
    pub settings: serde_json::Value,
    #[serde(default)]
    pub secure_settings: SecureSettings,
    #[serde(default)]
    pub disable_resolve_message: bool,
}

fn empty_settings() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Per-call context handed to a notifier by the dispatch loop.
///
/// Cloning is cheap; every clone observes the same cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct NotifyContext {
    pub group_key: String,
    pub group_labels: Labels,
    pub receiver: String,
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

impl NotifyContext {
    pub fn new(group_key: impl Into<String>, group_labels: Labels) -> Self {
        Self {
            group_key: group_key.into(),
            group_labels,
            ..Default::default()
        }
    }

    pub fn with_receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = receiver.into();
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attaches a cancellation signal. Sending `true` aborts in-flight work.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once the context is cancelled. Never resolves if no signal is
    /// attached or if the sending side goes away without cancelling.
    pub async fn cancelled(&self) {
        if let Some(rx) = &self.cancel {
            let mut rx = rx.clone();
            if rx.wait_for(|cancelled| *cancelled).await.is_ok() {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}
