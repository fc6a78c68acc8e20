//! Error types for receiver construction and notification delivery.

use thiserror::Error;

/// A required setting is missing or unusable. Raised only at construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("could not find {0} property in settings")]
    MissingField(&'static str),

    #[error("settings must be a JSON object")]
    NotAnObject,
}

/// A setting holds a value outside its allowed set, or settings conflict.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn invalid_value(field: &'static str, value: &str) -> Self {
        Self {
            field,
            message: format!("invalid value for {field}: {value:?}"),
        }
    }

    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Anything a channel's settings builder can reject.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Returned by the registry when a receiver cannot be turned into a notifier.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("unsupported channel type: {0:?}")]
    UnsupportedChannelType(String),

    #[error("failed to validate receiver {name:?} of type {kind:?}: {source}")]
    ReceiverInit {
        name: String,
        kind: String,
        #[source]
        source: SettingsError,
    },
}

/// A non-fatal template failure, carried next to the best-effort output.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("failed to render template: {0}")]
    Render(String),

    #[error("invalid template in {field}: {reason}")]
    Parse { field: &'static str, reason: String },

    #[error("failed to register template {name:?}: {reason}")]
    Register { name: String, reason: String },

    #[error("invalid external URL {url:?}: {reason}")]
    ExternalUrl { url: String, reason: String },
}

/// Returned by a `WebhookSender`. Notifiers pass it on unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("failed to build request: {0}")]
    InvalidRequest(String),

    #[error("webhook request failed: {0}")]
    Request(String),

    #[error("webhook response status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("webhook request timed out")]
    Timeout,

    #[error("webhook request cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_builder() {
            TransportError::InvalidRequest(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Failure of a single `notify` call.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl NotifyError {
    /// The transport error, if delivery itself failed.
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            NotifyError::Transport(err) => Some(err),
            NotifyError::Encode(_) => None,
        }
    }
}
