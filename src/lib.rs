//! alertnotify - alert notification dispatch
//!
//! This library turns receiver configurations into notifiers for the
//! supported channel types and delivers batches of alerts to them.

pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod notification;
pub mod recorder;
pub mod secrets;
pub mod templates;

// Re-export core types for convenience
pub use crate::core::*;
