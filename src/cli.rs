//! Command-Line Interface (CLI) argument parsing.
//!
//! Arguments are parsed with `clap` and merged over the configuration file
//! and environment variables as the last `figment` layer.

use clap::{Parser, Subcommand};
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Delivers alert notifications to configured receivers.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log level, overriding the configuration file.
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Base URL of the alerting UI used in notification links.
    #[arg(long, value_name = "URL", global = true)]
    pub external_url: Option<String>,

    /// Timeout for each outgoing request in seconds.
    #[arg(long, value_name = "SECONDS", global = true)]
    pub timeout: Option<u64>,

    /// Log delivery counters and timings before exiting.
    #[arg(long, global = true)]
    pub log_metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Build every configured receiver and report configuration errors.
    Validate,

    /// Send a synthetic test alert to receivers.
    Test {
        /// Only notify these receivers (repeatable).
        #[arg(short, long = "receiver", value_name = "NAME")]
        receivers: Vec<String>,
    },

    /// Send alerts read from a JSON file.
    Send {
        /// JSON array of alerts.
        #[arg(short, long, value_name = "FILE")]
        alerts: PathBuf,

        /// Only notify these receivers (repeatable).
        #[arg(short, long = "receiver", value_name = "NAME")]
        receivers: Vec<String>,

        /// Group key reported to receivers. Defaults to one derived from the alerts.
        #[arg(long, value_name = "KEY")]
        group_key: Option<String>,
    },
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        if let Some(url) = &self.external_url {
            dict.insert("external_url".into(), Value::from(url.clone()));
        }

        if self.log_metrics {
            dict.insert("log_metrics".into(), Value::from(true));
        }

        if let Some(timeout) = self.timeout {
            let mut http = Dict::new();
            http.insert("timeout_seconds".into(), Value::from(timeout));
            dict.insert("http".into(), Value::from(http));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
