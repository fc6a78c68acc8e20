//! alertnotify - alert notification dispatcher
//!
//! Builds the configured receivers and delivers alerts to them from the
//! command line.

use alertnotify::{
    app::{read_alerts, App},
    cli::{Cli, Command},
    config::Config,
    dispatch::{DeliveryOutcome, DeliveryReport},
    recorder::LoggingRecorder,
};
use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Defaults, then the file, the environment and finally CLI args.
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            tracing_subscriber::fmt().with_writer(std::io::stderr).init();
            error!("Failed to load configuration: {}", err);
            return Ok(ExitCode::FAILURE);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!(
        external_url = %config.external_url,
        timeout_seconds = config.http.timeout_seconds,
        receivers = config.receivers.len(),
        "alertnotify starting up"
    );

    let recorder = LoggingRecorder::new();
    if let Err(e) = metrics::set_global_recorder(recorder.clone()) {
        warn!(error = %e, "Failed to install metrics recorder");
    }
    let log_metrics = config.log_metrics;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight notifications");
            let _ = cancel_tx.send(true);
        }
    });

    let mut app = App::builder(config).cancellation(cancel_rx).build()?;

    for err in app.build_errors() {
        eprintln!("error: {err}");
    }

    let mut template_errors = false;
    let reports = match cli.command {
        Command::Validate => {
            for notifier in app.notifiers() {
                let base = notifier.base();
                if notifier.template_errors().is_empty() {
                    println!("ok    {} ({})", base.name, base.kind);
                }
                for e in notifier.template_errors() {
                    println!("warn  {} ({}): {}", base.name, base.kind, e);
                    template_errors = true;
                }
            }
            Vec::new()
        }
        Command::Test { receivers } => app.test_receivers(&receivers).await?,
        Command::Send {
            alerts,
            receivers,
            group_key,
        } => {
            let alerts = read_alerts(&alerts)?;
            app.send(alerts, &receivers, group_key).await?
        }
    };

    print_reports(&reports);
    if log_metrics {
        recorder.log_snapshot();
    }

    if template_errors
        || !app.build_errors().is_empty()
        || reports.iter().any(DeliveryReport::is_failure)
    {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_reports(reports: &[DeliveryReport]) {
    for report in reports {
        match &report.outcome {
            DeliveryOutcome::Delivered => println!("sent  {} ({})", report.receiver, report.kind),
            DeliveryOutcome::Suppressed => println!(
                "skip  {} ({}): resolve message disabled",
                report.receiver, report.kind
            ),
            DeliveryOutcome::Failed(e) => {
                println!("FAIL  {} ({}): {}", report.receiver, report.kind, e)
            }
        }
    }
}
