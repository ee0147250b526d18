//! Dashbeat Binary Entry Point
//!
//! Runs scheduled collection cycles and writes events to stdout as NDJSON.
//! Core functionality is provided by the `dashbeat` library crate.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dashbeat::{
    CollectionJob, CollectorRegistry, DashboardApi, DashboardInventory, Orchestrator,
    OutputBuilder, ReqwestTransport, RetryingInvoker, Schedule,
    config::{AppConfig, parse_duration},
    metrics,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Dashbeat - Dashboard Telemetry Collector
#[derive(Parser, Debug)]
#[command(name = "dashbeat", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/dashbeat.yaml",
        env = "DASHBEAT_CONFIG"
    )]
    config: String,

    /// Dashboard API key (overrides config file)
    #[arg(long, env = "DASHBEAT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Dashboard API base URL (overrides config file)
    #[arg(long, env = "DASHBEAT_BASE_URL")]
    base_url: Option<String>,

    /// Collection interval, e.g. `30s` or `5m` (overrides config file)
    #[arg(long, value_parser = parse_duration)]
    interval: Option<Duration>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing (stderr; stdout carries the events)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dashbeat=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Dashbeat - Dashboard Telemetry Collector");

    let cli = Cli::parse();

    tracing::info!("Loading configuration from: {}", cli.config);
    let mut config = AppConfig::from_file(&cli.config)?;

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(api_key) = cli.api_key {
        config.api.api_key = api_key;
    }
    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
    }
    if let Some(interval) = cli.interval {
        config.collection.interval = Some(interval);
        config.collection.cron = None;
    }
    config.validate()?;

    let schedule = config.collection.schedule()?;
    let period = schedule.period()?;
    let targets = config.targets(period);
    tracing::info!(
        base_url = %config.api.base_url,
        organizations = targets.len(),
        metricsets = ?config.collection.metricsets,
        schedule = %schedule,
        "Configuration loaded"
    );

    let output = OutputBuilder::stdout()
        .channel_capacity(config.output.channel_capacity)
        .batch_size(config.output.batch_size)
        .batch_flush_interval(config.output.batch_flush_interval)
        .build()?;

    let cancel = CancellationToken::new();
    let invoker = RetryingInvoker::new(
        ReqwestTransport::new(config.api.timeout)?,
        config.api.retry_policy(),
    )
    .with_cancellation(cancel.clone());
    let api = DashboardApi::new(Arc::new(invoker));

    let metricsets = config
        .collection
        .metricsets
        .iter()
        .map(|kind| metrics::build(*kind, api.clone(), config.collection.max_concurrent_devices))
        .collect();
    let mut orchestrator = Orchestrator::new(
        Arc::new(DashboardInventory::new(api)),
        metricsets,
        Arc::new(output.writer.clone()),
    )
    .with_cancellation(cancel.clone());
    if let Some(limit) = config.collection.max_concurrent_organizations {
        orchestrator = orchestrator.with_max_concurrent_organizations(limit);
    }
    let orchestrator = Arc::new(orchestrator);

    if cli.once {
        let report = orchestrator.run_cycle(&targets).await;
        for org in report.failures() {
            tracing::warn!(organization = %org.organization_id, outcome = ?org.outcome, "Organization not fully collected");
        }
        output.shutdown()?;
        tracing::info!("Shutdown complete");
        return Ok(());
    }

    let registry = CollectorRegistry::new(cancel).await?;
    registry
        .spawn(
            CollectionJob {
                name: "dashboard".to_string(),
                schedule: schedule.clone(),
                targets,
            },
            orchestrator,
        )
        .await?;
    registry.start().await?;
    if let Schedule::Interval(interval) = schedule {
        tracing::info!("First cycle in {:?}", interval);
    }

    tracing::info!("Press Ctrl+C to shutdown");
    shutdown_signal().await;

    tracing::info!("Shutting down collectors...");
    if let Err(e) = registry.shutdown().await {
        tracing::error!("Failed to shutdown collectors: {}", e);
    }

    tracing::info!("Shutting down output...");
    if let Err(e) = output.shutdown() {
        tracing::error!("Failed to shutdown output: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
