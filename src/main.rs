//! Main entry point for the irace-stats CLI

use anyhow::Context;
use clap::Parser;
use irace_stats::cli::{commands, Cli};
use irace_stats::metrics::init_metrics;
use irace_stats::Stats;
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing(debug: bool) {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let default_level = if debug { "irace_stats=debug" } else { "irace_stats=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Logs go to stderr; stdout carries the JSON result.
    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let (username, password) = cli.credentials()?;

    let stats = Stats::authenticate(cli.client_config(), username, password)
        .await
        .context("login failed")?;

    // Ctrl+C fails in-flight calls with `Closed` instead of waiting them out.
    tokio::spawn({
        let transport = Arc::downgrade(stats.transport());
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl+C received - shutting down");
                if let Some(transport) = transport.upgrade() {
                    transport.shutdown();
                }
            }
        }
    });

    let result = cli.command.execute(&stats).await;
    stats.shutdown();

    let output = result?;
    println!("{}", commands::render(&output, cli.pretty)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Some(addr) = cli.metrics_addr {
        if let Err(e) = init_metrics(addr) {
            warn!("Metrics exporter not started: {}", e);
        }
    }

    if let Err(e) = run(cli).await {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }
}
