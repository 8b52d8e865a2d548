//! Polling updater that keeps the election results hierarchy summed up.

mod config;

use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Parser;
use reqwest::Client;
use rollup_core::{Aggregator, Scheduler};
use rollup_provider_http::HttpGeoDataPort;
use tokio::signal;
use tokio::time::sleep;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::parse();
    info!(base_url = %config.base_url, "starting updater");

    // HTTP + engine setup
    let client = Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.timeout())
        .build()?;
    let port = HttpGeoDataPort::new(client, &config.base_url)?;
    let aggregator = Aggregator::new(Arc::new(port), config.aggregator_config());
    let scheduler = Scheduler::new(aggregator, config.interval(), config.max_failed_passes);

    if let Some(delay) = config.startup_delay() {
        info!(?delay, "debug mode, waiting for the database");
        sleep(delay).await;
    }

    if config.once {
        let report = scheduler.run_once().await?;
        if report.errors() > 0 {
            bail!("pass finished with {} failed units", report.errors());
        }
        return Ok(());
    }

    scheduler.run_until(shutdown_signal()).await?;
    info!("updater stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl+C"),
            Err(err) => {
                warn!("failed to install Ctrl+C handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal");
            }
            Err(err) => {
                warn!("failed to install terminate handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
