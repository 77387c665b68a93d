//! EMA Crossover Monitor Main Entry Point

use anyhow::{Context, Result};
use ema_cross_strategy::config::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use ema_cross_strategy::{MonitorConfig, Pipeline};
use health_check::HealthCheckServer;
use strategy_shared::{init_logging, resolve_config_path};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = resolve_config_path(
        std::env::args().nth(1),
        CONFIG_PATH_ENV,
        DEFAULT_CONFIG_PATH,
    );
    let config = MonitorConfig::load(&config_path).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            config_path.display()
        )
    })?;

    init_logging(&config.monitoring.log_level, config.monitoring.log_json)?;

    info!("Starting EMA crossover monitor");
    info!(
        "Configuration loaded: {} symbols x {} intervals, EMA {}/{}, dedup window {}s",
        config.symbols.len(),
        config.intervals.len(),
        config.indicators.ema_short_period,
        config.indicators.ema_long_period,
        config.signal.deduplication_window_secs
    );

    let shutdown = CancellationToken::new();
    let pipeline = Pipeline::from_config(config.clone(), shutdown.clone())
        .context("Failed to build pipeline")?;

    let port = config.monitoring.healthcheck_port;
    if port != 0 {
        let server = HealthCheckServer::new("ema_monitor", port, pipeline.status());
        let token = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = server.serve(async move { token.cancelled().await }).await {
                error!("Health check server failed: {:#}", e);
            }
        });
    }

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutting down EMA crossover monitor");
                signal_token.cancel();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    info!("EMA crossover monitor running. Press Ctrl+C to stop.");

    let outcome = pipeline.run().await.context("Monitor pipeline failed");
    shutdown.cancel();
    outcome?;

    info!("EMA crossover monitor stopped");
    Ok(())
}
