mod bootstrap;
mod dispatcher;
mod health;
mod processor;
mod webhook;

use std::time::Duration;

use anyhow::Result;
use genie_relay_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use genie_relay_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        command_path = %app.config.slack.command_path,
        "genie-relay-server listening"
    );

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let server = axum::serve(listener, app.router).with_graceful_shutdown(async {
        if let Err(error) = wait_for_shutdown().await {
            tracing::error!(
                event_name = "system.server.signal_error",
                correlation_id = "shutdown",
                error = %error,
                "failed to listen for shutdown signal"
            );
        }
        tracing::info!(
            event_name = "system.server.stopping",
            correlation_id = "shutdown",
            "genie-relay-server stopping"
        );
    });

    server.await?;

    if !app.dispatcher.wait_idle(grace).await {
        tracing::warn!(
            event_name = "system.server.abandoned_jobs",
            correlation_id = "shutdown",
            in_flight = app.dispatcher.in_flight(),
            queued = app.dispatcher.queued(),
            "shutdown grace period elapsed with answers still pending"
        );
    }
    tracing::info!(
        event_name = "system.server.stopped",
        correlation_id = "shutdown",
        "genie-relay-server stopped"
    );

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
