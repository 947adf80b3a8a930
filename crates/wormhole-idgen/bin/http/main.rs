mod cli;

use crate::cli::CLI;
use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use wormhole_idgen::{App, AppState};
use wormhole_snowflake::{Snowflake, SnowflakeSettings};
use wormhole_telemetry::TelemetrySettings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = CLI::try_parse()?;

    wormhole_telemetry::init(
        &TelemetrySettings::builder()
            .service("id-service")
            .format(config.log_format)
            .level(config.log_level)
            .build(),
    )?;

    let settings = match config.max_clock_wait() {
        Some(bound) => SnowflakeSettings::builder()
            .node_id(config.node_id)
            .max_clock_wait(bound)
            .build(),
        None => SnowflakeSettings::builder().node_id(config.node_id).build(),
    };
    let generator = Snowflake::new(settings).context("invalid snowflake configuration")?;

    info!(
        listen_addr = %config.listen_addr,
        node_id = config.node_id,
        max_clock_wait_ms = config.max_clock_wait_ms,
        "starting id service"
    );

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    axum::serve(listener, App::router(AppState::new(generator)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("id service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
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
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
