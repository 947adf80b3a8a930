mod cli;

use crate::cli::CLI;
use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use wormhole_analytics::{AggregatorSettings, AmqpClickQueue, AmqpSettings, BatchAggregator};
use wormhole_storage::MySqlCounterStore;
use wormhole_telemetry::TelemetrySettings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = CLI::try_parse()?;

    wormhole_telemetry::init(
        &TelemetrySettings::builder()
            .service("analytics-worker")
            .format(config.log_format)
            .level(config.log_level)
            .build(),
    )?;

    info!(
        queue = %config.queue,
        prefetch = config.prefetch,
        batch_size = config.batch_size,
        flush_interval_ms = config.flush_interval_ms,
        "starting analytics worker"
    );
    if usize::from(config.prefetch) < config.batch_size {
        warn!(
            prefetch = config.prefetch,
            batch_size = config.batch_size,
            "prefetch is below the batch size, batches will only flush on the timer"
        );
    }

    let store = MySqlCounterStore::connect(&config.mysql_dsn)
        .await
        .context("failed to connect to mysql")?;
    if config.skip_migrations {
        info!("skipping migrations");
    } else {
        store.migrate().await.context("failed to migrate counter table")?;
    }

    let queue = AmqpClickQueue::connect(
        &AmqpSettings::builder()
            .url(config.amqp_url.as_str())
            .queue(config.queue.as_str())
            .prefetch(config.prefetch)
            .consumer_tag(config.consumer_tag.as_str())
            .build(),
    )
    .await
    .context("failed to connect to the click queue")?;

    let settings = AggregatorSettings::builder()
        .batch_size(config.batch_size)
        .flush_interval(config.flush_interval())
        .build();
    let aggregator = BatchAggregator::new(queue, store, settings)?;

    let report = aggregator.run(shutdown_signal()).await?;
    info!(
        size_flushes = report.size_flushes,
        timer_flushes = report.timer_flushes,
        shutdown_flushes = report.shutdown_flushes,
        committed = report.committed_events,
        requeued = report.requeued_events,
        rejected = report.rejected_events,
        ack_failures = report.ack_failures,
        largest_batch = report.largest_batch,
        "analytics worker stopped"
    );
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

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::signal::unix::{signal, SignalKind};

    #[tokio::test]
    async fn sigterm_triggers_shutdown() {
        // keeps SIGTERM routed to tokio while the handler under test registers
        let _guard = signal(SignalKind::terminate()).unwrap();
        let shutdown = tokio::spawn(shutdown_signal());

        tokio::time::timeout(Duration::from_secs(5), async {
            while !shutdown.is_finished() {
                std::process::Command::new("kill")
                    .args(["-TERM", &std::process::id().to_string()])
                    .status()
                    .unwrap();
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .expect("shutdown_signal did not resolve on SIGTERM");
    }
}
