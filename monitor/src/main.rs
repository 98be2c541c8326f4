//! Alarm monitor entry point.
//!
//! Configuration comes from the environment (see [`MonitorConfig`]):
//!
//! ```bash
//! BOOTSTRAP_SERVERS=kafka:9092 DISPLAY_TIMEZONE=Europe/Berlin alarm-monitor
//! ```
//!
//! Type an alarm name and press enter to acknowledge it. With
//! `MONITOR_FOLLOW=false` the monitor prints the current alarm table and
//! exits instead.

use alarm_aggregator_redpanda::{AckProducer, AlarmConsumer};
use alarm_monitor::{Monitor, MonitorConfig, acknowledge_lines};
use anyhow::Context;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = MonitorConfig::from_env().context("Invalid monitor configuration")?;
    init_tracing(&config.log_level);

    let catalog = config.load_catalog().context("Failed to load symbol catalog")?;

    tracing::info!(
        name = %config.name,
        brokers = %config.connection.bootstrap_servers(),
        schema_registry = config.connection.schema_registry().unwrap_or("-"),
        topics = ?config.topics.names(),
        timezone = %config.timezone,
        follow = config.follow,
        "Starting alarm monitor"
    );

    let consumer = AlarmConsumer::builder(config.connection.clone())
        .name(config.name.clone())
        .follow(config.follow)
        .build()
        .context("Failed to configure consumer")?;

    // A snapshot run exits on its own and takes no acknowledgements
    if config.follow {
        let producer = AckProducer::new(config.connection.clone(), config.ack_topic.clone())
            .context("Failed to create acknowledgement producer")?;

        tokio::spawn(async move {
            let stdin = BufReader::new(tokio::io::stdin());
            let count = acknowledge_lines(stdin, &producer).await;
            tracing::debug!(acknowledged = count, "Acknowledgement input closed");
        });
    }

    let monitor = Monitor::new(&config, catalog, Arc::new(consumer));
    let stats = monitor
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("Alarm processing failed")?;

    tracing::info!(
        processed = stats.processed,
        rejected = stats.rejected,
        transport_errors = stats.transport_errors,
        "Alarm monitor stopped"
    );
    Ok(())
}

/// Initialize tracing with an env filter, falling back to the configured level.
fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
