//! Command-line alarm monitor.
//!
//! Wires the alarm aggregator to a broker: loads [`MonitorConfig`] from the
//! environment, runs an [`AlarmProcessor`] over the configured topics and
//! logs one [`AlarmRow`] per dispatched record. Operators acknowledge alarms
//! by typing their names on standard input.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod display;

pub use config::{ConfigError, MonitorConfig};
pub use display::{AlarmRow, format_timestamp};

use alarm_aggregator_core::{
    AckSink, AlarmMerger, AlarmProcessor, AlarmRegistry, Dispatched, EventDispatcher, EventSource,
    ProcessorStats, RegistryHandle, SymbolCatalog, TracingObserver, TransportError,
};
use chrono_tz::Tz;
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{broadcast, watch};

/// A configured processor plus the reporting around it.
pub struct Monitor {
    processor: AlarmProcessor,
    shutdown: watch::Sender<bool>,
    updates: broadcast::Receiver<Dispatched>,
    timezone: Tz,
}

impl Monitor {
    /// Build a monitor consuming `source` with the configured topics.
    #[must_use]
    pub fn new(config: &MonitorConfig, catalog: SymbolCatalog, source: Arc<dyn EventSource>) -> Self {
        let registry = AlarmRegistry::new().with_observer(Arc::new(TracingObserver));
        let dispatcher = EventDispatcher::new(
            registry,
            AlarmMerger::new(Arc::new(catalog)),
            config.topics.clone(),
        );

        let (processor, shutdown) = AlarmProcessor::new(dispatcher, source);
        let updates = processor.subscribe_updates();

        Self {
            processor,
            shutdown,
            updates,
            timezone: config.timezone,
        }
    }

    /// Query handle on the monitor's registry.
    #[must_use]
    pub fn handle(&self) -> RegistryHandle {
        self.processor.handle()
    }

    /// Run until `shutdown_signal` resolves or the source ends.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the subscription fails or the
    /// processor task dies.
    pub async fn run<F>(self, shutdown_signal: F) -> Result<ProcessorStats, TransportError>
    where
        F: Future<Output = ()>,
    {
        let Self {
            mut processor,
            shutdown,
            mut updates,
            timezone,
        } = self;

        let mut task = tokio::spawn(async move { processor.run().await });
        tokio::pin!(shutdown_signal);
        let mut stopping = false;
        let mut updates_open = true;

        let outcome = loop {
            tokio::select! {
                joined = &mut task => break joined,

                update = updates.recv(), if updates_open => match update {
                    Ok(dispatched) => report(&dispatched, timezone),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped = skipped, "Display fell behind, updates skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => updates_open = false,
                },

                () = &mut shutdown_signal, if !stopping => {
                    tracing::info!("Shutdown requested");
                    stopping = true;
                    if shutdown.send(true).is_err() {
                        tracing::debug!("Processor already stopped");
                    }
                }
            }
        };

        // Report whatever was dispatched after the last select pass
        while let Ok(dispatched) = updates.try_recv() {
            report(&dispatched, timezone);
        }

        outcome.map_err(|e| TransportError::Transport(format!("Processor task failed: {e}")))?
    }
}

fn report(dispatched: &Dispatched, timezone: Tz) {
    let row = AlarmRow::from_record(&dispatched.record, timezone);
    tracing::info!(
        alarm = %row.name,
        outcome = %dispatched.outcome,
        created = dispatched.created,
        "{row}"
    );
}

/// Acknowledge every non-blank line of `input` as an alarm name.
///
/// Failures are logged and do not stop the loop. Returns the number of
/// successful acknowledgements once `input` ends.
pub async fn acknowledge_lines<R>(input: R, sink: &dyn AckSink) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut acknowledged = 0;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read acknowledgement input");
                break;
            }
        };

        let name = line.trim();
        if name.is_empty() {
            continue;
        }

        match sink.acknowledge(name).await {
            Ok(()) => {
                acknowledged += 1;
                tracing::info!(alarm = %name, "Alarm acknowledged");
            }
            Err(e) => tracing::warn!(alarm = %name, error = %e, "Acknowledgement failed"),
        }
    }

    acknowledged
}
