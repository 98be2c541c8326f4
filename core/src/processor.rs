//! Consumer loop feeding an [`EventSource`] into an [`EventDispatcher`].
//!
//! # Overview
//!
//! The `AlarmProcessor` owns the single logical consumer loop:
//! - Subscribes to the dispatcher's topics
//! - Dispatches each event while holding the dispatcher's write lock, so the
//!   registry's lookup-then-upsert sequence is a critical section even when
//!   readers query concurrently
//! - Broadcasts every [`Dispatched`] result to update subscribers
//! - Logs routing and transport errors and keeps going
//!
//! # Example
//!
//! ```ignore
//! let (mut processor, shutdown) = AlarmProcessor::new(EventDispatcher::default(), source);
//! let registry = processor.handle();
//! let mut updates = processor.subscribe_updates();
//!
//! tokio::spawn(async move { processor.run().await });
//!
//! while let Ok(dispatched) = updates.recv().await {
//!     println!("{} {}", dispatched.record.name(), dispatched.outcome);
//! }
//!
//! // Later, from a signal handler:
//! shutdown.send(true).ok();
//! ```

use crate::dispatcher::{DispatchError, Dispatched, EventDispatcher};
use crate::event::IncomingEvent;
use crate::event_bus::{EventSource, TransportError};
use crate::record::AlarmRecord;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast, watch};

/// Default capacity of the update broadcast channel.
pub const DEFAULT_UPDATE_CAPACITY: usize = 256;

/// Counters accumulated by one [`AlarmProcessor::run`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    /// Events merged into the registry.
    pub processed: u64,
    /// Events rejected by the dispatcher (unroutable topic, empty key).
    pub rejected: u64,
    /// Per-message errors reported by the source.
    pub transport_errors: u64,
}

/// Read-only query handle on the processor's registry.
#[derive(Clone, Debug)]
pub struct RegistryHandle {
    dispatcher: Arc<RwLock<EventDispatcher>>,
}

impl RegistryHandle {
    /// Snapshot of one record.
    pub async fn lookup(&self, name: &str) -> Option<AlarmRecord> {
        self.dispatcher.read().await.lookup(name).cloned()
    }

    /// Snapshot of all records (order unspecified).
    pub async fn list_all(&self) -> Vec<AlarmRecord> {
        self.dispatcher.read().await.registry().list_all()
    }

    /// Number of records.
    pub async fn len(&self) -> usize {
        self.dispatcher.read().await.registry().len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.dispatcher.read().await.registry().is_empty()
    }
}

/// Drives events from a source through the dispatcher.
pub struct AlarmProcessor {
    dispatcher: Arc<RwLock<EventDispatcher>>,
    source: Arc<dyn EventSource>,
    updates: broadcast::Sender<Dispatched>,
    shutdown: watch::Receiver<bool>,
}

impl AlarmProcessor {
    /// Create a processor.
    ///
    /// Returns the processor and a shutdown sender. Send `true` to stop
    /// [`AlarmProcessor::run`].
    #[must_use]
    pub fn new(
        dispatcher: EventDispatcher,
        source: Arc<dyn EventSource>,
    ) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (updates, _) = broadcast::channel(DEFAULT_UPDATE_CAPACITY);

        let processor = Self {
            dispatcher: Arc::new(RwLock::new(dispatcher)),
            source,
            updates,
            shutdown: shutdown_rx,
        };

        (processor, shutdown_tx)
    }

    /// Set the update channel capacity (lagging subscribers lose the oldest
    /// updates beyond it).
    ///
    /// Existing update subscribers are disconnected.
    #[must_use]
    pub fn with_update_capacity(mut self, capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(capacity.max(1));
        self.updates = updates;
        self
    }

    /// Query handle on the registry.
    #[must_use]
    pub fn handle(&self) -> RegistryHandle {
        RegistryHandle {
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }

    /// Receive every dispatched record from now on.
    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<Dispatched> {
        self.updates.subscribe()
    }

    /// Dispatch a single event and broadcast the result.
    ///
    /// # Errors
    ///
    /// Returns the dispatcher's [`DispatchError`] unchanged.
    pub async fn process(&self, event: &IncomingEvent) -> Result<Dispatched, DispatchError> {
        let dispatched = self.dispatcher.write().await.process(event)?;
        if self.updates.send(dispatched.clone()).is_err() {
            tracing::trace!(alarm = %event.key, "No update subscribers");
        }
        Ok(dispatched)
    }

    /// Consume events until shutdown or until the source ends.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] only if the subscription itself fails.
    /// Per-event failures are logged and counted.
    #[allow(clippy::cognitive_complexity)]
    pub async fn run(&mut self) -> Result<ProcessorStats, TransportError> {
        let topics = self.dispatcher.read().await.topics().names();
        let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();

        let mut stats = ProcessorStats::default();
        let mut events = self.source.subscribe(&topic_refs).await?;
        tracing::info!(topics = ?topics, "Alarm processor started");

        while !*self.shutdown.borrow() {
            tokio::select! {
                next = events.next() => {
                    match next {
                        Some(Ok(event)) => self.handle_event(&event, &mut stats).await,
                        Some(Err(e)) => {
                            stats.transport_errors += 1;
                            tracing::error!(error = %e, "Error receiving alarm event");
                        }
                        None => {
                            tracing::info!("Event source closed");
                            break;
                        }
                    }
                }

                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        tracing::info!("Shutdown signal received");
                        break;
                    }
                }
            }
        }

        tracing::info!(
            processed = stats.processed,
            rejected = stats.rejected,
            transport_errors = stats.transport_errors,
            "Alarm processor stopped"
        );
        Ok(stats)
    }

    async fn handle_event(&self, event: &IncomingEvent, stats: &mut ProcessorStats) {
        match self.process(event).await {
            Ok(dispatched) => {
                stats.processed += 1;
                if !dispatched.dropped_fields.is_empty() || dispatched.malformed {
                    tracing::warn!(
                        alarm = %event.key,
                        topic = %event.topic,
                        dropped = ?dispatched.dropped_fields,
                        malformed = dispatched.malformed,
                        "Event applied partially"
                    );
                }
            }
            Err(e) => {
                stats.rejected += 1;
                tracing::warn!(
                    topic = %event.topic,
                    alarm = %event.key,
                    error = %e,
                    "Event rejected by dispatcher"
                );
            }
        }
    }
}
