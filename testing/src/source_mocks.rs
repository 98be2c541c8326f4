//! In-memory transport and observer mocks
//!
//! Provides fast, deterministic stand-ins for the broker-facing pieces:
//! - [`InMemoryEventSource`]: replayable, pushable [`EventSource`]
//! - [`RecordingAckSink`]: [`AckSink`] that remembers every acknowledgement
//! - [`RecordingObserver`]: [`RegistryObserver`] that remembers every upsert

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use alarm_aggregator_core::{
    AckSink, AlarmRecord, EventSource, EventStream, IncomingEvent, RegistryChange,
    RegistryObserver, TransportError,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

type Item = Result<IncomingEvent, TransportError>;

#[derive(Debug, Default)]
struct SourceState {
    history: Vec<Item>,
    subscribers: Vec<Subscriber>,
    subscriptions: Vec<Vec<String>>,
    closed: bool,
}

#[derive(Debug)]
struct Subscriber {
    topics: Vec<String>,
    tx: mpsc::UnboundedSender<Item>,
}

impl Subscriber {
    fn wants(&self, item: &Item) -> bool {
        match item {
            Ok(event) => self.topics.iter().any(|topic| *topic == event.topic),
            Err(_) => true,
        }
    }
}

/// In-memory event source behaving like a compacted, replaying broker.
///
/// Every subscription first receives the history pushed so far (filtered to
/// its topics), then live pushes. Errors reach every subscriber. After
/// [`close`](InMemoryEventSource::close) all streams end once drained.
///
/// # Example
///
/// ```
/// use alarm_aggregator_core::EventSource;
/// use alarm_aggregator_testing::{InMemoryEventSource, fixtures};
/// use futures::StreamExt;
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let source = InMemoryEventSource::new();
/// source.push(fixtures::registration("alarm1", json!({}), 1));
/// source.close();
///
/// let events: Vec<_> = source.subscribe(&["registered-alarms"]).await.unwrap().collect().await;
/// assert_eq!(events.len(), 1);
/// # });
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryEventSource {
    state: Arc<Mutex<SourceState>>,
}

impl InMemoryEventSource {
    /// Create an empty, open source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a closed source holding `events` as history.
    #[must_use]
    pub fn replaying(events: impl IntoIterator<Item = IncomingEvent>) -> Self {
        let source = Self::new();
        for event in events {
            source.push(event);
        }
        source.close();
        source
    }

    /// Append an event and deliver it to matching subscribers.
    pub fn push(&self, event: IncomingEvent) {
        self.deliver(Ok(event));
    }

    /// Append a per-message error and deliver it to every subscriber.
    pub fn push_error(&self, error: TransportError) {
        self.deliver(Err(error));
    }

    /// End all current and future streams after their buffered items.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        state.subscribers.clear();
    }

    /// Topic lists of every subscription so far.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().subscriptions.clone()
    }

    /// Number of items pushed so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().history.len()
    }

    /// Whether nothing has been pushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().history.is_empty()
    }

    fn deliver(&self, item: Item) {
        let mut state = self.state.lock().unwrap();
        // Dropped receivers unsubscribe themselves
        state.subscribers.retain(|subscriber| {
            !subscriber.wants(&item) || subscriber.tx.send(item.clone()).is_ok()
        });
        state.history.push(item);
    }
}

impl EventSource for InMemoryEventSource {
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, TransportError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();

        Box::pin(async move {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let subscriber = Subscriber { topics, tx };

            {
                let mut state = self.state.lock().unwrap();
                for item in &state.history {
                    if subscriber.wants(item) {
                        let _ = subscriber.tx.send(item.clone());
                    }
                }
                state.subscriptions.push(subscriber.topics.clone());
                if !state.closed {
                    state.subscribers.push(subscriber);
                }
            }

            let stream = async_stream::stream! {
                while let Some(item) = rx.recv().await {
                    yield item;
                }
            };

            Ok(Box::pin(stream) as EventStream)
        })
    }
}

/// Acknowledgement sink that records names instead of publishing.
///
/// # Example
///
/// ```
/// use alarm_aggregator_core::AckSink;
/// use alarm_aggregator_testing::RecordingAckSink;
///
/// # tokio_test::block_on(async {
/// let sink = RecordingAckSink::new();
/// sink.acknowledge("alarm1").await.unwrap();
/// assert_eq!(sink.acknowledged(), vec!["alarm1".to_string()]);
/// # });
/// ```
#[derive(Clone, Debug, Default)]
pub struct RecordingAckSink {
    acknowledged: Arc<Mutex<Vec<String>>>,
    failure: Arc<Mutex<Option<TransportError>>>,
}

impl RecordingAckSink {
    /// Create a sink that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following acknowledgement fail with `error`.
    pub fn fail_with(&self, error: TransportError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    /// Accept acknowledgements again.
    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// Names acknowledged successfully, in order.
    #[must_use]
    pub fn acknowledged(&self) -> Vec<String> {
        self.acknowledged.lock().unwrap().clone()
    }
}

impl AckSink for RecordingAckSink {
    fn acknowledge(
        &self,
        name: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>> {
        let name = name.to_string();
        Box::pin(async move {
            if let Some(error) = self.failure.lock().unwrap().clone() {
                return Err(error);
            }
            self.acknowledged.lock().unwrap().push(name);
            Ok(())
        })
    }
}

/// One upsert as seen by [`RecordingObserver`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedUpsert {
    /// Snapshot of the stored record.
    pub record: AlarmRecord,
    /// Whether the name was new to the registry.
    pub created: bool,
}

/// Registry observer that keeps a snapshot of every upsert.
#[derive(Clone, Debug, Default)]
pub struct RecordingObserver {
    upserts: Arc<Mutex<Vec<RecordedUpsert>>>,
}

impl RecordingObserver {
    /// Create an observer with an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All upserts, in order.
    #[must_use]
    pub fn upserts(&self) -> Vec<RecordedUpsert> {
        self.upserts.lock().unwrap().clone()
    }

    /// Names of all upserted records, in order (with repeats).
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.upserts
            .lock()
            .unwrap()
            .iter()
            .map(|upsert| upsert.record.name().to_string())
            .collect()
    }

    /// Number of upserts that introduced a new name.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.upserts
            .lock()
            .unwrap()
            .iter()
            .filter(|upsert| upsert.created)
            .count()
    }

    /// Number of upserts seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.upserts.lock().unwrap().len()
    }

    /// Whether no upsert has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upserts.lock().unwrap().is_empty()
    }

    /// Forget everything seen so far.
    pub fn clear(&self) {
        self.upserts.lock().unwrap().clear();
    }
}

impl RegistryObserver for RecordingObserver {
    fn on_upsert(&self, change: &RegistryChange<'_>) {
        self.upserts.lock().unwrap().push(RecordedUpsert {
            record: change.record.clone(),
            created: change.created,
        });
    }
}
