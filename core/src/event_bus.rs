//! Transport abstractions the engine consumes from and acknowledges to.
//!
//! The engine never talks to a broker directly. It consumes decoded
//! [`IncomingEvent`]s from an [`EventSource`] and sends acknowledgements
//! through an [`AckSink`]. Sender and receiver are independent components;
//! they only share connection settings in their concrete implementations.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │   Broker (registered / active / state)   │
//! └──────────────────┬───────────────────────┘
//!                    │ keyed, per-key ordered
//!                    ▼
//!            ┌───────────────┐
//!            │  EventSource  │
//!            └───────┬───────┘
//!                    │ IncomingEvent
//!                    ▼
//!            ┌───────────────┐        ┌───────────┐
//!            │AlarmProcessor │        │  AckSink  │──► ack topic
//!            └───────┬───────┘        └───────────┘
//!                    ▼
//!            ┌───────────────┐
//!            │EventDispatcher│
//!            └───────────────┘
//! ```
//!
//! # Delivery assumptions
//!
//! - Events for one alarm name arrive in production order
//! - Tombstones arrive as events with `value = None`
//! - The source may replay history on startup; merges are idempotent apart
//!   from timestamps
//!
//! # Implementations
//!
//! - `AlarmConsumer` / `AckProducer` in `alarm-aggregator-redpanda` - Kafka-compatible brokers
//! - `InMemoryEventSource` / `RecordingAckSink` in `alarm-aggregator-testing` - tests

use crate::event::IncomingEvent;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur while consuming or acknowledging.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Failed to connect to the broker
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to subscribe to topics
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe
        topics: Vec<String>,
        /// The reason for failure
        reason: String,
    },

    /// A message could not be decoded into an event
    #[error("Decode failed on topic '{topic}': {reason}")]
    Decode {
        /// The topic the message came from
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to publish to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Network or transport error
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Stream of incoming events from a subscription.
///
/// Each item is either a decoded event or a per-message error; an error does
/// not end the stream.
pub type EventStream =
    Pin<Box<dyn Stream<Item = Result<IncomingEvent, TransportError>> + Send>>;

/// Source of incoming alarm events.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so it can be held as
/// `Arc<dyn EventSource>` by the processor.
pub trait EventSource: Send + Sync {
    /// Subscribe to `topics` and receive their events as one stream.
    ///
    /// Events from different topics are interleaved; events for the same key
    /// keep their relative order.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::SubscriptionFailed`] if the subscription
    /// cannot be established.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, TransportError>> + Send + '_>>;
}

/// Fire-and-forget acknowledgement sender.
pub trait AckSink: Send + Sync {
    /// Acknowledge the alarm `name` by publishing a null-valued record keyed
    /// by the name.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::PublishFailed`] if the broker rejects the
    /// record.
    fn acknowledge(
        &self,
        name: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>>;
}
