//! Kafka-compatible transport for the alarm aggregator.
//!
//! This crate connects the engine in `alarm-aggregator-core` to Redpanda, Apache
//! Kafka or any other broker speaking the Kafka protocol, using rdkafka.
//!
//! Two independent components share one [`ConnectionSettings`]:
//!
//! - [`AlarmConsumer`] implements [`EventSource`](alarm_aggregator_core::EventSource):
//!   it replays and follows the registration, activation and state topics
//! - [`AckProducer`] implements [`AckSink`](alarm_aggregator_core::AckSink):
//!   it publishes null-valued acknowledgement records
//!
//! # Architecture
//!
//! ```text
//!             ┌────────────────────┐
//!             │ ConnectionSettings │
//!             └─────────┬──────────┘
//!              ┌────────┴────────┐
//!              ▼                 ▼
//!     ┌───────────────┐   ┌─────────────┐
//!     │ AlarmConsumer │   │ AckProducer │
//!     └───────┬───────┘   └──────┬──────┘
//!             │ IncomingEvent    │ null record + headers
//!             ▼                  ▼
//!      AlarmProcessor        ack topic
//! ```
//!
//! # Delivery Semantics
//!
//! Every consumer starts in a fresh consumer group reading from the earliest
//! offset, so the complete (compacted) history of each topic is replayed on
//! startup before live events follow. Merges are idempotent apart from
//! timestamps, which makes the replay safe. A consumer built with
//! `follow(false)` stops after the replay instead, once every partition has
//! been read up to the end offset it had at subscribe time.
//!
//! Payloads are JSON documents. An empty or absent payload is a tombstone.
//!
//! # Example
//!
//! ```no_run
//! use alarm_aggregator_core::{AlarmProcessor, EventDispatcher};
//! use alarm_aggregator_redpanda::{AlarmConsumer, ConnectionSettings};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = ConnectionSettings::from_env();
//! let consumer = AlarmConsumer::builder(settings).name("alarm-monitor").build()?;
//!
//! let (mut processor, _shutdown) =
//!     AlarmProcessor::new(EventDispatcher::default(), Arc::new(consumer));
//! processor.run().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod consumer;
mod producer;
mod replay;
mod settings;

pub use consumer::{AlarmConsumer, AlarmConsumerBuilder, DEFAULT_BUFFER_SIZE, decode_message};
pub use producer::{AckIdentity, AckProducer, DEFAULT_ACK_TOPIC};
pub use replay::ReplayProgress;
pub use settings::{
    ConnectionSettings, DEFAULT_BOOTSTRAP_SERVERS, DEFAULT_CLIENT_ID, DEFAULT_SCHEMA_REGISTRY,
};
