//! # Alarm Aggregator Testing
//!
//! Testing utilities for the alarm aggregator.
//!
//! This crate provides:
//! - In-memory implementations of the transport traits
//! - A registry observer that records every upsert
//! - Event fixtures with deterministic timestamps
//! - A fluent harness around [`EventDispatcher`](alarm_aggregator_core::EventDispatcher)
//! - proptest strategies for alarm names and attribute payloads
//!
//! ## Example
//!
//! ```
//! use alarm_aggregator_testing::{DispatcherTestHarness, fixtures};
//! use serde_json::json;
//!
//! let mut harness = DispatcherTestHarness::new();
//! harness
//!     .given_events([
//!         fixtures::registration("alarm1", json!({"category": "Safety"}), 100),
//!         fixtures::activation("alarm1", json!({"sevr": "MAJOR"}), 105),
//!         fixtures::clear("alarm1", 110),
//!     ])
//!     .unwrap()
//!     .then_record("alarm1", |record| {
//!         assert_eq!(record.severity(), "ALARM");
//!         assert_eq!(record.state_change(), Some(fixtures::at(105)));
//!     });
//! ```

mod harness;
mod source_mocks;

pub use harness::DispatcherTestHarness;
pub use source_mocks::{InMemoryEventSource, RecordedUpsert, RecordingAckSink, RecordingObserver};

/// Event fixtures on the default topics.
///
/// Timestamps are given in milliseconds since the Unix epoch so test
/// timelines read as plain numbers.
pub mod fixtures {
    use alarm_aggregator_core::dispatcher::{
        DEFAULT_ACTIVATION_TOPIC, DEFAULT_REGISTRATION_TOPIC, DEFAULT_STATE_TOPIC,
    };
    use alarm_aggregator_core::{DateTime, IncomingEvent, Utc};
    use serde_json::Value;

    /// The instant `millis` milliseconds after the Unix epoch.
    ///
    /// Out-of-range values collapse to the epoch.
    ///
    /// # Example
    ///
    /// ```
    /// use alarm_aggregator_testing::fixtures::at;
    ///
    /// assert_eq!(at(1_500).timestamp_millis(), 1_500);
    /// ```
    #[must_use]
    pub fn at(millis: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default()
    }

    /// Registration of `name` with the given attributes.
    #[must_use]
    pub fn registration(name: &str, attributes: Value, millis: i64) -> IncomingEvent {
        IncomingEvent::new(DEFAULT_REGISTRATION_TOPIC, name, attributes, at(millis))
    }

    /// Registration tombstone for `name`.
    #[must_use]
    pub fn retraction(name: &str, millis: i64) -> IncomingEvent {
        IncomingEvent::tombstone(DEFAULT_REGISTRATION_TOPIC, name, at(millis))
    }

    /// Activation of `name` with the given payload.
    #[must_use]
    pub fn activation(name: &str, payload: Value, millis: i64) -> IncomingEvent {
        IncomingEvent::new(DEFAULT_ACTIVATION_TOPIC, name, payload, at(millis))
    }

    /// Activation tombstone (clear) for `name`.
    #[must_use]
    pub fn clear(name: &str, millis: i64) -> IncomingEvent {
        IncomingEvent::tombstone(DEFAULT_ACTIVATION_TOPIC, name, at(millis))
    }

    /// Discrete state transition of `name` with the given payload.
    #[must_use]
    pub fn state_change(name: &str, payload: Value, millis: i64) -> IncomingEvent {
        IncomingEvent::new(DEFAULT_STATE_TOPIC, name, payload, at(millis))
    }
}

/// proptest strategies for alarm inputs.
pub mod properties {
    use proptest::prelude::*;
    use serde_json::{Map, Value, json};

    /// Non-empty alarm names as seen in control systems.
    pub fn alarm_name() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9:_-]{0,31}"
    }

    /// Scalar JSON attribute values (no arrays, no nested objects).
    pub fn scalar_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-z ]{0,12}".prop_map(Value::String),
        ]
    }

    /// Attribute objects whose keys all start with `prefix_`.
    ///
    /// Two payloads built from different prefixes never share a key.
    pub fn attributes(prefix: &'static str) -> impl Strategy<Value = Value> {
        prop::collection::btree_map("[a-z]{1,8}", scalar_value(), 0..6).prop_map(move |map| {
            Value::Object(
                map.into_iter()
                    .map(|(key, value)| (format!("{prefix}_{key}"), value))
                    .collect::<Map<String, Value>>(),
            )
        })
    }
}
