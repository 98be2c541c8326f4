//! Incoming update events and the streams they arrive on.
//!
//! An [`IncomingEvent`] is what the transport hands the core: the topic it
//! was read from, the key (the alarm name), the decoded payload and the
//! broker timestamp. A `None` payload is a tombstone.
//!
//! # Example
//!
//! ```
//! use alarm_aggregator_core::event::IncomingEvent;
//! use chrono::Utc;
//! use serde_json::json;
//!
//! let active = IncomingEvent::new(
//!     "active-alarms",
//!     "alarm1",
//!     json!({"msg": {"sevr": "MAJOR", "stat": "HIHI"}}),
//!     Utc::now(),
//! );
//! assert!(!active.is_tombstone());
//!
//! let cleared = IncomingEvent::tombstone("active-alarms", "alarm1", Utc::now());
//! assert!(cleared.is_tombstone());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The facet of alarm state a stream carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    /// Defining/classifying attributes (class, location, category, priority).
    Registration,
    /// Live severity and status; tombstones clear the alarm.
    Activation,
    /// Explicit lifecycle-state transitions.
    DiscreteState,
}

impl Stream {
    /// All streams, in dependency order.
    pub const ALL: [Self; 3] = [Self::Registration, Self::Activation, Self::DiscreteState];
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registration => f.write_str("registration"),
            Self::Activation => f.write_str("activation"),
            Self::DiscreteState => f.write_str("discrete-state"),
        }
    }
}

/// One keyed update read from a topic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IncomingEvent {
    /// Topic the event was read from.
    pub topic: String,
    /// Alarm name.
    pub key: String,
    /// Decoded payload; `None` for a tombstone.
    pub value: Option<serde_json::Value>,
    /// Broker timestamp of the event.
    pub timestamp: DateTime<Utc>,
}

impl IncomingEvent {
    /// Create an event carrying a payload.
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        key: impl Into<String>,
        value: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            topic: topic.into(),
            key: key.into(),
            value: Some(value),
            timestamp,
        }
    }

    /// Create a tombstone (null-valued) event.
    #[must_use]
    pub fn tombstone(
        topic: impl Into<String>,
        key: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            topic: topic.into(),
            key: key.into(),
            value: None,
            timestamp,
        }
    }

    /// Whether the payload is null.
    #[must_use]
    pub const fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}

impl fmt::Display for IncomingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IncomingEvent {{ topic: {}, key: {}, tombstone: {} }}",
            self.topic,
            self.key,
            self.is_tombstone()
        )
    }
}
