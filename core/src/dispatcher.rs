//! Routing of incoming events to the registry and merge engine.
//!
//! The dispatcher resolves an event's topic to a [`Stream`], looks up the
//! alarm, runs the matching merge path and stores the result. Per alarm, the
//! record moves through these conceptual states (derivable from its fields,
//! never stored as such):
//!
//! ```text
//!  Unknown ──any stream──► Placeholder ──registration──► Registered
//!     │                                                    │  ▲
//!     └──────────────registration──────────────────────────┘  │
//!                                                            activation /
//!                                                            discrete state
//! ```
//!
//! There is no terminal state. Unroutable topics and empty keys are surfaced
//! as [`DispatchError`]s and leave the registry untouched.
//!
//! # Example
//!
//! ```
//! use alarm_aggregator_core::dispatcher::{DispatchOutcome, EventDispatcher};
//! use alarm_aggregator_core::event::IncomingEvent;
//! use chrono::Utc;
//! use serde_json::json;
//!
//! let mut dispatcher = EventDispatcher::default();
//!
//! let dispatched = dispatcher
//!     .process(&IncomingEvent::new("active-alarms", "alarm1", json!({"sevr": "MAJOR"}), Utc::now()))
//!     .unwrap();
//! assert!(dispatched.created);
//! assert_eq!(dispatched.outcome, DispatchOutcome::Activated);
//! assert!(dispatched.record.registered().is_none());
//!
//! let unknown = dispatcher.process(&IncomingEvent::tombstone("overrides", "alarm1", Utc::now()));
//! assert!(unknown.is_err());
//! ```

use crate::event::{IncomingEvent, Stream};
use crate::merger::{AlarmMerger, Merged};
use crate::record::{AlarmRecord, field};
use crate::registry::AlarmRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Default topic carrying registrations.
pub const DEFAULT_REGISTRATION_TOPIC: &str = "registered-alarms";
/// Default topic carrying activations.
pub const DEFAULT_ACTIVATION_TOPIC: &str = "active-alarms";
/// Default topic carrying discrete state transitions.
pub const DEFAULT_STATE_TOPIC: &str = "alarm-state";

/// Errors surfaced by [`EventDispatcher::process`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The event's topic is not mapped to any stream.
    #[error("Unroutable topic '{topic}' (key '{key}')")]
    UnroutableTopic {
        /// The unknown topic
        topic: String,
        /// The event key
        key: String,
    },

    /// The event has an empty key, so it names no alarm.
    #[error("Event on topic '{topic}' has an empty alarm name")]
    EmptyAlarmName {
        /// The topic the event came from
        topic: String,
    },
}

/// Mapping between wire topic names and streams.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMap {
    /// Registration topic.
    pub registration: String,
    /// Activation topic.
    pub activation: String,
    /// Discrete-state topic.
    pub discrete_state: String,
}

impl TopicMap {
    /// Create a topic map from explicit names.
    #[must_use]
    pub fn new(
        registration: impl Into<String>,
        activation: impl Into<String>,
        discrete_state: impl Into<String>,
    ) -> Self {
        Self {
            registration: registration.into(),
            activation: activation.into(),
            discrete_state: discrete_state.into(),
        }
    }

    /// The stream `topic` feeds, if any.
    #[must_use]
    pub fn resolve(&self, topic: &str) -> Option<Stream> {
        Stream::ALL.into_iter().find(|stream| self.topic(*stream) == topic)
    }

    /// The topic feeding `stream`.
    #[must_use]
    pub fn topic(&self, stream: Stream) -> &str {
        match stream {
            Stream::Registration => &self.registration,
            Stream::Activation => &self.activation,
            Stream::DiscreteState => &self.discrete_state,
        }
    }

    /// All topic names, in stream order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        Stream::ALL
            .into_iter()
            .map(|stream| self.topic(stream).to_string())
            .collect()
    }
}

impl Default for TopicMap {
    fn default() -> Self {
        Self::new(
            DEFAULT_REGISTRATION_TOPIC,
            DEFAULT_ACTIVATION_TOPIC,
            DEFAULT_STATE_TOPIC,
        )
    }
}

/// What an event did to its alarm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// First registration of the alarm, including a placeholder's.
    Registered,
    /// Registration of an alarm whose registration was seen before.
    Reregistered,
    /// Registration tombstone.
    Retracted,
    /// Activation with a payload.
    Activated,
    /// Activation tombstone.
    Cleared,
    /// Discrete state transition.
    StateChanged,
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Registered => "registered",
            Self::Reregistered => "reregistered",
            Self::Retracted => "retracted",
            Self::Activated => "activated",
            Self::Cleared => "cleared",
            Self::StateChanged => "state-changed",
        };
        f.write_str(label)
    }
}

/// Result of dispatching one event.
#[derive(Clone, Debug, PartialEq)]
pub struct Dispatched {
    /// The record as stored after the event.
    pub record: AlarmRecord,
    /// Stream the event arrived on.
    pub stream: Stream,
    /// What the event did.
    pub outcome: DispatchOutcome,
    /// Whether the alarm was new to the registry.
    pub created: bool,
    /// Attributes that could not be merged.
    pub dropped_fields: Vec<String>,
    /// The payload was present but not an attribute object.
    pub malformed: bool,
}

/// Routes events to the merge engine and keeps the registry current.
#[derive(Clone, Debug, Default)]
pub struct EventDispatcher {
    registry: AlarmRegistry,
    merger: AlarmMerger,
    topics: TopicMap,
}

impl EventDispatcher {
    /// Create a dispatcher from its parts.
    #[must_use]
    pub const fn new(registry: AlarmRegistry, merger: AlarmMerger, topics: TopicMap) -> Self {
        Self {
            registry,
            merger,
            topics,
        }
    }

    /// Replace the topic map (builder style).
    #[must_use]
    pub fn with_topics(mut self, topics: TopicMap) -> Self {
        self.topics = topics;
        self
    }

    /// The topic map.
    #[must_use]
    pub const fn topics(&self) -> &TopicMap {
        &self.topics
    }

    /// The registry.
    #[must_use]
    pub const fn registry(&self) -> &AlarmRegistry {
        &self.registry
    }

    /// Mutable access to the registry, for retention policies.
    pub const fn registry_mut(&mut self) -> &mut AlarmRegistry {
        &mut self.registry
    }

    /// The merge engine.
    #[must_use]
    pub const fn merger(&self) -> &AlarmMerger {
        &self.merger
    }

    /// Shorthand for `registry().lookup(name)`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&AlarmRecord> {
        self.registry.lookup(name)
    }

    /// Apply one event and return the affected record.
    ///
    /// 1. Registration events create or update the record through the
    ///    registration path.
    /// 2. Any other event for an unknown alarm creates a placeholder.
    /// 3. Activation and discrete-state events run their merge path.
    /// 4. The record is stored, even when nothing changed.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnroutableTopic`] if the topic maps to no
    /// stream and [`DispatchError::EmptyAlarmName`] if the key is empty. The
    /// registry is not touched in either case.
    pub fn process(&mut self, event: &IncomingEvent) -> Result<Dispatched, DispatchError> {
        let stream =
            self.topics
                .resolve(&event.topic)
                .ok_or_else(|| DispatchError::UnroutableTopic {
                    topic: event.topic.clone(),
                    key: event.key.clone(),
                })?;

        if event.key.is_empty() {
            return Err(DispatchError::EmptyAlarmName {
                topic: event.topic.clone(),
            });
        }

        let existing = self.registry.lookup(&event.key).cloned();
        let created = existing.is_none();
        let seen_registration = existing.as_ref().is_some_and(has_registration_history);
        let Merged { record, report } = self.merger.apply(existing, stream, event);
        let outcome = outcome_of(stream, event, seen_registration);

        let record = self.registry.upsert(record).clone();

        Ok(Dispatched {
            record,
            stream,
            outcome,
            created,
            dropped_fields: report.dropped_fields,
            malformed: report.malformed,
        })
    }
}

/// A registration or retraction has been applied to `record` before.
fn has_registration_history(record: &AlarmRecord) -> bool {
    record.get(field::REGISTERED).is_some() || record.get(field::UNREGISTERED).is_some()
}

const fn outcome_of(
    stream: Stream,
    event: &IncomingEvent,
    seen_registration: bool,
) -> DispatchOutcome {
    match (stream, event.is_tombstone()) {
        (Stream::Registration, true) => DispatchOutcome::Retracted,
        (Stream::Registration, false) if seen_registration => DispatchOutcome::Reregistered,
        (Stream::Registration, false) => DispatchOutcome::Registered,
        (Stream::Activation, true) => DispatchOutcome::Cleared,
        (Stream::Activation, false) => DispatchOutcome::Activated,
        (Stream::DiscreteState, _) => DispatchOutcome::StateChanged,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::value::FieldValue;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn topic_map_resolves_defaults() {
        let topics = TopicMap::default();
        assert_eq!(topics.resolve("registered-alarms"), Some(Stream::Registration));
        assert_eq!(topics.resolve("active-alarms"), Some(Stream::Activation));
        assert_eq!(topics.resolve("alarm-state"), Some(Stream::DiscreteState));
        assert_eq!(topics.resolve("overridden-alarms"), None);
        assert_eq!(
            topics.names(),
            vec!["registered-alarms", "active-alarms", "alarm-state"]
        );
    }

    #[test]
    fn custom_topics_route() {
        let mut dispatcher =
            EventDispatcher::default().with_topics(TopicMap::new("reg", "act", "st"));

        let dispatched = dispatcher
            .process(&IncomingEvent::new("reg", "a", json!({}), at(1)))
            .unwrap();
        assert_eq!(dispatched.stream, Stream::Registration);

        let err = dispatcher
            .process(&IncomingEvent::new("registered-alarms", "a", json!({}), at(2)))
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnroutableTopic { .. }));
    }

    #[test]
    fn unroutable_topic_leaves_registry_untouched() {
        let mut dispatcher = EventDispatcher::default();
        let err = dispatcher
            .process(&IncomingEvent::new("overridden-alarms", "a", json!({}), at(1)))
            .unwrap_err();

        assert_eq!(
            err,
            DispatchError::UnroutableTopic {
                topic: "overridden-alarms".to_string(),
                key: "a".to_string(),
            }
        );
        assert!(dispatcher.registry().is_empty());
    }

    #[test]
    fn empty_key_is_rejected() {
        let mut dispatcher = EventDispatcher::default();
        let err = dispatcher
            .process(&IncomingEvent::new("active-alarms", "", json!({}), at(1)))
            .unwrap_err();
        assert!(matches!(err, DispatchError::EmptyAlarmName { .. }));
        assert!(dispatcher.registry().is_empty());
    }

    #[test]
    fn outcomes_follow_stream_and_payload() {
        let mut dispatcher = EventDispatcher::default();
        let mut outcome = |event: IncomingEvent| dispatcher.process(&event).unwrap().outcome;

        assert_eq!(
            outcome(IncomingEvent::new("registered-alarms", "a", json!({}), at(1))),
            DispatchOutcome::Registered
        );
        assert_eq!(
            outcome(IncomingEvent::new("registered-alarms", "a", json!({}), at(2))),
            DispatchOutcome::Reregistered
        );
        assert_eq!(
            outcome(IncomingEvent::new("active-alarms", "a", json!({"sevr": "MINOR"}), at(3))),
            DispatchOutcome::Activated
        );
        assert_eq!(
            outcome(IncomingEvent::tombstone("active-alarms", "a", at(4))),
            DispatchOutcome::Cleared
        );
        assert_eq!(
            outcome(IncomingEvent::new("alarm-state", "a", json!({"state": "Active"}), at(5))),
            DispatchOutcome::StateChanged
        );
        assert_eq!(
            outcome(IncomingEvent::tombstone("registered-alarms", "a", at(6))),
            DispatchOutcome::Retracted
        );
    }

    #[test]
    fn forward_reference_creates_placeholder_then_fills_in() {
        let mut dispatcher = EventDispatcher::default();

        let first = dispatcher
            .process(&IncomingEvent::new("active-alarms", "X", json!({"sevr": "MAJOR"}), at(5)))
            .unwrap();
        assert!(first.created);
        assert!(first.record.state().is_none());

        let second = dispatcher
            .process(&IncomingEvent::new(
                "registered-alarms",
                "X",
                json!({"category": "Safety"}),
                at(10),
            ))
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.outcome, DispatchOutcome::Registered);
        assert_eq!(second.record.severity(), "MAJOR");
        assert_eq!(second.record.registered(), Some(at(10)));
        assert_eq!(second.record.get("category"), Some(&FieldValue::from("Safety")));
    }

    #[test]
    fn retraction_is_dispatched_and_stored() {
        let mut dispatcher = EventDispatcher::default();
        dispatcher
            .process(&IncomingEvent::new("registered-alarms", "a", json!({}), at(1)))
            .unwrap();

        let dispatched = dispatcher
            .process(&IncomingEvent::tombstone("registered-alarms", "a", at(2)))
            .unwrap();

        assert_eq!(dispatched.outcome, DispatchOutcome::Retracted);
        let stored = dispatcher.lookup("a").unwrap();
        assert_eq!(stored.get(field::REGISTERED), Some(&FieldValue::Null));
        assert_eq!(stored.unregistered(), Some(at(2)));
    }

    #[test]
    fn dropped_fields_are_surfaced() {
        let mut dispatcher = EventDispatcher::default();
        let dispatched = dispatcher
            .process(&IncomingEvent::new(
                "registered-alarms",
                "a",
                json!({"masks": [1], "category": "Safety"}),
                at(1),
            ))
            .unwrap();

        assert_eq!(dispatched.dropped_fields, vec!["masks".to_string()]);
        assert!(!dispatched.malformed);
        assert!(dispatched.record.get("category").is_some());
    }

    #[test]
    fn registration_after_retraction_is_reregistration() {
        let mut dispatcher = EventDispatcher::default();
        let mut outcome = |event: IncomingEvent| dispatcher.process(&event).unwrap().outcome;

        assert_eq!(
            outcome(IncomingEvent::tombstone("registered-alarms", "ghost", at(1))),
            DispatchOutcome::Retracted
        );
        assert_eq!(
            outcome(IncomingEvent::new("registered-alarms", "ghost", json!({}), at(2))),
            DispatchOutcome::Reregistered
        );
    }

    #[test]
    fn placeholder_from_state_stream_is_first_registered() {
        let mut dispatcher = EventDispatcher::default();
        dispatcher
            .process(&IncomingEvent::new("alarm-state", "X", json!({"state": "Active"}), at(1)))
            .unwrap();

        let dispatched = dispatcher
            .process(&IncomingEvent::new("registered-alarms", "X", json!({}), at(2)))
            .unwrap();
        assert!(!dispatched.created);
        assert_eq!(dispatched.outcome, DispatchOutcome::Registered);
        assert_eq!(dispatched.record.state_name().as_deref(), Some("active"));
    }
}
