//! Fluent test harness around [`EventDispatcher`].

#![allow(clippy::missing_panics_doc)] // Assertion helpers panic by design

use crate::source_mocks::RecordingObserver;
use alarm_aggregator_core::{
    AlarmMerger, AlarmRecord, AlarmRegistry, DispatchError, DispatchOutcome, Dispatched,
    EventDispatcher, IncomingEvent, SymbolCatalog, TopicMap,
};
use std::sync::Arc;

/// Test harness for the dispatcher providing a given/then API.
///
/// The harness owns a dispatcher wired to a [`RecordingObserver`] and keeps
/// every [`Dispatched`] result for later assertions.
///
/// # Example
///
/// ```
/// use alarm_aggregator_core::DispatchOutcome;
/// use alarm_aggregator_testing::{DispatcherTestHarness, fixtures};
/// use serde_json::json;
///
/// let mut harness = DispatcherTestHarness::new();
/// harness
///     .given_event(fixtures::activation("alarm1", json!({"sevr": "MINOR"}), 1))
///     .unwrap()
///     .then_outcomes(&[DispatchOutcome::Activated])
///     .then_record("alarm1", |record| assert!(!record.is_registered()));
/// ```
#[derive(Debug)]
pub struct DispatcherTestHarness {
    dispatcher: EventDispatcher,
    observer: RecordingObserver,
    dispatched: Vec<Dispatched>,
}

impl DispatcherTestHarness {
    /// Harness over the default catalog and topics.
    #[must_use]
    pub fn new() -> Self {
        Self::with_parts(SymbolCatalog::default(), TopicMap::default())
    }

    /// Harness over a custom catalog and topic map.
    #[must_use]
    pub fn with_parts(catalog: SymbolCatalog, topics: TopicMap) -> Self {
        let observer = RecordingObserver::new();
        let registry = AlarmRegistry::new().with_observer(Arc::new(observer.clone()));
        let merger = AlarmMerger::new(Arc::new(catalog));
        let dispatcher = EventDispatcher::new(registry, merger, topics);

        Self {
            dispatcher,
            observer,
            dispatched: Vec::new(),
        }
    }

    /// Dispatch a single event.
    ///
    /// # Errors
    ///
    /// Returns the dispatcher's [`DispatchError`].
    pub fn given_event(&mut self, event: IncomingEvent) -> Result<&mut Self, DispatchError> {
        let dispatched = self.dispatcher.process(&event)?;
        self.dispatched.push(dispatched);
        Ok(self)
    }

    /// Dispatch events in order, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first [`DispatchError`]; earlier events stay applied.
    pub fn given_events(
        &mut self,
        events: impl IntoIterator<Item = IncomingEvent>,
    ) -> Result<&mut Self, DispatchError> {
        for event in events {
            self.given_event(event)?;
        }
        Ok(self)
    }

    /// Assert that `name` exists and run `assertion` on it.
    pub fn then_record<F>(&self, name: &str, assertion: F) -> &Self
    where
        F: FnOnce(&AlarmRecord),
    {
        let record = self.dispatcher.lookup(name);
        assert!(
            record.is_some(),
            "Expected registry to contain alarm '{name}', but it was not found"
        );
        if let Some(record) = record {
            assertion(record);
        }
        self
    }

    /// Assert that `name` is not in the registry.
    pub fn then_absent(&self, name: &str) -> &Self {
        assert!(
            self.dispatcher.lookup(name).is_none(),
            "Expected registry to NOT contain alarm '{name}', but it was found"
        );
        self
    }

    /// Assert the registry size.
    pub fn then_len(&self, expected: usize) -> &Self {
        assert_eq!(
            self.dispatcher.registry().len(),
            expected,
            "Unexpected number of alarms in registry"
        );
        self
    }

    /// Assert the outcomes of all events dispatched so far.
    pub fn then_outcomes(&self, expected: &[DispatchOutcome]) -> &Self {
        let outcomes: Vec<_> = self.dispatched.iter().map(|d| d.outcome).collect();
        assert_eq!(outcomes, expected, "Unexpected dispatch outcomes");
        self
    }

    /// All results dispatched so far.
    #[must_use]
    pub fn dispatched(&self) -> &[Dispatched] {
        &self.dispatched
    }

    /// The result of the most recent event.
    #[must_use]
    pub fn last(&self) -> Option<&Dispatched> {
        self.dispatched.last()
    }

    /// The observer wired into the registry.
    #[must_use]
    pub const fn observer(&self) -> &RecordingObserver {
        &self.observer
    }

    /// The dispatcher under test.
    #[must_use]
    pub const fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }
}

impl Default for DispatcherTestHarness {
    fn default() -> Self {
        Self::new()
    }
}
