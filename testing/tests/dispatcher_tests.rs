//! Dispatcher behaviour exercised through the test harness

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use alarm_aggregator_core::record::field;
use alarm_aggregator_core::{
    DispatchError, DispatchOutcome, FieldValue, IncomingEvent, Stream, SymbolCatalog, TopicMap,
};
use alarm_aggregator_testing::properties::{alarm_name, attributes};
use alarm_aggregator_testing::{DispatcherTestHarness, fixtures};
use proptest::prelude::*;
use serde_json::json;

#[test]
fn retraction_keeps_record_and_marks_unregistered() {
    let mut harness = DispatcherTestHarness::new();
    harness
        .given_events([
            fixtures::registration("alarm1", json!({"location": "Injector"}), 10),
            fixtures::activation("alarm1", json!({"sevr": "MAJOR"}), 20),
            fixtures::retraction("alarm1", 30),
        ])
        .unwrap()
        .then_outcomes(&[
            DispatchOutcome::Registered,
            DispatchOutcome::Activated,
            DispatchOutcome::Retracted,
        ])
        .then_record("alarm1", |record| {
            assert_eq!(record.get(field::REGISTERED), Some(&FieldValue::Null));
            assert_eq!(record.unregistered(), Some(fixtures::at(30)));
            assert!(!record.is_registered());
            assert_eq!(record.severity(), "MAJOR");
            assert_eq!(record.get("location"), Some(&FieldValue::from("Injector")));
        });
}

#[test]
fn reregistration_after_retraction_restores_registered() {
    let mut harness = DispatcherTestHarness::new();
    harness
        .given_events([
            fixtures::registration("alarm1", json!({}), 10),
            fixtures::retraction("alarm1", 20),
            fixtures::registration("alarm1", json!({"priority": "P2"}), 30),
        ])
        .unwrap()
        .then_record("alarm1", |record| {
            assert_eq!(record.registered(), Some(fixtures::at(30)));
            assert_eq!(record.get(field::UNREGISTERED), Some(&FieldValue::Null));
            assert_eq!(record.priority_name().as_deref(), Some("p2"));
        });

    assert_eq!(
        harness.last().map(|d| d.outcome),
        Some(DispatchOutcome::Reregistered)
    );
}

#[test]
fn retraction_of_unknown_alarm_creates_placeholder() {
    let mut harness = DispatcherTestHarness::new();
    harness
        .given_event(fixtures::retraction("ghost", 5))
        .unwrap()
        .then_len(1)
        .then_record("ghost", |record| {
            assert_eq!(record.unregistered(), Some(fixtures::at(5)));
            assert!(record.state().is_none());
        });
    assert!(harness.last().unwrap().created);
}

#[test]
fn state_event_before_registration_keeps_its_state() {
    let mut harness = DispatcherTestHarness::new();
    harness
        .given_events([
            fixtures::state_change("alarm1", json!({"state": "Active"}), 1),
            fixtures::registration("alarm1", json!({"category": "RF"}), 2),
        ])
        .unwrap()
        .then_record("alarm1", |record| {
            assert_eq!(record.state_name().as_deref(), Some("active"));
            assert_eq!(record.state_change(), Some(fixtures::at(1)));
            assert!(record.is_registered());
        });
}

#[test]
fn state_tombstone_only_touches_statechange() {
    let mut harness = DispatcherTestHarness::new();
    harness
        .given_events([
            fixtures::registration("alarm1", json!({"category": "RF"}), 1),
            IncomingEvent::tombstone("alarm-state", "alarm1", fixtures::at(9)),
        ])
        .unwrap()
        .then_record("alarm1", |record| {
            assert_eq!(record.state_change(), Some(fixtures::at(9)));
            assert_eq!(record.state_name().as_deref(), Some("normal"));
            assert_eq!(record.category_name().as_deref(), Some("rf"));
        });
}

#[test]
fn observer_sees_each_upsert_once() {
    let mut harness = DispatcherTestHarness::new();
    harness
        .given_events([
            fixtures::activation("a", json!({"sevr": "MINOR"}), 1),
            fixtures::registration("a", json!({}), 2),
            fixtures::registration("b", json!({}), 3),
            fixtures::clear("a", 4),
        ])
        .unwrap();

    let observer = harness.observer();
    assert_eq!(observer.names(), vec!["a", "a", "b", "a"]);
    assert_eq!(observer.created_count(), 2);
    assert_eq!(
        observer.upserts().last().unwrap().record,
        harness.dispatcher().lookup("a").cloned().unwrap()
    );
}

#[test]
fn unroutable_and_unnamed_events_are_rejected() {
    let mut harness = DispatcherTestHarness::new();

    let err = harness
        .given_event(IncomingEvent::new("overridden-alarms", "a", json!({}), fixtures::at(1)))
        .unwrap_err();
    assert_eq!(
        err,
        DispatchError::UnroutableTopic {
            topic: "overridden-alarms".to_string(),
            key: "a".to_string(),
        }
    );

    let err = harness.given_event(fixtures::clear("", 2)).unwrap_err();
    assert!(matches!(err, DispatchError::EmptyAlarmName { .. }));

    harness.then_len(0);
    assert!(harness.observer().is_empty());
}

#[test]
fn array_attributes_are_dropped_and_reported() {
    let mut harness = DispatcherTestHarness::new();
    harness
        .given_event(fixtures::registration(
            "alarm1",
            json!({"category": "RF", "screens": ["a", "b"]}),
            1,
        ))
        .unwrap()
        .then_record("alarm1", |record| {
            assert!(record.get("screens").is_none());
            assert!(record.get("category").is_some());
        });

    assert_eq!(harness.last().unwrap().dropped_fields, vec!["screens"]);
}

#[test]
fn custom_topics_and_catalog_are_honoured() {
    let mut catalog = SymbolCatalog::default();
    catalog.insert("priority", ["P1_LIFE", "P2_PROPERTY"]).unwrap();
    let topics = TopicMap::new("reg", "act", "st");

    let mut harness = DispatcherTestHarness::with_parts(catalog, topics);
    harness
        .given_event(IncomingEvent::new(
            "reg",
            "alarm1",
            json!({"priority": "P2_PROPERTY"}),
            fixtures::at(1),
        ))
        .unwrap()
        .then_record("alarm1", |record| {
            assert_eq!(record.priority_code(), Some(1));
            assert_eq!(record.priority_name().as_deref(), Some("p2_property"));
        });

    assert_eq!(harness.last().unwrap().stream, Stream::Registration);
    assert!(harness.given_event(fixtures::clear("alarm1", 2)).is_err());
}

proptest! {
    #[test]
    fn activation_and_state_commute_on_disjoint_fields(
        name in alarm_name(),
        activation in attributes("act"),
        state in attributes("st"),
        millis in 0_i64..1_000_000,
    ) {
        let events = [
            fixtures::activation(&name, activation, millis),
            fixtures::state_change(&name, state, millis),
        ];

        let mut forward = DispatcherTestHarness::new();
        forward.given_events(events.clone()).unwrap();

        let mut backward = DispatcherTestHarness::new();
        backward.given_events(events.into_iter().rev()).unwrap();

        prop_assert_eq!(
            forward.dispatcher().lookup(&name),
            backward.dispatcher().lookup(&name)
        );
    }
}
