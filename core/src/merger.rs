//! Per-stream merge routines.
//!
//! [`AlarmMerger`] turns one incoming event into a field update and applies
//! it to a record. It is pure: no registry access, no logging. Anything
//! worth reporting (dropped attributes, malformed payloads) is returned in a
//! [`MergeReport`] for the caller to act on.
//!
//! # Stream semantics
//!
//! | Stream         | Payload present                                   | Tombstone                                        |
//! |----------------|---------------------------------------------------|--------------------------------------------------|
//! | Registration   | `registered = ts`, attributes merged              | `registered = null`, `unregistered = ts`          |
//! | Activation     | envelope unwrapped, attributes + `statechange = ts` | `sevr = null`, `stat = null`, `statechange` kept |
//! | Discrete state | attributes + `statechange = ts`                   | `statechange = ts` only                          |
//!
//! All merges are last-writer-wins per field.

use crate::catalog::SymbolCatalog;
use crate::decode::{Decoded, decode_attributes, unwrap_envelope};
use crate::event::{IncomingEvent, Stream};
use crate::record::{AlarmRecord, INITIAL_STATE, field};
use crate::value::{FieldValue, Fields};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

/// What a merge could not apply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Dotted paths of attributes that were dropped.
    pub dropped_fields: Vec<String>,
    /// The payload was present but not an attribute object.
    pub malformed: bool,
}

impl MergeReport {
    fn absorb(&mut self, decoded: &Decoded) {
        self.dropped_fields.extend(decoded.dropped.iter().cloned());
        self.malformed |= decoded.malformed;
    }

    /// Whether everything in the payload was applied.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.dropped_fields.is_empty() && !self.malformed
    }
}

/// A record after one merge, plus what was left out.
#[derive(Clone, Debug, PartialEq)]
pub struct Merged {
    /// The next state of the record.
    pub record: AlarmRecord,
    /// Attributes that could not be applied.
    pub report: MergeReport,
}

/// Applies stream events to alarm records.
///
/// Holds the symbol catalog used to turn string attributes into symbols.
#[derive(Clone, Debug, Default)]
pub struct AlarmMerger {
    catalog: Arc<SymbolCatalog>,
}

impl AlarmMerger {
    /// Create a merger resolving symbols through `catalog`.
    #[must_use]
    pub const fn new(catalog: Arc<SymbolCatalog>) -> Self {
        Self { catalog }
    }

    /// The catalog in use.
    #[must_use]
    pub fn catalog(&self) -> &SymbolCatalog {
        &self.catalog
    }

    /// The value a newly registered alarm starts in.
    ///
    /// [`INITIAL_STATE`] resolved through the catalog's `state` list, or
    /// plain text when the catalog does not enumerate it.
    #[must_use]
    pub fn initial_state(&self) -> FieldValue {
        self.catalog
            .resolve(field::STATE, INITIAL_STATE)
            .map_or_else(|| FieldValue::from(INITIAL_STATE), FieldValue::Symbol)
    }

    /// Produce the next state of `record` for an event on `stream`.
    ///
    /// An absent record is created first: from the registration itself on
    /// the registration stream, as a placeholder on the others.
    #[must_use]
    pub fn apply(
        &self,
        record: Option<AlarmRecord>,
        stream: Stream,
        event: &IncomingEvent,
    ) -> Merged {
        let value = event.value.as_ref();
        match stream {
            Stream::Registration => self.register(record, &event.key, value, event.timestamp),
            Stream::Activation => {
                let mut record = record.unwrap_or_else(|| AlarmRecord::placeholder(&event.key));
                let report = self.activate(&mut record, value, event.timestamp);
                Merged { record, report }
            }
            Stream::DiscreteState => {
                let mut record = record.unwrap_or_else(|| AlarmRecord::placeholder(&event.key));
                let report = self.transition(&mut record, value, event.timestamp);
                Merged { record, report }
            }
        }
    }

    /// Registration path.
    ///
    /// A first registration builds the record with `state = Normal`. A
    /// re-registration (or the registration of a placeholder) refreshes
    /// `registered` and merges the attributes; a placeholder also gets the
    /// initial state unless another stream already set one. A tombstone
    /// retracts the registration but keeps the record.
    #[must_use]
    pub fn register(
        &self,
        record: Option<AlarmRecord>,
        name: &str,
        value: Option<&Value>,
        timestamp: DateTime<Utc>,
    ) -> Merged {
        let mut report = MergeReport::default();

        let Some(value) = value else {
            let mut record = record.unwrap_or_else(|| AlarmRecord::placeholder(name));
            retract(&mut record, timestamp);
            return Merged { record, report };
        };

        let decoded = decode_attributes(value, &self.catalog);
        report.absorb(&decoded);

        let record = match record {
            None => {
                AlarmRecord::from_registration(name, timestamp, self.initial_state(), decoded.fields)
            }
            Some(mut record) => {
                record.seed_state(self.initial_state());
                record.set(field::REGISTERED, timestamp);
                if record.get(field::UNREGISTERED).is_some() {
                    record.set(field::UNREGISTERED, FieldValue::Null);
                }
                record.merge_fields(decoded.fields);
                record
            }
        };

        Merged { record, report }
    }

    /// Activation path.
    ///
    /// A tombstone clears `sevr` and `stat` to explicit nulls and leaves
    /// `statechange` untouched.
    pub fn activate(
        &self,
        record: &mut AlarmRecord,
        value: Option<&Value>,
        timestamp: DateTime<Utc>,
    ) -> MergeReport {
        let mut report = MergeReport::default();

        let Some(value) = value else {
            let mut clear = Fields::new();
            clear.insert(field::SEVERITY.to_string(), FieldValue::Null);
            clear.insert(field::STAT.to_string(), FieldValue::Null);
            record.merge_fields(clear);
            return report;
        };

        let mut decoded = decode_attributes(unwrap_envelope(value), &self.catalog);
        report.absorb(&decoded);
        decoded
            .fields
            .insert(field::STATE_CHANGE.to_string(), timestamp.into());
        record.merge_fields(decoded.fields);
        report
    }

    /// Discrete-state path.
    ///
    /// A tombstone is treated as an empty attribute set: only `statechange`
    /// moves.
    pub fn transition(
        &self,
        record: &mut AlarmRecord,
        value: Option<&Value>,
        timestamp: DateTime<Utc>,
    ) -> MergeReport {
        let mut report = MergeReport::default();

        let mut fields = match value {
            Some(value) => {
                let decoded = decode_attributes(value, &self.catalog);
                report.absorb(&decoded);
                decoded.fields
            }
            None => Fields::new(),
        };

        fields.insert(field::STATE_CHANGE.to_string(), timestamp.into());
        record.merge_fields(fields);
        report
    }
}

fn retract(record: &mut AlarmRecord, timestamp: DateTime<Utc>) {
    record.set(field::REGISTERED, FieldValue::Null);
    record.set(field::UNREGISTERED, timestamp);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::value::Symbol;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    fn merger() -> AlarmMerger {
        AlarmMerger::default()
    }

    #[test]
    fn first_registration_creates_normal_record() {
        let merged = merger().register(None, "alarm1", Some(&json!({"category": "Safety"})), at(100));

        let record = merged.record;
        assert_eq!(record.name(), "alarm1");
        assert_eq!(record.state(), Some(&FieldValue::Symbol(Symbol::new("Normal", 0))));
        assert_eq!(record.registered(), Some(at(100)));
        assert_eq!(record.get("category"), Some(&FieldValue::from("Safety")));
        assert!(merged.report.is_clean());
    }

    #[test]
    fn reregistration_refreshes_timestamp_only() {
        let payload = json!({"category": "Safety", "priority": "P1"});
        let once = merger().register(None, "alarm1", Some(&payload), at(100)).record;
        let twice = merger()
            .register(Some(once.clone()), "alarm1", Some(&payload), at(200))
            .record;

        assert_eq!(twice.registered(), Some(at(200)));
        let mut expected = once;
        expected.set(field::REGISTERED, at(200));
        assert_eq!(twice, expected);
    }

    #[test]
    fn registering_a_placeholder_keeps_earlier_fields() {
        let mut placeholder = AlarmRecord::placeholder("X");
        merger().activate(&mut placeholder, Some(&json!({"sevr": "MAJOR"})), at(5));

        let record = merger()
            .register(Some(placeholder), "X", Some(&json!({"location": "NL"})), at(10))
            .record;

        assert_eq!(record.severity(), "MAJOR");
        assert_eq!(record.state_change(), Some(at(5)));
        assert_eq!(record.registered(), Some(at(10)));
        assert_eq!(record.state_name().as_deref(), Some("normal"));
        assert_eq!(record.location_name().as_deref(), Some("nl"));
    }

    #[test]
    fn retraction_keeps_record_and_marks_unregistered() {
        let record = merger()
            .register(None, "alarm1", Some(&json!({"category": "Safety"})), at(100))
            .record;

        let retracted = merger().register(Some(record), "alarm1", None, at(150)).record;
        assert_eq!(retracted.get(field::REGISTERED), Some(&FieldValue::Null));
        assert_eq!(retracted.unregistered(), Some(at(150)));
        assert!(!retracted.is_registered());
        assert_eq!(retracted.get("category"), Some(&FieldValue::from("Safety")));
        assert_eq!(retracted.state_name().as_deref(), Some("normal"));

        let restored = merger()
            .register(Some(retracted), "alarm1", Some(&json!({})), at(160))
            .record;
        assert_eq!(restored.registered(), Some(at(160)));
        assert_eq!(restored.get(field::UNREGISTERED), Some(&FieldValue::Null));
    }

    #[test]
    fn retraction_of_unknown_alarm_creates_marked_placeholder() {
        let record = merger().register(None, "ghost", None, at(7)).record;
        assert_eq!(record.name(), "ghost");
        assert!(record.state().is_none());
        assert_eq!(record.unregistered(), Some(at(7)));
    }

    #[test]
    fn activation_unwraps_envelope_and_stamps_change() {
        let mut record = AlarmRecord::placeholder("X");
        let report = merger().activate(
            &mut record,
            Some(&json!({"msg": {"sevr": "MAJOR", "stat": "HIHI"}})),
            at(105),
        );

        assert!(report.is_clean());
        assert_eq!(record.severity(), "MAJOR");
        assert_eq!(record.code(field::STAT), Some(3));
        assert_eq!(record.state_change(), Some(at(105)));
        assert!(record.get("msg").is_none());
    }

    #[test]
    fn activation_clear_nulls_severity_and_keeps_statechange() {
        let mut record = AlarmRecord::placeholder("X");
        merger().activate(&mut record, Some(&json!({"sevr": "MAJOR", "stat": "STATE"})), at(105));
        merger().activate(&mut record, None, at(110));

        assert_eq!(record.get(field::SEVERITY), Some(&FieldValue::Null));
        assert_eq!(record.get(field::STAT), Some(&FieldValue::Null));
        assert_eq!(record.severity(), "ALARM");
        assert_eq!(record.state_change(), Some(at(105)));
    }

    #[test]
    fn activation_with_missing_subfields_applies_what_is_there() {
        let mut record = AlarmRecord::placeholder("X");
        let report = merger().activate(&mut record, Some(&json!({"msg": {"note": "check"}})), at(1));

        assert!(report.is_clean());
        assert!(record.get(field::SEVERITY).is_none());
        assert_eq!(record.get("note"), Some(&FieldValue::from("check")));
    }

    #[test]
    fn transition_merges_everything_plus_timestamp() {
        let mut record = AlarmRecord::placeholder("X");
        merger().transition(&mut record, Some(&json!({"state": "Active"})), at(20));

        assert_eq!(record.state_name().as_deref(), Some("active"));
        assert_eq!(record.state_code(), Some(1));
        assert_eq!(record.state_change(), Some(at(20)));

        merger().transition(&mut record, None, at(30));
        assert_eq!(record.state_name().as_deref(), Some("active"));
        assert_eq!(record.state_change(), Some(at(30)));
    }

    #[test]
    fn malformed_payload_still_stamps_timestamp() {
        let mut record = AlarmRecord::placeholder("X");
        let report = merger().transition(&mut record, Some(&json!([1, 2, 3])), at(9));

        assert!(report.malformed);
        assert_eq!(record.state_change(), Some(at(9)));
    }

    #[test]
    fn dropped_fields_are_reported() {
        let merged = merger().register(None, "X", Some(&json!({"tags": ["a"], "ok": 1})), at(1));
        assert_eq!(merged.report.dropped_fields, vec!["tags".to_string()]);
        assert_eq!(merged.record.get("ok"), Some(&FieldValue::Integer(1)));
    }

    #[test]
    fn apply_creates_placeholder_for_non_registration_streams() {
        let event = IncomingEvent::new("alarm-state", "X", json!({"state": "Latched"}), at(3));
        let merged = merger().apply(None, Stream::DiscreteState, &event);

        assert_eq!(merged.record.name(), "X");
        assert!(merged.record.registered().is_none());
        assert_eq!(merged.record.state_name().as_deref(), Some("latched"));
    }

    #[test]
    fn custom_catalog_resolves_classifiers() {
        let mut catalog = SymbolCatalog::default();
        catalog.insert("priority", ["P1_LIFE", "P2_PROPERTY"]).unwrap();
        let merger = AlarmMerger::new(Arc::new(catalog));

        let record = merger
            .register(None, "X", Some(&json!({"priority": "P2_PROPERTY"})), at(1))
            .record;
        assert_eq!(record.priority_code(), Some(1));
        assert_eq!(record.priority_name().as_deref(), Some("p2_property"));
    }

    #[test]
    fn seeded_state_follows_catalog_codes() {
        let catalog = SymbolCatalog::from_json_str(r#"{"state": ["Active", "Normal"]}"#).unwrap();
        let merger = AlarmMerger::new(Arc::new(catalog));

        let seeded = merger.register(None, "a", Some(&json!({})), at(1)).record;

        let mut explicit = AlarmRecord::placeholder("b");
        merger.transition(&mut explicit, Some(&json!({"state": "Normal"})), at(2));

        assert_eq!(seeded.state_code(), Some(1));
        assert_eq!(seeded.state(), explicit.state());

        let mut placeholder = AlarmRecord::placeholder("c");
        merger.activate(&mut placeholder, Some(&json!({"sevr": "MINOR"})), at(3));
        let registered = merger.register(Some(placeholder), "c", Some(&json!({})), at(4)).record;
        assert_eq!(registered.state_code(), Some(1));
    }

    #[test]
    fn seeded_state_is_text_without_a_state_list() {
        let merger = AlarmMerger::new(Arc::new(SymbolCatalog::empty()));
        assert_eq!(merger.initial_state(), FieldValue::from("Normal"));

        let record = merger.register(None, "a", Some(&json!({})), at(1)).record;
        assert_eq!(record.state_name().as_deref(), Some("normal"));
        assert_eq!(record.state_code(), None);
    }
}
