//! The consolidated per-alarm entity.
//!
//! An [`AlarmRecord`] is a name plus an open attribute map. Fields accrue
//! from every stream that has mentioned the alarm; an absent key means the
//! attribute is unknown, not false or zero.
//!
//! Only the constructors and [`AlarmRecord::merge_fields`] mutate a record.
//! Every accessor is read-only.
//!
//! # Example
//!
//! ```
//! use alarm_aggregator_core::record::{AlarmRecord, DEFAULT_SEVERITY, field};
//! use alarm_aggregator_core::value::{Fields, FieldValue, Symbol};
//! use chrono::Utc;
//!
//! let mut attributes = Fields::new();
//! attributes.insert("category".to_string(), FieldValue::from("Safety"));
//!
//! let record = AlarmRecord::from_registration(
//!     "alarm1",
//!     Utc::now(),
//!     Symbol::new("Normal", 0),
//!     attributes,
//! );
//! assert_eq!(record.state_name().as_deref(), Some("normal"));
//! assert_eq!(record.category_name().as_deref(), Some("safety"));
//!
//! // No activation seen yet: severity falls back to the logical default
//! assert_eq!(record.severity(), DEFAULT_SEVERITY);
//! ```

use crate::value::{FieldValue, Fields};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known attribute names.
pub mod field {
    /// Lifecycle/operational state.
    pub const STATE: &str = "state";
    /// Timestamp of the last registration event.
    pub const REGISTERED: &str = "registered";
    /// Timestamp of the last registration retraction.
    pub const UNREGISTERED: &str = "unregistered";
    /// Timestamp of the last activation or state event.
    pub const STATE_CHANGE: &str = "statechange";
    /// Live severity.
    pub const SEVERITY: &str = "sevr";
    /// Live status.
    pub const STAT: &str = "stat";
    /// Alarm class.
    pub const CLASS: &str = "class";
    /// Alarm location.
    pub const LOCATION: &str = "location";
    /// Alarm category.
    pub const CATEGORY: &str = "category";
    /// Alarm priority.
    pub const PRIORITY: &str = "priority";
}

/// Severity reported when no live severity is known.
pub const DEFAULT_SEVERITY: &str = "ALARM";

/// State every registered alarm starts in.
pub const INITIAL_STATE: &str = "Normal";

/// Consolidated view of one alarm across all streams.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlarmRecord {
    name: String,
    fields: Fields,
}

impl AlarmRecord {
    /// Create a placeholder: a name with no fields.
    ///
    /// Used when an alarm is referenced by the activation or state stream
    /// before its registration has been seen.
    #[must_use]
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Fields::new(),
        }
    }

    /// Create a record from its first registration.
    ///
    /// Seeds `state = initial_state` and `registered = timestamp`, then
    /// merges the registration attributes on top. The merger passes the
    /// catalog's form of [`INITIAL_STATE`] as `initial_state`.
    #[must_use]
    pub fn from_registration(
        name: impl Into<String>,
        timestamp: DateTime<Utc>,
        initial_state: impl Into<FieldValue>,
        attributes: Fields,
    ) -> Self {
        let mut record = Self::placeholder(name);
        record.seed_state(initial_state.into());
        record.set(field::REGISTERED, timestamp);
        record.merge_fields(attributes);
        record
    }

    /// Overwrite every field named in `update` (last writer wins per field).
    ///
    /// Nested maps are replaced wholesale, never deep-merged. Keys not seen
    /// before are added.
    pub fn merge_fields(&mut self, update: Fields) {
        self.fields.extend(update);
    }

    pub(crate) fn set(&mut self, key: &str, value: impl Into<FieldValue>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Set `state = initial_state` unless some stream already provided a state.
    pub(crate) fn seed_state(&mut self, initial_state: FieldValue) {
        if !self.fields.contains_key(field::STATE) {
            self.set(field::STATE, initial_state);
        }
    }

    /// The alarm name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All fields.
    #[must_use]
    pub const fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Raw stored value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Lower-cased name form of `key`.
    #[must_use]
    pub fn display_name(&self, key: &str) -> Option<String> {
        self.get(key).and_then(FieldValue::display_name)
    }

    /// Numeric code form of `key`.
    #[must_use]
    pub fn code(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(FieldValue::code)
    }

    fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        self.get(key).and_then(FieldValue::as_timestamp)
    }

    /// Raw lifecycle state.
    #[must_use]
    pub fn state(&self) -> Option<&FieldValue> {
        self.get(field::STATE)
    }

    /// Lower-cased lifecycle state name.
    #[must_use]
    pub fn state_name(&self) -> Option<String> {
        self.display_name(field::STATE)
    }

    /// Lifecycle state code.
    #[must_use]
    pub fn state_code(&self) -> Option<i64> {
        self.code(field::STATE)
    }

    /// Time of the last registration, if currently registered.
    #[must_use]
    pub fn registered(&self) -> Option<DateTime<Utc>> {
        self.timestamp(field::REGISTERED)
    }

    /// Time of the last registration retraction.
    #[must_use]
    pub fn unregistered(&self) -> Option<DateTime<Utc>> {
        self.timestamp(field::UNREGISTERED)
    }

    /// Time of the last activation or state transition.
    #[must_use]
    pub fn state_change(&self) -> Option<DateTime<Utc>> {
        self.timestamp(field::STATE_CHANGE)
    }

    /// Severity name, or [`DEFAULT_SEVERITY`] when `sevr` is absent or null.
    #[must_use]
    pub fn severity(&self) -> String {
        match self.get(field::SEVERITY) {
            None | Some(FieldValue::Null) => DEFAULT_SEVERITY.to_string(),
            Some(FieldValue::Symbol(symbol)) => symbol.name.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// Severity code, when the severity is a known symbol.
    #[must_use]
    pub fn severity_code(&self) -> Option<i64> {
        self.code(field::SEVERITY)
    }

    /// Lower-cased category name.
    #[must_use]
    pub fn category_name(&self) -> Option<String> {
        self.display_name(field::CATEGORY)
    }

    /// Category code.
    #[must_use]
    pub fn category_code(&self) -> Option<i64> {
        self.code(field::CATEGORY)
    }

    /// Lower-cased location name.
    #[must_use]
    pub fn location_name(&self) -> Option<String> {
        self.display_name(field::LOCATION)
    }

    /// Location code.
    #[must_use]
    pub fn location_code(&self) -> Option<i64> {
        self.code(field::LOCATION)
    }

    /// Lower-cased priority name.
    #[must_use]
    pub fn priority_name(&self) -> Option<String> {
        self.display_name(field::PRIORITY)
    }

    /// Priority code.
    #[must_use]
    pub fn priority_code(&self) -> Option<i64> {
        self.code(field::PRIORITY)
    }

    /// Referenced by some stream, but nothing is known about it yet.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.fields.is_empty()
    }

    /// Has a registration that has not been retracted.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.registered().is_some()
    }

    /// Carries a live (non-null) severity.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.get(field::SEVERITY).is_some_and(|sevr| !sevr.is_null())
    }
}
