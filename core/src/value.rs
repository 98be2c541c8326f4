//! Open attribute values carried by alarm records.
//!
//! Alarm records do not have a fixed schema. Each stream contributes whatever
//! attributes its payload carries, and the record stores them in a [`Fields`]
//! map keyed by attribute name. [`FieldValue`] is the tagged union every
//! attribute is stored as.
//!
//! # Example
//!
//! ```
//! use alarm_aggregator_core::value::{FieldValue, Symbol};
//!
//! let severity = FieldValue::Symbol(Symbol::new("MAJOR", 2));
//! assert_eq!(severity.display_name().as_deref(), Some("major"));
//! assert_eq!(severity.code(), Some(2));
//!
//! assert!(FieldValue::Null.is_null());
//! assert_eq!(FieldValue::from("Safety").display_name().as_deref(), Some("safety"));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute map of an alarm record, ordered by attribute name.
pub type Fields = BTreeMap<String, FieldValue>;

/// An enum-like value: a symbolic name plus its numeric code.
///
/// Symbols come from the [`SymbolCatalog`](crate::catalog::SymbolCatalog),
/// which assigns each name the position it holds in its enumeration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    /// Symbolic name as it appears on the wire (e.g. `"MAJOR"`).
    pub name: String,
    /// Underlying numeric code.
    pub code: i64,
}

impl Symbol {
    /// Create a symbol.
    #[must_use]
    pub fn new(name: impl Into<String>, code: i64) -> Self {
        Self {
            name: name.into(),
            code,
        }
    }

    /// Lower-cased display form of the name.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name.to_lowercase()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A single attribute value.
///
/// `Null` is a stored value, distinct from an absent key: a cleared alarm
/// carries `sevr = Null`, while an alarm never seen on the activation stream
/// has no `sevr` key at all.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Explicitly cleared value.
    Null,
    /// Enum-like value resolved through the symbol catalog.
    Symbol(Symbol),
    /// Free-form string.
    Text(String),
    /// Integral number.
    Integer(i64),
    /// Non-integral number.
    Float(f64),
    /// Boolean flag.
    Bool(bool),
    /// Point in time (event timestamps).
    Timestamp(DateTime<Utc>),
    /// Nested structure, stored as-is (never deep-merged).
    Map(Fields),
}

impl FieldValue {
    /// Whether this is an explicit `Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The symbol, if this is a [`FieldValue::Symbol`].
    #[must_use]
    pub const fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Self::Symbol(symbol) => Some(symbol),
            _ => None,
        }
    }

    /// The text, if this is a [`FieldValue::Text`].
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The timestamp, if this is a [`FieldValue::Timestamp`].
    #[must_use]
    pub const fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Lower-cased name form.
    ///
    /// Defined for symbols and text; `None` for everything else.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        match self {
            Self::Symbol(symbol) => Some(symbol.display_name()),
            Self::Text(text) => Some(text.to_lowercase()),
            _ => None,
        }
    }

    /// Numeric code form.
    ///
    /// Defined for symbols and integers; `None` for everything else.
    #[must_use]
    pub const fn code(&self) -> Option<i64> {
        match self {
            Self::Symbol(symbol) => Some(symbol.code),
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Plain JSON rendering, without the serde type tags.
    ///
    /// Symbols render as their name and timestamps as RFC 3339 strings.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            Self::Null => Value::Null,
            Self::Symbol(symbol) => Value::String(symbol.name.clone()),
            Self::Text(text) => Value::String(text.clone()),
            Self::Integer(n) => Value::from(*n),
            Self::Float(x) => serde_json::Number::from_f64(*x).map_or(Value::Null, Value::Number),
            Self::Bool(b) => Value::Bool(*b),
            Self::Timestamp(ts) => Value::String(ts.to_rfc3339()),
            Self::Map(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Symbol(symbol) => write!(f, "{symbol}"),
            Self::Text(text) => f.write_str(text),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Timestamp(ts) => f.write_str(&ts.to_rfc3339()),
            Self::Map(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<Symbol> for FieldValue {
    fn from(symbol: Symbol) -> Self {
        Self::Symbol(symbol)
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for FieldValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

impl<T: Into<Self>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
