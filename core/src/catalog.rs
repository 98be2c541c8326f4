//! Symbolic enumerations for alarm attributes.
//!
//! Classification attributes (`class`, `location`, `category`, `priority`) and
//! the live status attributes (`sevr`, `stat`, `state`) are enum-like: each
//! value is one name out of a list maintained upstream. The lists change
//! whenever the upstream schema gains a new category or location, so they are
//! loaded as data instead of being compiled in.
//!
//! A string attribute whose field has an enumeration containing that string
//! is stored as a [`Symbol`] with its position as the code. Anything else is
//! stored as plain text.
//!
//! # Catalog file format
//!
//! ```json
//! {
//!   "category": ["Aperture", "BCM", "Box", "Safety"],
//!   "priority": ["P1_LIFE", "P2_PROPERTY", "P3_PRODUCTIVITY", "P4_DIAGNOSTIC"]
//! }
//! ```
//!
//! Lists from a file are layered over [`SymbolCatalog::default`], so a file
//! only has to name the enumerations it adds or replaces.

use crate::record::field;
use crate::value::Symbol;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Errors raised while building a catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The catalog document could not be parsed.
    #[error("Failed to parse symbol catalog: {0}")]
    Parse(String),

    /// An enumeration contains an empty name.
    #[error("Enumeration '{field}' contains an empty name")]
    EmptyName {
        /// The enumeration with the empty entry
        field: String,
    },

    /// An enumeration lists the same name twice.
    #[error("Enumeration '{field}' lists '{name}' more than once")]
    DuplicateName {
        /// The enumeration with the duplicate
        field: String,
        /// The duplicated name
        name: String,
    },
}

/// Lifecycle states known to the core, in code order.
const STATE_NAMES: &[&str] = &[
    "Normal",
    "Active",
    "NormalLatched",
    "Latched",
    "NormalDisabled",
    "Disabled",
    "NormalFiltered",
    "Filtered",
    "NormalMasked",
    "Masked",
    "NormalOnDelayed",
    "OnDelayed",
    "NormalOffDelayed",
    "OffDelayed",
    "NormalContinuousShelved",
    "ContinuousShelved",
    "NormalOneShotShelved",
    "OneShotShelved",
];

/// EPICS alarm severities, in code order.
const SEVERITY_NAMES: &[&str] = &["NO_ALARM", "MINOR", "MAJOR", "INVALID"];

/// EPICS alarm status values, in code order.
const STAT_NAMES: &[&str] = &[
    "NO_ALARM",
    "READ",
    "WRITE",
    "HIHI",
    "HIGH",
    "LOLO",
    "LOW",
    "STATE",
    "COS",
    "COMM",
    "TIMEOUT",
    "HWLIMIT",
    "CALC",
    "SCAN",
    "LINK",
    "SOFT",
    "BAD_SUB",
    "UDF",
    "DISABLE",
    "SIMM",
    "READ_ACCESS",
    "WRITE_ACCESS",
];

/// Injected enumeration lists, keyed by attribute name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolCatalog {
    enumerations: BTreeMap<String, Vec<String>>,
}

impl SymbolCatalog {
    /// A catalog with no enumerations at all; every string stays text.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            enumerations: BTreeMap::new(),
        }
    }

    /// Parse a JSON catalog document and layer it over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Parse`] for malformed JSON, or a validation
    /// error if an enumeration has empty or duplicate names.
    pub fn from_json_str(document: &str) -> Result<Self, CatalogError> {
        let overrides: BTreeMap<String, Vec<String>> =
            serde_json::from_str(document).map_err(|e| CatalogError::Parse(e.to_string()))?;

        let mut catalog = Self::default();
        for (field, names) in overrides {
            catalog.insert(field, names)?;
        }
        Ok(catalog)
    }

    /// Install (or replace) the enumeration for `field`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::EmptyName`] or [`CatalogError::DuplicateName`]
    /// when the list is not a valid enumeration. The catalog is unchanged on
    /// error.
    pub fn insert<I, S>(&mut self, field: impl Into<String>, names: I) -> Result<(), CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let field = field.into();
        let names: Vec<String> = names.into_iter().map(Into::into).collect();

        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if name.is_empty() {
                return Err(CatalogError::EmptyName { field });
            }
            if !seen.insert(name.as_str()) {
                return Err(CatalogError::DuplicateName {
                    field,
                    name: name.clone(),
                });
            }
        }

        self.enumerations.insert(field, names);
        Ok(())
    }

    /// Resolve `name` within the enumeration for `field`.
    ///
    /// Matching is exact (case-sensitive).
    #[must_use]
    pub fn resolve(&self, field: &str, name: &str) -> Option<Symbol> {
        let names = self.enumerations.get(field)?;
        let position = names.iter().position(|candidate| candidate == name)?;
        i64::try_from(position)
            .ok()
            .map(|code| Symbol::new(name, code))
    }

    /// All names of the enumeration for `field`, in code order.
    #[must_use]
    pub fn names(&self, field: &str) -> &[String] {
        self.enumerations.get(field).map_or(&[], Vec::as_slice)
    }

    /// Whether an enumeration is installed for `field`.
    #[must_use]
    pub fn has_enumeration(&self, field: &str) -> bool {
        self.enumerations.contains_key(field)
    }

    /// Valid alarm class names.
    #[must_use]
    pub fn class_names(&self) -> &[String] {
        self.names(field::CLASS)
    }

    /// Valid location names.
    #[must_use]
    pub fn location_names(&self) -> &[String] {
        self.names(field::LOCATION)
    }

    /// Valid category names.
    #[must_use]
    pub fn category_names(&self) -> &[String] {
        self.names(field::CATEGORY)
    }

    /// Valid priority names.
    #[must_use]
    pub fn priority_names(&self) -> &[String] {
        self.names(field::PRIORITY)
    }
}

impl Default for SymbolCatalog {
    /// The enumerations the merge engine itself relies on: `state`, `sevr`
    /// and `stat`. Classification lists are left to configuration.
    fn default() -> Self {
        let owned = |names: &[&str]| -> Vec<String> { names.iter().map(|n| (*n).to_string()).collect() };

        let mut enumerations = BTreeMap::new();
        enumerations.insert(field::STATE.to_string(), owned(STATE_NAMES));
        enumerations.insert(field::SEVERITY.to_string(), owned(SEVERITY_NAMES));
        enumerations.insert(field::STAT.to_string(), owned(STAT_NAMES));
        Self { enumerations }
    }
}
