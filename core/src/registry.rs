//! In-memory index of alarm records by name.
//!
//! The registry owns record lifecycle: records appear on first upsert and
//! are replaced in place afterwards. It never evicts on its own;
//! [`AlarmRegistry::remove`] exists only for an external retention policy.
//!
//! Every upsert is reported to the registered [`RegistryObserver`]s. This is
//! the single observability point of the engine: the merge routines do no
//! logging of their own.
//!
//! # Example
//!
//! ```
//! use alarm_aggregator_core::record::AlarmRecord;
//! use alarm_aggregator_core::registry::{AlarmRegistry, TracingObserver};
//! use std::sync::Arc;
//!
//! let mut registry = AlarmRegistry::new().with_observer(Arc::new(TracingObserver));
//! registry.upsert(AlarmRecord::placeholder("alarm1"));
//!
//! assert!(registry.lookup("alarm1").is_some());
//! assert_eq!(registry.len(), 1);
//! ```

use crate::record::AlarmRecord;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

/// Notification of one upsert.
#[derive(Clone, Copy, Debug)]
pub struct RegistryChange<'a> {
    /// The record as stored after the upsert.
    pub record: &'a AlarmRecord,
    /// Whether the name was new to the registry.
    pub created: bool,
}

/// Hook invoked on every registry upsert.
///
/// Observers run synchronously inside the upsert and must not block.
pub trait RegistryObserver: Send + Sync {
    /// Called after `change.record` has been stored.
    fn on_upsert(&self, change: &RegistryChange<'_>);
}

/// Observer that emits a structured `tracing` event per upsert.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl RegistryObserver for TracingObserver {
    fn on_upsert(&self, change: &RegistryChange<'_>) {
        let record = change.record;
        tracing::debug!(
            alarm = %record.name(),
            created = change.created,
            placeholder = record.is_placeholder(),
            registered = record.is_registered(),
            severity = %record.severity(),
            field_count = record.fields().len(),
            "Alarm record upserted"
        );
    }
}

/// Alarm records indexed by name.
#[derive(Clone, Default)]
pub struct AlarmRegistry {
    alarms: HashMap<String, AlarmRecord>,
    observers: Vec<Arc<dyn RegistryObserver>>,
}

impl AlarmRegistry {
    /// Create an empty registry without observers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer (builder style).
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RegistryObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Add an observer.
    pub fn add_observer(&mut self, observer: Arc<dyn RegistryObserver>) {
        self.observers.push(observer);
    }

    /// Find a record by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&AlarmRecord> {
        self.alarms.get(name)
    }

    /// Store `record` under its own name, replacing any previous record.
    ///
    /// Keying by the record's name keeps the stored name identical to the
    /// name the record was created with.
    pub fn upsert(&mut self, record: AlarmRecord) -> &AlarmRecord {
        let (stored, created) = match self.alarms.entry(record.name().to_string()) {
            Entry::Occupied(mut slot) => {
                slot.insert(record);
                (&*slot.into_mut(), false)
            }
            Entry::Vacant(slot) => (&*slot.insert(record), true),
        };

        let change = RegistryChange {
            record: stored,
            created,
        };
        for observer in &self.observers {
            observer.on_upsert(&change);
        }
        stored
    }

    /// Drop a record. Reserved for external retention policies.
    pub fn remove(&mut self, name: &str) -> Option<AlarmRecord> {
        self.alarms.remove(name)
    }

    /// Iterate over all records (order unspecified).
    pub fn iter(&self) -> impl Iterator<Item = &AlarmRecord> {
        self.alarms.values()
    }

    /// Snapshot of all records (order unspecified).
    #[must_use]
    pub fn list_all(&self) -> Vec<AlarmRecord> {
        self.alarms.values().cloned().collect()
    }

    /// Names of all records, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.alarms.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    /// Whether the registry holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }
}

impl fmt::Debug for AlarmRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlarmRegistry")
            .field("alarms", &self.alarms.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}
