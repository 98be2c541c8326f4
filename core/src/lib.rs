//! # Alarm Aggregator Core
//!
//! Merge engine that folds alarm updates from several independent topics into
//! one consolidated, queryable record per alarm.
//!
//! Each topic carries a different facet of an alarm:
//!
//! - **Registration**: defining attributes (class, location, category, priority)
//! - **Activation**: live severity and status; tombstones clear the alarm
//! - **Discrete state**: explicit lifecycle-state transitions
//!
//! Topics are independent, so an alarm may be activated before it is
//! registered. The engine keeps a placeholder for such forward references and
//! fills it in when the registration arrives, without losing what was
//! already merged.
//!
//! ## Components
//!
//! - [`record::AlarmRecord`]: name plus open attribute map
//! - [`merger::AlarmMerger`]: pure per-stream merge routines
//! - [`registry::AlarmRegistry`]: name index with upsert observers
//! - [`dispatcher::EventDispatcher`]: topic routing and record lifecycle
//! - [`processor::AlarmProcessor`]: async consumer loop over an [`event_bus::EventSource`]
//!
//! ## Control flow
//!
//! ```text
//! IncomingEvent ─► EventDispatcher::process ─► AlarmRegistry::lookup
//!                                           ─► AlarmMerger::apply
//!                                           ─► AlarmRegistry::upsert ─► observers
//!                                           ─► Dispatched (returned)
//! ```
//!
//! ## Example
//!
//! ```
//! use alarm_aggregator_core::dispatcher::EventDispatcher;
//! use alarm_aggregator_core::event::IncomingEvent;
//! use chrono::{TimeZone, Utc};
//! use serde_json::json;
//!
//! let at = |ms| Utc.timestamp_millis_opt(ms).unwrap();
//! let mut dispatcher = EventDispatcher::default();
//!
//! dispatcher.process(&IncomingEvent::new(
//!     "registered-alarms",
//!     "alarm1",
//!     json!({"category": "Safety", "priority": "P1"}),
//!     at(100),
//! ))?;
//! dispatcher.process(&IncomingEvent::new(
//!     "active-alarms",
//!     "alarm1",
//!     json!({"sevr": "MAJOR", "stat": "STATE"}),
//!     at(105),
//! ))?;
//! let cleared = dispatcher.process(&IncomingEvent::tombstone("active-alarms", "alarm1", at(110)))?;
//!
//! assert_eq!(cleared.record.severity(), "ALARM");
//! assert_eq!(cleared.record.state_change(), Some(at(105)));
//! # Ok::<(), alarm_aggregator_core::dispatcher::DispatchError>(())
//! ```

pub mod catalog;
pub mod decode;
pub mod dispatcher;
pub mod event;
pub mod event_bus;
pub mod merger;
pub mod processor;
pub mod record;
pub mod registry;
pub mod value;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub use catalog::{CatalogError, SymbolCatalog};
pub use dispatcher::{DispatchError, DispatchOutcome, Dispatched, EventDispatcher, TopicMap};
pub use event::{IncomingEvent, Stream};
pub use event_bus::{AckSink, EventSource, EventStream, TransportError};
pub use merger::{AlarmMerger, MergeReport, Merged};
pub use processor::{AlarmProcessor, ProcessorStats, RegistryHandle};
pub use record::{AlarmRecord, DEFAULT_SEVERITY};
pub use registry::{AlarmRegistry, RegistryChange, RegistryObserver, TracingObserver};
pub use value::{FieldValue, Fields, Symbol};
