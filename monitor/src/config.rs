//! Configuration management for the alarm monitor.
//!
//! Loads configuration from environment variables with sensible defaults.

use alarm_aggregator_core::dispatcher::DEFAULT_ACTIVATION_TOPIC;
use alarm_aggregator_core::{CatalogError, SymbolCatalog, TopicMap};
use alarm_aggregator_redpanda::ConnectionSettings;
use chrono_tz::Tz;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Monitor name used when `MONITOR_NAME` is unset.
pub const DEFAULT_MONITOR_NAME: &str = "alarm-monitor";

/// Display zone used when `DISPLAY_TIMEZONE` is unset.
pub const DEFAULT_TIMEZONE: &str = "America/New_York";

/// Log filter used when neither `RUST_LOG` nor `MONITOR_LOG_LEVEL` is set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `MONITOR_NAME` was set but blank
    #[error("Monitor name must not be blank")]
    BlankName,

    /// `MONITOR_TOPICS` is not three distinct, non-empty names
    #[error("Invalid topic list '{value}': {reason}")]
    InvalidTopics {
        /// The configured value
        value: String,
        /// What is wrong with it
        reason: String,
    },

    /// `DISPLAY_TIMEZONE` is not an IANA zone name
    #[error("Unknown timezone '{0}'")]
    InvalidTimezone(String),

    /// `MONITOR_FOLLOW` is not a boolean
    #[error("Invalid MONITOR_FOLLOW value '{0}', expected true or false")]
    InvalidFollow(String),

    /// The catalog file could not be read
    #[error("Failed to read symbol catalog {path}: {source}")]
    CatalogRead {
        /// The configured path
        path: PathBuf,
        /// The I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The catalog file is not a valid catalog
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Monitor configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Broker connection, client id = monitor name
    pub connection: ConnectionSettings,
    /// Prefix of the consumer group
    pub name: String,
    /// Wire names of the three alarm topics
    pub topics: TopicMap,
    /// Topic acknowledgements are published to
    pub ack_topic: String,
    /// Zone timestamps are displayed in
    pub timezone: Tz,
    /// Keep following live events after the history replay; when `false`
    /// the monitor prints the current alarm table and exits
    pub follow: bool,
    /// Optional JSON symbol catalog layered over the built-in one
    pub catalog_path: Option<PathBuf>,
    /// Fallback log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl MonitorConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through a custom variable lookup.
    ///
    /// Blank values count as unset, except for `MONITOR_NAME`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let name = match lookup("MONITOR_NAME") {
            Some(name) if name.trim().is_empty() => return Err(ConfigError::BlankName),
            Some(name) => name.trim().to_string(),
            None => DEFAULT_MONITOR_NAME.to_string(),
        };

        let topics = match non_blank("MONITOR_TOPICS") {
            Some(value) => parse_topics(&value)?,
            None => TopicMap::default(),
        };

        let timezone_name =
            non_blank("DISPLAY_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone: Tz = timezone_name
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(timezone_name.clone()))?;

        let follow = match non_blank("MONITOR_FOLLOW") {
            Some(value) => parse_flag(&value).ok_or(ConfigError::InvalidFollow(value))?,
            None => true,
        };

        Ok(Self {
            connection: ConnectionSettings::from_lookup(&lookup).with_client_id(&name),
            name,
            topics,
            ack_topic: non_blank("ACK_TOPIC")
                .unwrap_or_else(|| DEFAULT_ACTIVATION_TOPIC.to_string()),
            timezone,
            follow,
            catalog_path: non_blank("SYMBOL_CATALOG").map(PathBuf::from),
            log_level: non_blank("MONITOR_LOG_LEVEL")
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }

    /// Build the symbol catalog: the built-in one, overlaid with the
    /// configured file if any.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CatalogRead`] or [`ConfigError::Catalog`] if the
    /// file cannot be read or parsed.
    pub fn load_catalog(&self) -> Result<SymbolCatalog, ConfigError> {
        let Some(path) = &self.catalog_path else {
            return Ok(SymbolCatalog::default());
        };

        let document = std::fs::read_to_string(path).map_err(|source| ConfigError::CatalogRead {
            path: path.clone(),
            source,
        })?;
        Ok(SymbolCatalog::from_json_str(&document)?)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse `registration,activation,state` into a [`TopicMap`].
fn parse_topics(value: &str) -> Result<TopicMap, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidTopics {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let names: Vec<&str> = value.split(',').map(str::trim).collect();
    let [registration, activation, state] = names.as_slice() else {
        return Err(invalid(
            "expected three comma-separated names (registration,activation,state)",
        ));
    };
    if names.iter().any(|name| name.is_empty()) {
        return Err(invalid("topic names must not be empty"));
    }
    if registration == activation || registration == state || activation == state {
        return Err(invalid("topic names must be distinct"));
    }

    Ok(TopicMap::new(*registration, *activation, *state))
}
