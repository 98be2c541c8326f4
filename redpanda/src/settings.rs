//! Connection settings shared by the consumer and the producer.

use rdkafka::config::ClientConfig;

/// Broker list used when `BOOTSTRAP_SERVERS` is unset.
pub const DEFAULT_BOOTSTRAP_SERVERS: &str = "localhost:9092";

/// Schema registry used when `SCHEMA_REGISTRY` is unset.
pub const DEFAULT_SCHEMA_REGISTRY: &str = "http://localhost:8081";

/// Client id used when none is configured.
pub const DEFAULT_CLIENT_ID: &str = "alarm-aggregator";

/// Where and as whom to connect.
///
/// The schema registry URL is carried for deployments that plug in an
/// external Avro codec; the JSON codec in this crate does not contact it.
///
/// # Example
///
/// ```
/// use alarm_aggregator_redpanda::ConnectionSettings;
///
/// let settings = ConnectionSettings::new("broker-1:9092,broker-2:9092")
///     .with_client_id("alarm-monitor");
/// assert_eq!(settings.bootstrap_servers(), "broker-1:9092,broker-2:9092");
/// assert_eq!(settings.client_id(), "alarm-monitor");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionSettings {
    bootstrap_servers: String,
    schema_registry: Option<String>,
    client_id: String,
}

impl ConnectionSettings {
    /// Settings for the given comma-separated broker list.
    #[must_use]
    pub fn new(bootstrap_servers: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            schema_registry: None,
            client_id: DEFAULT_CLIENT_ID.to_string(),
        }
    }

    /// Read `BOOTSTRAP_SERVERS` and `SCHEMA_REGISTRY` from the process
    /// environment, falling back to the local defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ConnectionSettings::from_env`] with a custom variable lookup.
    ///
    /// Blank values count as unset.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            bootstrap_servers: non_blank("BOOTSTRAP_SERVERS")
                .unwrap_or_else(|| DEFAULT_BOOTSTRAP_SERVERS.to_string()),
            schema_registry: Some(
                non_blank("SCHEMA_REGISTRY").unwrap_or_else(|| DEFAULT_SCHEMA_REGISTRY.to_string()),
            ),
            client_id: DEFAULT_CLIENT_ID.to_string(),
        }
    }

    /// Set the schema registry URL.
    #[must_use]
    pub fn with_schema_registry(mut self, url: impl Into<String>) -> Self {
        self.schema_registry = Some(url.into());
        self
    }

    /// Set the client id reported to the broker.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Comma-separated broker list.
    #[must_use]
    pub fn bootstrap_servers(&self) -> &str {
        &self.bootstrap_servers
    }

    /// Schema registry URL, if any.
    #[must_use]
    pub fn schema_registry(&self) -> Option<&str> {
        self.schema_registry.as_deref()
    }

    /// Client id reported to the broker.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Base rdkafka configuration for either component.
    pub(crate) fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("client.id", &self.client_id);
        config
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::new(DEFAULT_BOOTSTRAP_SERVERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let settings = ConnectionSettings::from_lookup(lookup_from(&[]));
        assert_eq!(settings.bootstrap_servers(), DEFAULT_BOOTSTRAP_SERVERS);
        assert_eq!(settings.schema_registry(), Some(DEFAULT_SCHEMA_REGISTRY));
        assert_eq!(settings.client_id(), DEFAULT_CLIENT_ID);
    }

    #[test]
    fn environment_overrides_defaults() {
        let settings = ConnectionSettings::from_lookup(lookup_from(&[
            ("BOOTSTRAP_SERVERS", "kafka:29092"),
            ("SCHEMA_REGISTRY", "http://registry:8081"),
        ]));
        assert_eq!(settings.bootstrap_servers(), "kafka:29092");
        assert_eq!(settings.schema_registry(), Some("http://registry:8081"));
    }

    #[test]
    fn blank_values_fall_back() {
        let settings =
            ConnectionSettings::from_lookup(lookup_from(&[("BOOTSTRAP_SERVERS", "  ")]));
        assert_eq!(settings.bootstrap_servers(), DEFAULT_BOOTSTRAP_SERVERS);
    }

    #[test]
    fn client_config_carries_servers_and_id() {
        let config = ConnectionSettings::new("b:9092")
            .with_client_id("ops")
            .client_config();
        assert_eq!(config.get("bootstrap.servers"), Some("b:9092"));
        assert_eq!(config.get("client.id"), Some("ops"));
    }
}
