//! Acknowledgement producer.

use crate::settings::ConnectionSettings;
use alarm_aggregator_core::{AckSink, TransportError};
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

/// Topic acknowledgements go to unless configured otherwise.
pub const DEFAULT_ACK_TOPIC: &str = "active-alarms";

const UNKNOWN: &str = "unknown";

/// Read when `HOSTNAME` is not exported, which is the usual case outside a shell.
const HOSTNAME_FILE: &str = "/etc/hostname";

/// Who is acknowledging, attached to every record as headers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AckIdentity {
    /// Operating-system user.
    pub user: String,
    /// Name of the producing client.
    pub producer: String,
    /// Host the producer runs on.
    pub host: String,
}

impl AckIdentity {
    /// Identity from `USER` and `HOSTNAME`, with `producer` as client name.
    ///
    /// The host falls back to `/etc/hostname` when `HOSTNAME` is unset.
    #[must_use]
    pub fn from_env(producer: impl Into<String>) -> Self {
        Self::from_lookup(producer, |key| match key {
            "HOSTNAME" => host_name(std::env::var(key).ok(), Path::new(HOSTNAME_FILE)),
            _ => std::env::var(key).ok(),
        })
    }

    /// Same as [`AckIdentity::from_env`] with a custom variable lookup.
    ///
    /// Values are trimmed; blank values count as unset.
    #[must_use]
    pub fn from_lookup(
        producer: impl Into<String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let value = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string())
        };

        Self {
            user: value("USER"),
            producer: producer.into(),
            host: value("HOSTNAME"),
        }
    }

    fn headers(&self) -> OwnedHeaders {
        OwnedHeaders::new()
            .insert(Header {
                key: "user",
                value: Some(self.user.as_str()),
            })
            .insert(Header {
                key: "producer",
                value: Some(self.producer.as_str()),
            })
            .insert(Header {
                key: "host",
                value: Some(self.host.as_str()),
            })
    }
}

/// `HOSTNAME` if exported, otherwise the first line of `file`.
fn host_name(exported: Option<String>, file: &Path) -> Option<String> {
    exported
        .filter(|name| !name.trim().is_empty())
        .or_else(|| {
            std::fs::read_to_string(file)
                .ok()
                .and_then(|contents| contents.lines().next().map(str::to_string))
        })
}

/// Publishes null-valued acknowledgement records keyed by alarm name.
///
/// # Example
///
/// ```no_run
/// use alarm_aggregator_core::AckSink;
/// use alarm_aggregator_redpanda::{AckProducer, ConnectionSettings};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let producer = AckProducer::new(ConnectionSettings::from_env(), "active-alarms")?;
/// producer.acknowledge("alarm1").await?;
/// # Ok(())
/// # }
/// ```
pub struct AckProducer {
    producer: FutureProducer,
    topic: String,
    identity: AckIdentity,
    timeout: Duration,
}

impl AckProducer {
    /// Create a producer publishing to `topic`.
    ///
    /// The identity headers are taken from the environment, with the
    /// settings' client id as producer name.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionFailed`] if the rdkafka producer
    /// cannot be created.
    pub fn new(settings: ConnectionSettings, topic: impl Into<String>) -> Result<Self, TransportError> {
        let identity = AckIdentity::from_env(settings.client_id());
        Self::with_identity(&settings, topic, identity)
    }

    /// Create a producer with an explicit identity.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionFailed`] if the rdkafka producer
    /// cannot be created.
    pub fn with_identity(
        settings: &ConnectionSettings,
        topic: impl Into<String>,
        identity: AckIdentity,
    ) -> Result<Self, TransportError> {
        let topic = topic.into();
        let producer: FutureProducer = settings
            .client_config()
            .set("message.timeout.ms", "5000")
            .set("acks", "1")
            .create()
            .map_err(|e| {
                TransportError::ConnectionFailed(format!("Failed to create producer: {e}"))
            })?;

        tracing::info!(
            brokers = %settings.bootstrap_servers(),
            topic = %topic,
            producer = %identity.producer,
            "AckProducer created"
        );

        Ok(Self {
            producer,
            topic,
            identity,
            timeout: Duration::from_secs(5),
        })
    }

    /// Set the send timeout (default: 5 seconds).
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The acknowledgement topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The identity attached as headers.
    #[must_use]
    pub const fn identity(&self) -> &AckIdentity {
        &self.identity
    }
}

impl AckSink for AckProducer {
    fn acknowledge(
        &self,
        name: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>> {
        let name = name.to_string();

        Box::pin(async move {
            let record = FutureRecord::<str, ()>::to(&self.topic)
                .key(name.as_str())
                .headers(self.identity.headers());

            match self.producer.send(record, Timeout::After(self.timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %self.topic,
                        alarm = %name,
                        partition = partition,
                        offset = offset,
                        "Acknowledgement delivered"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => {
                    tracing::error!(
                        topic = %self.topic,
                        alarm = %name,
                        error = %kafka_error,
                        "Acknowledgement delivery failed"
                    );
                    Err(TransportError::PublishFailed {
                        topic: self.topic.clone(),
                        reason: kafka_error.to_string(),
                    })
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rdkafka::message::Headers;

    fn identity() -> AckIdentity {
        AckIdentity::from_lookup("ops-console", |key| match key {
            "USER" => Some("operator".to_string()),
            "HOSTNAME" => Some("console-01".to_string()),
            _ => None,
        })
    }

    #[test]
    fn ack_producer_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<AckProducer>();
        assert_sync::<AckProducer>();
    }

    #[test]
    fn identity_falls_back_to_unknown() {
        let identity = AckIdentity::from_lookup("p", |_| None);
        assert_eq!(identity.user, "unknown");
        assert_eq!(identity.host, "unknown");
        assert_eq!(identity.producer, "p");
    }

    #[test]
    fn identity_values_are_trimmed_and_blank_is_unknown() {
        let identity = AckIdentity::from_lookup("p", |key| match key {
            "USER" => Some("  ".to_string()),
            "HOSTNAME" => Some("console-02\n".to_string()),
            _ => None,
        });
        assert_eq!(identity.user, "unknown");
        assert_eq!(identity.host, "console-02");
    }

    #[test]
    fn host_name_prefers_exported_variable() {
        let missing = Path::new("/nonexistent/hostname");
        assert_eq!(
            host_name(Some("console-01".to_string()), missing),
            Some("console-01".to_string())
        );
        assert_eq!(host_name(None, missing), None);
    }

    #[test]
    fn host_name_falls_back_to_file() {
        let path = std::env::temp_dir().join(format!("ack-hostname-{}", std::process::id()));
        std::fs::write(&path, "control-room-7\n").unwrap();

        let from_file = host_name(None, &path);
        let from_blank = host_name(Some(String::new()), &path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(from_file, Some("control-room-7".to_string()));
        assert_eq!(from_blank, Some("control-room-7".to_string()));
    }

    #[test]
    fn headers_carry_user_producer_host() {
        let headers = identity().headers();
        assert_eq!(headers.count(), 3);

        let pairs: Vec<(String, Vec<u8>)> = headers
            .iter()
            .map(|h| (h.key.to_string(), h.value.unwrap().to_vec()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("user".to_string(), b"operator".to_vec()),
                ("producer".to_string(), b"ops-console".to_vec()),
                ("host".to_string(), b"console-01".to_vec()),
            ]
        );
    }

    #[test]
    fn producer_keeps_topic_and_identity() {
        let producer =
            AckProducer::with_identity(&ConnectionSettings::default(), "acks", identity()).unwrap();
        assert_eq!(producer.topic(), "acks");
        assert_eq!(producer.identity(), &identity());
    }
}
