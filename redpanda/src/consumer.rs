//! Alarm event consumer.

use crate::replay::ReplayProgress;
use crate::settings::ConnectionSettings;
use alarm_aggregator_core::{DateTime, EventSource, EventStream, IncomingEvent, TransportError, Utc};
use rdkafka::Offset;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, KafkaResult};
use rdkafka::message::Message;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Default number of events buffered between the broker and the subscriber.
pub const DEFAULT_BUFFER_SIZE: usize = 1000;

/// Timeout for the metadata and watermark queries made at subscribe time.
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Consumes the alarm topics as a stream of [`IncomingEvent`]s.
///
/// Each [`subscribe`](EventSource::subscribe) call creates its own rdkafka
/// consumer in a fresh group named `"{name} {unix_seconds}"`, so a restart
/// always replays the full topic history.
///
/// By default the consumer keeps following the topics after the replay. With
/// [`follow(false)`](AlarmConsumerBuilder::follow) the stream ends once every
/// partition has been read up to the end offset it had at subscribe time,
/// which gives a one-shot snapshot of the current alarm table.
///
/// # Example
///
/// ```no_run
/// use alarm_aggregator_core::EventSource;
/// use alarm_aggregator_redpanda::{AlarmConsumer, ConnectionSettings};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let consumer = AlarmConsumer::builder(ConnectionSettings::default())
///     .name("ops-console")
///     .buffer_size(5000)
///     .build()?;
/// let stream = consumer
///     .subscribe(&["registered-alarms", "active-alarms", "alarm-state"])
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct AlarmConsumer {
    settings: ConnectionSettings,
    name: String,
    buffer_size: usize,
    auto_offset_reset: String,
    follow: bool,
}

impl AlarmConsumer {
    /// Create a builder over the given connection settings.
    #[must_use]
    pub fn builder(settings: ConnectionSettings) -> AlarmConsumerBuilder {
        AlarmConsumerBuilder {
            settings,
            name: None,
            buffer_size: None,
            auto_offset_reset: None,
            follow: true,
        }
    }

    /// Whether the stream continues with live events after the replay.
    #[must_use]
    pub const fn follows(&self) -> bool {
        self.follow
    }

    /// The consumer's display name (prefix of its consumer group).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shared connection settings.
    #[must_use]
    pub const fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    fn group_id(&self) -> String {
        format!("{} {}", self.name, Utc::now().timestamp())
    }
}

/// Builder for [`AlarmConsumer`].
#[derive(Clone, Debug)]
pub struct AlarmConsumerBuilder {
    settings: ConnectionSettings,
    name: Option<String>,
    buffer_size: Option<usize>,
    auto_offset_reset: Option<String>,
    follow: bool,
}

impl AlarmConsumerBuilder {
    /// Set the consumer name. Defaults to the settings' client id.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set how many events may wait between the broker and the subscriber.
    ///
    /// Zero is raised to one.
    #[must_use]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size.max(1));
        self
    }

    /// Override where a new group starts reading (default: `"earliest"`).
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Keep following the topics after the history replay (default `true`).
    ///
    /// When `false`, the event stream ends as soon as the replay has caught
    /// up with the end offsets captured at subscribe time.
    #[must_use]
    pub const fn follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    /// Build the [`AlarmConsumer`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionFailed`] if no broker is
    /// configured or the name is blank.
    pub fn build(self) -> Result<AlarmConsumer, TransportError> {
        if self.settings.bootstrap_servers().trim().is_empty() {
            return Err(TransportError::ConnectionFailed(
                "Brokers not configured".to_string(),
            ));
        }

        let name = self
            .name
            .unwrap_or_else(|| self.settings.client_id().to_string());
        if name.trim().is_empty() {
            return Err(TransportError::ConnectionFailed(
                "Consumer name must not be blank".to_string(),
            ));
        }

        Ok(AlarmConsumer {
            settings: self.settings,
            name,
            buffer_size: self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE),
            auto_offset_reset: self
                .auto_offset_reset
                .unwrap_or_else(|| "earliest".to_string()),
            follow: self.follow,
        })
    }
}

/// Turn one broker message into an [`IncomingEvent`].
///
/// - The key must be present and valid UTF-8
/// - An absent or empty payload is a tombstone
/// - Otherwise the payload must be a JSON document
/// - The broker timestamp (milliseconds) wins; `received` is used when the
///   message carries none
///
/// # Errors
///
/// Returns [`TransportError::Decode`] on a missing or non-UTF-8 key or an
/// unparsable payload.
pub fn decode_message(
    topic: &str,
    key: Option<&[u8]>,
    payload: Option<&[u8]>,
    timestamp_millis: Option<i64>,
    received: DateTime<Utc>,
) -> Result<IncomingEvent, TransportError> {
    let decode_error = |reason: String| TransportError::Decode {
        topic: topic.to_string(),
        reason,
    };

    let key = key.ok_or_else(|| decode_error("Message has no key".to_string()))?;
    let key = std::str::from_utf8(key)
        .map_err(|e| decode_error(format!("Key is not UTF-8: {e}")))?;

    let timestamp = timestamp_millis
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or(received);

    match payload {
        None | Some([]) => Ok(IncomingEvent::tombstone(topic, key, timestamp)),
        Some(bytes) => {
            let value = serde_json::from_slice(bytes)
                .map_err(|e| decode_error(format!("Invalid JSON payload: {e}")))?;
            Ok(IncomingEvent::new(topic, key, value, timestamp))
        }
    }
}

impl EventSource for AlarmConsumer {
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, TransportError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();

        Box::pin(async move {
            let group_id = self.group_id();

            let consumer: StreamConsumer = self
                .settings
                .client_config()
                .set("group.id", &group_id)
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", &self.auto_offset_reset)
                .set("session.timeout.ms", "6000")
                .set("enable.partition.eof", "true")
                .create()
                .map_err(|e| TransportError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to create consumer: {e}"),
                })?;

            let mut replay = match fetch_end_offsets(&consumer, &topics) {
                Ok(progress) => Some(progress),
                Err(e) if self.follow => {
                    tracing::warn!(
                        topics = ?topics,
                        error = %e,
                        "Failed to fetch end offsets, replay progress will not be reported"
                    );
                    None
                }
                Err(e) => {
                    return Err(TransportError::SubscriptionFailed {
                        topics: topics.clone(),
                        reason: format!("Failed to fetch end offsets: {e}"),
                    });
                }
            };

            let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
            consumer
                .subscribe(&topic_refs)
                .map_err(|e| TransportError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to subscribe to topics: {e}"),
                })?;

            tracing::info!(
                topics = ?topics,
                consumer_group = %group_id,
                buffer_size = self.buffer_size,
                auto_offset_reset = %self.auto_offset_reset,
                follow = self.follow,
                replay_partitions = replay.as_ref().map_or(0, ReplayProgress::remaining),
                "Subscribed to alarm topics"
            );

            let (tx, rx) = tokio::sync::mpsc::channel(self.buffer_size);
            let follow = self.follow;

            // The task owns the consumer and forwards decoded messages
            tokio::spawn(async move {
                use futures::StreamExt;

                if replay.as_ref().is_some_and(ReplayProgress::is_complete) {
                    tracing::info!("Topic history is empty, nothing to replay");
                    replay = None;
                    if !follow {
                        return;
                    }
                }

                let mut stream = consumer.stream();

                while let Some(msg_result) = stream.next().await {
                    let caught_up = match msg_result {
                        Ok(message) => {
                            let event = decode_message(
                                message.topic(),
                                message.key(),
                                message.payload(),
                                message.timestamp().to_millis(),
                                Utc::now(),
                            );

                            if let Ok(event) = &event {
                                tracing::trace!(
                                    topic = message.topic(),
                                    partition = message.partition(),
                                    offset = message.offset(),
                                    alarm = %event.key,
                                    tombstone = event.is_tombstone(),
                                    "Received alarm event"
                                );
                            }

                            if tx.send(event).await.is_err() {
                                tracing::debug!("Channel receiver dropped, exiting consumer task");
                                break;
                            }

                            // Commit only after the event reached the channel
                            if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                                tracing::warn!(
                                    topic = message.topic(),
                                    partition = message.partition(),
                                    offset = message.offset(),
                                    error = %e,
                                    "Failed to commit offset"
                                );
                            }

                            replay.as_mut().is_some_and(|progress| {
                                progress.observe(message.topic(), message.partition(), message.offset())
                            })
                        }
                        Err(KafkaError::PartitionEOF(partition)) => {
                            tracing::trace!(partition = partition, "Reached end of partition");
                            replay
                                .as_mut()
                                .is_some_and(|progress| advance_to_positions(&consumer, progress))
                        }
                        Err(e) => {
                            let err =
                                TransportError::Transport(format!("Failed to receive message: {e}"));
                            if tx.send(Err(err)).await.is_err() {
                                break;
                            }
                            false
                        }
                    };

                    if caught_up {
                        tracing::info!(follow = follow, "Topic history replayed");
                        replay = None;
                        if !follow {
                            break;
                        }
                    }
                }

                tracing::debug!("Consumer task exiting");
            });

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as EventStream)
        })
    }
}

/// Capture the end offset of every partition of `topics`.
fn fetch_end_offsets(consumer: &StreamConsumer, topics: &[String]) -> KafkaResult<ReplayProgress> {
    let mut progress = ReplayProgress::new();

    for topic in topics {
        let metadata = consumer.fetch_metadata(Some(topic.as_str()), METADATA_TIMEOUT)?;
        for topic_metadata in metadata.topics() {
            for partition in topic_metadata.partitions() {
                let (low, high) =
                    consumer.fetch_watermarks(topic_metadata.name(), partition.id(), METADATA_TIMEOUT)?;
                progress.track(topic_metadata.name(), partition.id(), low, high);
            }
        }
    }

    Ok(progress)
}

/// Feed the consumer's read positions into `progress`.
fn advance_to_positions(consumer: &StreamConsumer, progress: &mut ReplayProgress) -> bool {
    let positions = match consumer.position() {
        Ok(positions) => positions,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to read consumer positions");
            return false;
        }
    };

    let mut completed = false;
    for element in positions.elements() {
        if let Offset::Offset(position) = element.offset() {
            completed |= progress.advance_to(element.topic(), element.partition(), position);
        }
    }
    completed
}
