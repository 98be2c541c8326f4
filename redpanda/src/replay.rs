//! Replay progress against the end offsets captured at subscribe time.

use std::collections::BTreeMap;

/// Partitions that have not yet been read up to the end offset they had
/// when the subscription started.
///
/// A consumer that does not follow the topics ends its stream once this is
/// complete. A following consumer only logs the moment.
///
/// # Example
///
/// ```
/// use alarm_aggregator_redpanda::ReplayProgress;
///
/// let mut progress = ReplayProgress::new();
/// progress.track("registered-alarms", 0, 0, 2);
/// progress.track("alarm-state", 0, 5, 5); // empty, nothing to wait for
///
/// assert!(!progress.observe("registered-alarms", 0, 0));
/// assert!(progress.observe("registered-alarms", 0, 1));
/// assert!(progress.is_complete());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayProgress {
    end_offsets: BTreeMap<(String, i32), i64>,
}

impl ReplayProgress {
    /// Nothing tracked: already complete.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            end_offsets: BTreeMap::new(),
        }
    }

    /// Wait for `topic`/`partition` to be read up to `high` (exclusive).
    ///
    /// Partitions holding no messages (`high <= low`) are not tracked.
    pub fn track(&mut self, topic: &str, partition: i32, low: i64, high: i64) {
        if high > low {
            self.end_offsets.insert((topic.to_string(), partition), high);
        }
    }

    /// Record a consumed message.
    ///
    /// Returns `true` when this message completed the replay.
    pub fn observe(&mut self, topic: &str, partition: i32, offset: i64) -> bool {
        self.advance_to(topic, partition, offset.saturating_add(1))
    }

    /// Record the next offset the consumer will read for a partition.
    ///
    /// Compaction can remove the last records of a partition, so the read
    /// position after an end-of-partition signal also counts. Returns `true`
    /// when this position completed the replay.
    pub fn advance_to(&mut self, topic: &str, partition: i32, position: i64) -> bool {
        let key = (topic.to_string(), partition);
        match self.end_offsets.get(&key) {
            Some(&end) if position >= end => {
                self.end_offsets.remove(&key);
                self.end_offsets.is_empty()
            }
            _ => false,
        }
    }

    /// Every tracked partition has been read to its end offset.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.end_offsets.is_empty()
    }

    /// Number of partitions still being replayed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.end_offsets.len()
    }
}
