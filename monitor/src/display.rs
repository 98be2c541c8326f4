//! Human-readable rendering of alarm records.

use alarm_aggregator_core::{AlarmRecord, DateTime, Utc};
use chrono_tz::Tz;
use std::fmt;

/// Timestamp layout used for every displayed time.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";

const MISSING: &str = "-";

/// Render `timestamp` in `zone`.
///
/// # Example
///
/// ```
/// use alarm_monitor::display::format_timestamp;
/// use chrono::{TimeZone, Utc};
///
/// let ts = Utc.with_ymd_and_hms(2024, 1, 15, 17, 0, 0).unwrap();
/// assert_eq!(
///     format_timestamp(ts, chrono_tz::America::New_York),
///     "2024-01-15 12:00:00 EST"
/// );
/// ```
#[must_use]
pub fn format_timestamp(timestamp: DateTime<Utc>, zone: Tz) -> String {
    timestamp
        .with_timezone(&zone)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Flattened display view of one record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlarmRow {
    /// Alarm name
    pub name: String,
    /// Lower-case state name
    pub state: Option<String>,
    /// Severity, `ALARM` when unknown
    pub severity: String,
    /// Lower-case category name
    pub category: Option<String>,
    /// Lower-case location name
    pub location: Option<String>,
    /// Lower-case priority name
    pub priority: Option<String>,
    /// Registration time in the display zone
    pub registered: Option<String>,
    /// Last state change in the display zone
    pub state_change: Option<String>,
}

impl AlarmRow {
    /// Build the row for `record`, rendering times in `zone`.
    #[must_use]
    pub fn from_record(record: &AlarmRecord, zone: Tz) -> Self {
        Self {
            name: record.name().to_string(),
            state: record.state_name(),
            severity: record.severity(),
            category: record.category_name(),
            location: record.location_name(),
            priority: record.priority_name(),
            registered: record.registered().map(|ts| format_timestamp(ts, zone)),
            state_change: record.state_change().map(|ts| format_timestamp(ts, zone)),
        }
    }
}

impl fmt::Display for AlarmRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let or_missing = |value: &Option<String>| value.as_deref().unwrap_or(MISSING).to_string();
        write!(
            f,
            "{} [{}] sevr={} category={} location={} priority={} registered={} changed={}",
            self.name,
            or_missing(&self.state),
            self.severity,
            or_missing(&self.category),
            or_missing(&self.location),
            or_missing(&self.priority),
            or_missing(&self.registered),
            or_missing(&self.state_change),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use alarm_aggregator_core::{EventDispatcher, IncomingEvent};
    use chrono::TimeZone;
    use serde_json::json;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn daylight_saving_is_applied() {
        let zone = chrono_tz::America::New_York;
        assert_eq!(
            format_timestamp(at(2024, 7, 4, 16, 30), zone),
            "2024-07-04 12:30:00 EDT"
        );
        assert_eq!(
            format_timestamp(at(2024, 12, 24, 5, 0), zone),
            "2024-12-24 00:00:00 EST"
        );
    }

    #[test]
    fn utc_zone_renders_unchanged() {
        assert_eq!(
            format_timestamp(at(2024, 3, 1, 8, 15), chrono_tz::UTC),
            "2024-03-01 08:15:00 UTC"
        );
    }

    #[test]
    fn row_flattens_record() {
        let mut dispatcher = EventDispatcher::default();
        dispatcher
            .process(&IncomingEvent::new(
                "registered-alarms",
                "alarm1",
                json!({"category": "Safety", "location": "Injector"}),
                at(2024, 1, 15, 17, 0),
            ))
            .unwrap();
        let record = dispatcher
            .process(&IncomingEvent::new(
                "active-alarms",
                "alarm1",
                json!({"sevr": "MAJOR"}),
                at(2024, 1, 15, 17, 5),
            ))
            .unwrap()
            .record;

        let row = AlarmRow::from_record(&record, chrono_tz::America::New_York);
        assert_eq!(
            row,
            AlarmRow {
                name: "alarm1".to_string(),
                state: Some("normal".to_string()),
                severity: "MAJOR".to_string(),
                category: Some("safety".to_string()),
                location: Some("injector".to_string()),
                priority: None,
                registered: Some("2024-01-15 12:00:00 EST".to_string()),
                state_change: Some("2024-01-15 12:05:00 EST".to_string()),
            }
        );
        assert_eq!(
            row.to_string(),
            "alarm1 [normal] sevr=MAJOR category=safety location=injector priority=- \
             registered=2024-01-15 12:00:00 EST changed=2024-01-15 12:05:00 EST"
        );
    }

    #[test]
    fn placeholder_row_uses_defaults() {
        let record = AlarmRecord::placeholder("ghost");
        let row = AlarmRow::from_record(&record, chrono_tz::UTC);
        assert_eq!(row.severity, "ALARM");
        assert_eq!(
            row.to_string(),
            "ghost [-] sevr=ALARM category=- location=- priority=- registered=- changed=-"
        );
    }
}
