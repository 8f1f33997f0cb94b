//! Row types shared by the caches and the importer

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracker_sync_realtime::Row;

const DAY_MS: i64 = 86_400_000;

/// One tracked data point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub trackable_id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub value: String,
    #[serde(default)]
    pub external_key: Option<String>,
    /// Authoritative write time in epoch milliseconds
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl Record {
    /// The local calendar day this record falls on.
    pub fn day(&self, offset: FixedOffset) -> NaiveDate {
        local_day(self.timestamp, offset)
    }
}

impl Row for Record {
    fn row_id(&self) -> &str {
        &self.id
    }
}

/// A persisted flag setting. `value` holds the JSON input shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagRow {
    pub id: String,
    pub owner_id: String,
    pub key: String,
    pub value: String,
}

impl Row for FlagRow {
    fn row_id(&self) -> &str {
        &self.id
    }
}

/// Value type of a trackable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackableKind {
    Boolean,
    Number,
    Text,
}

impl TrackableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackableKind::Boolean => "boolean",
            TrackableKind::Number => "number",
            TrackableKind::Text => "text",
        }
    }

    /// Whether `value` is a valid stored value for this kind.
    ///
    /// Boolean values are `"true"`, `"false"` or the empty string.
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            TrackableKind::Boolean => value.is_empty() || value == "true" || value == "false",
            TrackableKind::Number => value
                .trim()
                .parse::<f64>()
                .map(f64::is_finite)
                .unwrap_or(false),
            TrackableKind::Text => true,
        }
    }
}

impl fmt::Display for TrackableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackableKind {
    type Err = String;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "boolean" => Ok(TrackableKind::Boolean),
            "number" => Ok(TrackableKind::Number),
            "text" => Ok(TrackableKind::Text),
            other => Err(other.to_string()),
        }
    }
}

/// Calendar day of `timestamp` at `offset`.
pub fn local_day(timestamp: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    timestamp.with_timezone(&offset).date_naive()
}

/// First and last millisecond of the local days `from..=to`, in UTC.
pub fn day_bounds(
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    offset: FixedOffset,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = floor_ms(from.timestamp_millis(), DAY_MS, offset);
    let end = floor_ms(to.timestamp_millis(), DAY_MS, offset) + DAY_MS - 1;
    (millis_to_utc(start, from), millis_to_utc(end, to))
}

/// Round epoch milliseconds down to a multiple of `unit` in local time.
pub(crate) fn floor_ms(epoch_ms: i64, unit: i64, offset: FixedOffset) -> i64 {
    let shift = i64::from(offset.local_minus_utc()) * 1000;
    let local = epoch_ms + shift;
    local - local.rem_euclid(unit) - shift
}

fn millis_to_utc(ms: i64, fallback: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn kind_acceptance() {
        assert!(TrackableKind::Boolean.accepts("true"));
        assert!(TrackableKind::Boolean.accepts(""));
        assert!(TrackableKind::Boolean.accepts("false"));
        assert!(!TrackableKind::Boolean.accepts("yes"));
        assert!(TrackableKind::Number.accepts("12.5"));
        assert!(!TrackableKind::Number.accepts(""));
        assert!(!TrackableKind::Number.accepts("NaN"));
        assert!(TrackableKind::Text.accepts("anything"));
        assert_eq!("tag".parse::<TrackableKind>(), Err("tag".to_string()));
    }

    #[test]
    fn bounds_follow_the_local_day() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        // 23:30 UTC is already the next day at +02:00.
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 23, 30, 0).unwrap();
        assert_eq!(local_day(at, offset), NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());

        let (start, end) = day_bounds(at, at, offset);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 9, 22, 0, 0).unwrap());
        assert_eq!(end.timestamp_millis(), start.timestamp_millis() + DAY_MS - 1);
    }
}
