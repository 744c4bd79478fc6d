//! Per-table synchronization cursor.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

/// How far a source table has been synchronized.
///
/// Stored as `{"date": "<RFC 3339>"}`. `offset` is carried for compatibility
/// with state written by earlier deployments and is only serialized when set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Watermark {
    /// Timestamp of the latest row that has been fully loaded.
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub date: DateTime<Utc>,
    /// Optional position within rows sharing `date`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

impl Watermark {
    /// The watermark of a table that has never been synchronized.
    pub fn minimum() -> Self {
        let date = NaiveDate::from_ymd_opt(1, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { date, offset: None }
    }

    /// A watermark positioned at `date`.
    pub fn at(date: DateTime<Utc>) -> Self {
        Self { date, offset: None }
    }

    /// Returns the watermark after observing a row modified at `observed`.
    ///
    /// Never moves backwards.
    pub fn advanced_to(&self, observed: DateTime<Utc>) -> Self {
        if observed > self.date {
            Self::at(observed)
        } else {
            *self
        }
    }

    /// Whether this is the never-synchronized default.
    pub fn is_minimum(&self) -> bool {
        *self == Self::minimum()
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::minimum()
    }
}

/// Parse a stored timestamp.
///
/// Accepts RFC 3339 and naive ISO-8601 (`2021-06-16T20:14:09.221855`), the
/// latter interpreted as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| D::Error::custom(format!("invalid watermark timestamp: {}", raw)))
}
