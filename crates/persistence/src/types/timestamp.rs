//! Timestamp encoding shared by every persisted document.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings with millisecond
//! precision (`2024-03-01T12:00:00.000Z`). Fixed width keeps lexical order
//! equal to chronological order, so range filters and sorts behave the same
//! in every backend.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Formats a timestamp in the persisted representation.
pub fn format(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a persisted timestamp.
pub fn parse(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Returns the current time truncated to the persisted precision.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    parse(&format(&now)).unwrap_or(now)
}

/// Serde adapter for `Option<DateTime<Utc>>` fields.
///
/// Use with `#[serde(default, with = "crate::types::timestamp::option")]`.
pub mod option {
    use super::*;

    /// Writes the fixed-width form, or null.
    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(value) => serializer.serialize_some(&format(value)),
            None => serializer.serialize_none(),
        }
    }

    /// Reads an optional timestamp string.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}"))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_is_fixed_width() {
        let a = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 11, 30, 23, 59, 59).unwrap();
        assert_eq!(format(&a), "2024-03-01T12:00:00.000Z");
        assert_eq!(format(&a).len(), format(&b).len());
        assert!(format(&a) < format(&b));
    }

    #[test]
    fn test_parse_round_trips_persisted_form() {
        let a = Utc.with_ymd_and_hms(2023, 7, 4, 8, 30, 0).unwrap();
        assert_eq!(parse(&format(&a)), Some(a));
        assert_eq!(parse("yesterday"), None);
    }
}
