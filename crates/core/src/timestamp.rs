//! Lenient decoding of the timestamps the service reports.
//!
//! Records carry RFC 3339 strings, naive ISO 8601 strings (taken as UTC) or
//! nothing at all. A timestamp is informational, so anything unreadable
//! decodes to `None` instead of failing the whole record.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an RFC 3339 or naive ISO 8601 date-time.
pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// `deserialize_with` helper for `Option<DateTime<Utc>>` fields.
pub fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(raw)) => {
            let parsed = parse(&raw);
            if parsed.is_none() {
                tracing::debug!(timestamp = %raw, "Ignoring unreadable timestamp");
            }
            parsed
        }
        Some(Value::Null) | None => None,
        Some(other) => {
            tracing::debug!(timestamp = %other, "Ignoring non-string timestamp");
            None
        }
    };
    Ok(parsed)
}
