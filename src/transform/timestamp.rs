//! Best-effort detection of date/time values.
//!
//! Detection never fails loudly: anything that cannot be read as a point in
//! time is simply "not a timestamp".

use super::FieldValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

const NAME_SUFFIXES: [&str; 5] = ["_at", "_date", "_time", "_timestamp", "_on"];
const NAME_PREFIXES: [&str; 2] = ["date_", "last_"];
const NAME_FRAGMENTS: [&str; 9] = [
    "birthday",
    "expir",
    "due",
    "scheduled",
    "created",
    "updated",
    "modified",
    "published",
    "deleted",
];

/// Anything larger is already epoch milliseconds.
const MILLIS_THRESHOLD: f64 = 1e12;
/// 2000-01-01T00:00:00Z as epoch seconds.
const MIN_EPOCH_SECONDS: f64 = 946_684_800.0;
/// 2100-01-01T00:00:00Z as epoch seconds.
const MAX_EPOCH_SECONDS: f64 = 4_102_444_800.0;

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%SZ",
];
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y%m%d"];

/// Returns epoch milliseconds (UTC) when `value` under `field_name` reads as a timestamp.
pub fn detect(field_name: &str, value: &FieldValue) -> Option<i64> {
    if looks_like_timestamp_name(field_name) {
        return match value {
            FieldValue::String(s) => parse_string(s),
            FieldValue::Integer(_) | FieldValue::Unsigned(_) | FieldValue::Float(_) => {
                parse_numeric(value.as_f64()?)
            }
            FieldValue::Null | FieldValue::Bool(_) => None,
        };
    }

    match value {
        FieldValue::String(s) if looks_like_iso_value(s) => parse_string(s),
        _ => None,
    }
}

pub fn looks_like_timestamp_name(field_name: &str) -> bool {
    let name = field_name.to_lowercase();

    NAME_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
        || NAME_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
        || NAME_FRAGMENTS.iter().any(|fragment| name.contains(fragment))
}

fn looks_like_iso_value(value: &str) -> bool {
    (6..=50).contains(&value.len()) && value.contains('T') && value.contains('-')
}

/// Reads a number as epoch milliseconds or epoch seconds within 2000–2100.
pub fn parse_numeric(value: f64) -> Option<i64> {
    if !value.is_finite() || value <= 0.0 {
        return None;
    }

    if value > MILLIS_THRESHOLD {
        return Some(value as i64);
    }

    if (MIN_EPOCH_SECONDS..=MAX_EPOCH_SECONDS).contains(&value) {
        return Some((value * 1000.0) as i64);
    }

    None
}

pub fn parse_string(value: &str) -> Option<i64> {
    let value = value.trim();

    if value.is_empty() {
        return None;
    }

    if let Ok(number) = value.parse::<f64>() {
        if let Some(millis) = parse_numeric(number) {
            return Some(millis);
        }
    }

    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(datetime.timestamp_millis());
    }

    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Some(datetime.and_utc().timestamp_millis());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|datetime| datetime.and_utc().timestamp_millis());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> FieldValue {
        FieldValue::String(s.to_string())
    }

    #[test]
    fn test_name_heuristics() {
        for name in [
            "created_at",
            "Closed_Date",
            "start_time",
            "event_timestamp",
            "signed_on",
            "date_of_birth",
            "last_contacted",
            "birthday",
            "card_expiry",
            "due",
            "scheduled_for",
            "createdate",
            "lastmodifieddate",
            "properties_hs_lastmodified",
            "published",
            "deleted",
        ] {
            assert!(looks_like_timestamp_name(name), "{name} should match");
        }

        for name in ["email", "first_name", "amount", "status", "count"] {
            assert!(!looks_like_timestamp_name(name), "{name} should not match");
        }
    }

    #[test]
    fn test_rfc3339_under_timestamp_name() {
        assert_eq!(
            detect("created_at", &text("2024-01-15T10:00:00Z")),
            Some(1_705_312_800_000)
        );
        assert_eq!(
            detect("created_at", &text("2024-01-15T10:00:00.123456789Z")),
            Some(1_705_312_800_123)
        );
        assert_eq!(
            detect("created_at", &text("2024-01-15T12:00:00+02:00")),
            Some(1_705_312_800_000)
        );
    }

    #[test]
    fn test_naive_formats_are_utc() {
        let expected = Some(1_705_312_800_000);
        assert_eq!(detect("updated_at", &text("2024-01-15T10:00:00")), expected);
        assert_eq!(detect("updated_at", &text("2024-01-15 10:00:00")), expected);
        assert_eq!(detect("updated_at", &text("2024-01-15 10:00")), expected);
        assert_eq!(detect("updated_at", &text("20240115T100000Z")), expected);
    }

    #[test]
    fn test_date_only_formats() {
        let midnight = Some(1_705_276_800_000);
        assert_eq!(detect("close_date", &text("2024-01-15")), midnight);
        assert_eq!(detect("close_date", &text("01/15/2024")), midnight);
        assert_eq!(detect("close_date", &text("20240115")), midnight);
    }

    #[test]
    fn test_numeric_values_under_timestamp_name() {
        assert_eq!(
            detect("created", &FieldValue::Integer(1_705_312_800)),
            Some(1_705_312_800_000)
        );
        assert_eq!(
            detect("created_at", &FieldValue::Integer(1_705_312_800_000)),
            Some(1_705_312_800_000)
        );
        assert_eq!(
            detect("created_at", &text("1705312800")),
            Some(1_705_312_800_000)
        );
        assert_eq!(
            detect("created_at", &FieldValue::Float(1_705_312_800.5)),
            Some(1_705_312_800_500)
        );
    }

    #[test]
    fn test_epoch_second_boundaries() {
        assert_eq!(parse_numeric(946_684_800.0), Some(946_684_800_000));
        assert_eq!(parse_numeric(4_102_444_799.0), Some(4_102_444_799_000));
        assert_eq!(parse_numeric(4_102_444_801.0), None);
        assert_eq!(parse_numeric(0.0), None);
        assert_eq!(parse_numeric(-1.0), None);
    }

    #[test]
    fn test_small_numbers_are_not_dates() {
        assert_eq!(detect("updated_count", &FieldValue::Integer(42)), None);
        assert_eq!(detect("created_by", &FieldValue::Integer(12345)), None);
    }

    #[test]
    fn test_unconventional_name_needs_iso_shape() {
        assert_eq!(
            detect("kickoff", &text("2024-01-15T10:00:00Z")),
            Some(1_705_312_800_000)
        );
        // No `T`: not attempted without a timestamp-like name.
        assert_eq!(detect("kickoff", &text("2024-01-15")), None);
        // Numbers are never attempted without a timestamp-like name.
        assert_eq!(detect("kickoff", &FieldValue::Integer(1_705_312_800)), None);
        // Has `T` and `-` but is not a date.
        assert_eq!(detect("sku", &text("AB-TX-100")), None);
    }

    #[test]
    fn test_non_dates_under_timestamp_name() {
        assert_eq!(detect("created_at", &text("yesterday")), None);
        assert_eq!(detect("created_at", &text("")), None);
        assert_eq!(detect("created_at", &FieldValue::Bool(true)), None);
        assert_eq!(detect("created_at", &FieldValue::Null), None);
    }
}
