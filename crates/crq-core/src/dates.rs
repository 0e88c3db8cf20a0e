//! Wire date decoding.
//!
//! The remote API is inconsistent about date encodings: some fields are
//! epoch seconds (number or numeric string), some are RFC 3339, some are
//! bare `YYYY-MM-DD HH:MM:SS` assumed UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::error::ChangeError;

/// Decode a wire value into a calendar date.
pub fn parse_date_value(field: &str, value: &Value) -> Result<DateTime<Utc>, ChangeError> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .and_then(|seconds| Utc.timestamp_opt(seconds, 0).single())
            .ok_or_else(|| malformed(field, "numeric value is not a valid epoch timestamp")),
        Value::String(text) => parse_date_text(field, text),
        _ => Err(malformed(field, "expected a timestamp or date string")),
    }
}

fn parse_date_text(field: &str, text: &str) -> Result<DateTime<Utc>, ChangeError> {
    if let Ok(seconds) = text.parse::<i64>() {
        return Utc
            .timestamp_opt(seconds, 0)
            .single()
            .ok_or_else(|| malformed(field, "numeric string is not a valid epoch timestamp"));
    }

    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Ok(date.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }

    if let Ok(day) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(naive) = day.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(malformed(field, "unrecognized date format"))
}

fn malformed(field: &str, detail: &str) -> ChangeError {
    ChangeError::Malformed {
        field: field.to_string(),
        detail: detail.to_string(),
    }
}
