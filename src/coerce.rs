//! Best-effort coercion of loosely typed JSON fields.
//!
//! Each helper returns `None` when the value does not have the wanted type;
//! callers decide on their own default.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

// ---

pub fn as_f64(value: &Value) -> Option<f64> {
    value.as_f64()
}

pub fn as_bool(value: &Value) -> Option<bool> {
    value.as_bool()
}

pub fn as_str(value: &Value) -> Option<&str> {
    value.as_str()
}

/// Normalize a device timestamp to an ISO-8601 UTC string.
///
/// - integer or float: milliseconds since the Unix epoch
/// - RFC 3339 string: re-emitted in UTC; any other string is passed through
/// - anything else, or absent: the current time
pub fn to_iso(ts: Option<&Value>) -> String {
    // ---
    match ts {
        Some(Value::Number(n)) => {
            let millis = n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64));
            match millis.and_then(DateTime::<Utc>::from_timestamp_millis) {
                Some(dt) => format_utc(dt),
                None => {
                    tracing::warn!("Timestamp {} out of range, using current time", n);
                    now_iso()
                }
            }
        }
        Some(Value::String(s)) => match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => format_utc(dt.with_timezone(&Utc)),
            Err(_) => s.clone(),
        },
        other => {
            tracing::warn!("Missing or unsupported timestamp {:?}, using current time", other);
            now_iso()
        }
    }
}

fn format_utc(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn now_iso() -> String {
    format_utc(Utc::now())
}
