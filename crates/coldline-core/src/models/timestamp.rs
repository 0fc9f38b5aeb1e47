//! Conversion between store-native timestamps and `DateTime<Utc>`.
//!
//! Stored documents carry timestamps in one of three shapes: an RFC 3339
//! string, integer epoch milliseconds, or a `{seconds, nanoseconds}` object as
//! produced by the remote document store's native timestamp type.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        Value::Object(map) => {
            let seconds = map.get("seconds").and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Utc.timestamp_opt(seconds, u32::try_from(nanos).ok()?).single()
        }
        _ => None,
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rfc3339_and_millis_agree() {
        let from_str = parse_timestamp(&json!("2025-03-01T12:00:00Z")).unwrap();
        let from_millis = parse_timestamp(&json!(1_740_830_400_000_i64)).unwrap();
        assert_eq!(from_str, from_millis);
    }

    #[test]
    fn test_parse_native_object() {
        let at = parse_timestamp(&json!({"seconds": 1_740_830_400, "nanoseconds": 500}))
            .unwrap();
        assert_eq!(at.timestamp(), 1_740_830_400);
        assert_eq!(at.timestamp_subsec_nanos(), 500);
    }

    #[test]
    fn test_format_keeps_subsecond_precision() {
        let at = Utc.timestamp_opt(1_740_830_400, 123_456_789).unwrap();
        assert_eq!(parse_timestamp(&format_timestamp(at)), Some(at));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_timestamp(&json!("ayer")).is_none());
        assert!(parse_timestamp(&json!(true)).is_none());
        assert!(parse_timestamp(&Value::Null).is_none());
    }
}
