//! Date normalization for payload timestamps.
//!
//! The registry encodes dates as epoch milliseconds, sometimes as a JSON
//! number and sometimes as a numeric string.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Parse an epoch-millisecond value. Anything unparseable yields `None`.
pub fn parse_epoch_millis(raw: &Value) -> Option<DateTime<Utc>> {
    let millis = match raw {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    DateTime::from_timestamp_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn parses_numbers_and_numeric_strings() {
        let expected = Utc.with_ymd_and_hms(1991, 8, 22, 0, 0, 0).unwrap();
        assert_eq!(parse_epoch_millis(&json!(682819200000_i64)), Some(expected));
        assert_eq!(parse_epoch_millis(&json!("682819200000")), Some(expected));
    }

    #[test]
    fn rejects_non_dates() {
        assert_eq!(parse_epoch_millis(&Value::Null), None);
        assert_eq!(parse_epoch_millis(&json!("22.08.1991")), None);
        assert_eq!(parse_epoch_millis(&json!(true)), None);
    }
}
