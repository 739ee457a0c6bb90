//! Encoding of JSON points into InfluxDB line protocol.
//!
//! A point is an object shaped like
//!
//! ```json
//! {
//!   "measurement": "page_load",
//!   "time": "2024-01-01T00:00:00Z",
//!   "tags": {"browser": "firefox"},
//!   "fields": {"value": 1234}
//! }
//! ```
//!
//! and becomes `page_load,browser=firefox value=1234i 1704067200000000000`.
//! Tags and fields are written in key order.

use crate::errors::WriteError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

pub const MANDATORY_FIELDS: [&str; 3] = ["measurement", "time", "fields"];

/// Validates and encodes every point. Nothing is returned unless all points
/// are well formed.
pub fn encode_points(points: &[Value]) -> Result<Vec<String>, WriteError> {
    points
        .iter()
        .map(|point| encode_point(point).map_err(WriteError::MalformedData))
        .collect()
}

fn encode_point(point: &Value) -> Result<String, String> {
    let object = match point.as_object() {
        Some(object) if MANDATORY_FIELDS.iter().all(|f| object.contains_key(*f)) => object,
        _ => {
            return Err(format!(
                "Point {point} should contain these fields: {}",
                MANDATORY_FIELDS.join(", ")
            ));
        }
    };

    let measurement = match &object["measurement"] {
        Value::String(name) if !name.is_empty() => name,
        other => return Err(format!("measurement {other} must be a non-empty string")),
    };

    let mut line = escape_key(measurement);

    if let Some(tags) = object.get("tags") {
        for (key, value) in sorted_entries(tags, "tags")? {
            if let Some(value) = format_tag_value(key, value)? {
                line.push(',');
                line.push_str(&escape_key(key));
                line.push('=');
                line.push_str(&value);
            }
        }
    }

    let mut fields = Vec::new();
    for (key, value) in sorted_entries(&object["fields"], "fields")? {
        if let Some(value) = format_field_value(key, value)? {
            fields.push(format!("{}={}", escape_key(key), value));
        }
    }
    if fields.is_empty() {
        return Err(format!("point for measurement {measurement:?} has no field values"));
    }

    line.push(' ');
    line.push_str(&fields.join(","));
    line.push(' ');
    line.push_str(&timestamp_nanos(&object["time"])?.to_string());

    Ok(line)
}

fn sorted_entries<'a>(value: &'a Value, name: &str) -> Result<Vec<(&'a String, &'a Value)>, String> {
    let map: &Map<String, Value> = value
        .as_object()
        .ok_or_else(|| format!("{name} must be an object, got {value}"))?;
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    Ok(entries)
}

fn format_tag_value(key: &str, value: &Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(escape_key(s))),
        Value::Bool(_) | Value::Number(_) => Ok(Some(escape_key(&value.to_string()))),
        _ => Err(format!("tag {key:?} must be a string, number or boolean")),
    }
}

fn format_field_value(key: &str, value: &Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) if n.is_f64() => Ok(Some(n.to_string())),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Some(format!("{i}i"))),
            None => Err(format!("field {key:?} is out of the 64-bit integer range")),
        },
        Value::String(s) => Ok(Some(quote_string(s))),
        _ => Err(format!("field {key:?} must be a string, number or boolean")),
    }
}

/// Nanoseconds since the epoch. Integers are taken as nanoseconds already;
/// timestamps without an offset are read as UTC.
fn timestamp_nanos(time: &Value) -> Result<i64, String> {
    let text = match time {
        Value::Number(n) => {
            return n
                .as_i64()
                .ok_or_else(|| format!("time {n} is not an integer nanosecond timestamp"));
        }
        Value::String(s) => s,
        other => return Err(format!("time {other} must be a string or an integer")),
    };

    let parsed = DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").map(|n| n.and_utc()))
        .map_err(|e| format!("invalid time {text:?}: {e}"))?;

    parsed
        .timestamp_nanos_opt()
        .ok_or_else(|| format!("time {text:?} is out of range"))
}

fn escape_key(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' | ' ' | ',' | '=' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn quote_string(raw: &str) -> String {
    let mut quoted = String::with_capacity(raw.len() + 2);
    quoted.push('"');
    for c in raw.chars() {
        match c {
            '\\' | '"' => {
                quoted.push('\\');
                quoted.push(c);
            }
            '\n' => quoted.push_str("\\n"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Packs newline-terminated lines into payloads of at most `max_bytes`.
/// A line longer than the budget travels alone.
pub fn pack_datagrams(lines: &[String], max_bytes: usize) -> Vec<String> {
    let mut datagrams = Vec::new();
    let mut current = String::new();

    for line in lines {
        if !current.is_empty() && current.len() + line.len() + 1 > max_bytes {
            datagrams.push(std::mem::take(&mut current));
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.is_empty() {
        datagrams.push(current);
    }

    datagrams
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode_one(point: Value) -> Result<String, String> {
        encode_point(&point)
    }

    #[test]
    fn test_encode_point() {
        let line = encode_one(json!({
            "measurement": "page_load",
            "time": "2024-01-01T00:00:00Z",
            "tags": {"region": "eu", "browser": "firefox"},
            "fields": {"value": 1234, "ratio": 0.5, "ok": true, "label": "a \"b\""},
        }))
        .unwrap();

        assert_eq!(
            line,
            "page_load,browser=firefox,region=eu label=\"a \\\"b\\\"\",ok=true,ratio=0.5,value=1234i 1704067200000000000"
        );
    }

    #[test]
    fn test_time_formats() {
        let point = |time: Value| {
            json!({"measurement": "m", "time": time, "fields": {"v": 1}})
        };

        assert_eq!(encode_one(point(json!(42))).unwrap(), "m v=1i 42");
        assert_eq!(
            encode_one(point(json!("2024-01-01T00:00:00.5"))).unwrap(),
            "m v=1i 1704067200500000000"
        );
        assert_eq!(
            encode_one(point(json!("2024-01-01T01:00:00+01:00"))).unwrap(),
            "m v=1i 1704067200000000000"
        );
        assert!(encode_one(point(json!("yesterday"))).is_err());
        assert!(encode_one(point(json!(1.5))).is_err());
        assert!(encode_one(point(json!(null))).is_err());
    }

    #[test]
    fn test_escaping() {
        let line = encode_one(json!({
            "measurement": "load time,ms",
            "time": 1,
            "tags": {"page name": "a=b", "empty": "", "missing": null},
            "fields": {"v": 1, "skipped": null},
        }))
        .unwrap();

        assert_eq!(line, "load\\ time\\,ms,page\\ name=a\\=b v=1i 1");
    }

    #[test]
    fn test_missing_mandatory_fields() {
        let err = encode_one(json!({"measurement": "m", "fields": {"v": 1}})).unwrap_err();
        assert!(err.contains("should contain these fields: measurement, time, fields"));

        let err = encode_one(json!(17)).unwrap_err();
        assert!(err.starts_with("Point 17 should contain"));
    }

    #[test]
    fn test_rejected_values() {
        let base = |fields: Value| json!({"measurement": "m", "time": 1, "fields": fields});

        assert!(encode_one(base(json!({"v": {"nested": 1}}))).is_err());
        assert!(encode_one(base(json!({"v": [1, 2]}))).is_err());
        assert!(encode_one(base(json!({"v": u64::MAX}))).is_err());
        assert!(encode_one(base(json!({"v": null}))).unwrap_err().contains("no field values"));
        assert!(encode_one(base(json!("not an object"))).is_err());
        assert!(encode_one(json!({"measurement": "", "time": 1, "fields": {"v": 1}})).is_err());
    }

    #[test]
    fn test_encode_points_is_all_or_nothing() {
        let points = vec![
            json!({"measurement": "m", "time": 1, "fields": {"v": 1}}),
            json!({"measurement": "m", "time": 2}),
        ];

        assert!(matches!(
            encode_points(&points),
            Err(WriteError::MalformedData(_))
        ));
        assert_eq!(encode_points(&points[..1]).unwrap(), vec!["m v=1i 1"]);
    }

    #[test]
    fn test_pack_datagrams() {
        let lines: Vec<String> = vec!["a".repeat(4), "b".repeat(4), "c".repeat(20)];

        let datagrams = pack_datagrams(&lines, 10);
        assert_eq!(
            datagrams,
            vec![
                "aaaa\nbbbb\n".to_string(),
                format!("{}\n", "c".repeat(20)),
            ]
        );

        assert!(pack_datagrams(&[], 10).is_empty());
    }
}
