//! Reversible mapping between domain values and JSON.
//!
//! JSON has no timestamp type, so timestamps travel as a single-key wrapper
//! `{"_timestamp_": "<ISO-8601>"}`. The wrapper key is reserved: a plain
//! mapping may not use it, otherwise decoding could not tell the two apart.
//!
//! Canonical text uses `serde_json`'s ordered map, so mapping keys are always
//! emitted sorted and equal values serialize to identical strings.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime};

use crate::error::CoreError;
use crate::types::EntityTime;

/// Sentinel key of the timestamp wrapper.
pub const TIMESTAMP_KEY: &str = "_timestamp_";

/// Output format for wrapped timestamps. The fraction is omitted when zero.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Mapping form of a [`Value`]; every entity encodes its fields into one.
pub type Document = BTreeMap<String, Value>;

/// A JSON-compatible value extended with timestamps.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Timestamp(EntityTime),
    List(Vec<Value>),
    Map(Document),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<EntityTime> for Value {
    fn from(t: EntityTime) -> Self {
        Value::Timestamp(t)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Map(doc)
    }
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Timestamp(_) => "timestamp",
            Value::List(_) => "list",
            Value::Map(_) => "mapping",
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Convert a domain value into JSON, wrapping timestamps.
pub fn encode(value: &Value) -> Result<serde_json::Value, CoreError> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(n) => serde_json::Value::from(*n),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| CoreError::Encoding(format!("float {f} has no JSON representation")))?,
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::Timestamp(t) => {
            let mut wrapper = serde_json::Map::new();
            wrapper.insert(
                TIMESTAMP_KEY.to_string(),
                serde_json::Value::String(format_timestamp(t)),
            );
            serde_json::Value::Object(wrapper)
        }
        Value::List(items) => {
            serde_json::Value::Array(items.iter().map(encode).collect::<Result<_, _>>()?)
        }
        Value::Map(doc) => serde_json::Value::Object(encode_document(doc)?),
    })
}

/// Encode a mapping. Fails if the mapping uses the reserved timestamp key.
pub fn encode_document(doc: &Document) -> Result<serde_json::Map<String, serde_json::Value>, CoreError> {
    if doc.contains_key(TIMESTAMP_KEY) {
        return Err(CoreError::Encoding(format!(
            "mapping key {TIMESTAMP_KEY:?} is reserved for timestamps"
        )));
    }
    doc.iter()
        .map(|(key, value)| Ok((key.clone(), encode(value)?)))
        .collect()
}

/// Render a timestamp the way the wrapper stores it.
pub fn format_timestamp(t: &EntityTime) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Convert JSON back into a domain value, unwrapping timestamps.
pub fn decode(json: &serde_json::Value) -> Result<Value, CoreError> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().ok_or_else(|| {
                CoreError::Decoding(format!("number {n} is out of range"))
            })?),
        },
        serde_json::Value::String(s) => Value::Str(s.clone()),
        serde_json::Value::Array(items) => {
            Value::List(items.iter().map(decode).collect::<Result<_, _>>()?)
        }
        serde_json::Value::Object(map) => decode_object(map)?,
    })
}

fn decode_object(map: &serde_json::Map<String, serde_json::Value>) -> Result<Value, CoreError> {
    let Some(raw) = map.get(TIMESTAMP_KEY) else {
        let doc = map
            .iter()
            .map(|(key, value)| Ok((key.clone(), decode(value)?)))
            .collect::<Result<Document, CoreError>>()?;
        return Ok(Value::Map(doc));
    };

    if map.len() != 1 {
        return Err(CoreError::Decoding(format!(
            "timestamp wrapper must have exactly one key, found {}",
            map.len()
        )));
    }
    let text = raw.as_str().ok_or_else(|| {
        CoreError::Decoding(format!("timestamp wrapper holds {raw}, expected a string"))
    })?;
    parse_timestamp(text).map(Value::Timestamp)
}

/// Parse an ISO-8601 timestamp. Offset-qualified input is normalised to UTC.
pub fn parse_timestamp(text: &str) -> Result<EntityTime, CoreError> {
    if let Ok(t) = NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT) {
        return Ok(t);
    }
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.naive_utc())
        .map_err(|e| CoreError::Decoding(format!("invalid timestamp {text:?}: {e}")))
}

// ---------------------------------------------------------------------------
// Canonical text
// ---------------------------------------------------------------------------

/// Serialize a value to canonical JSON text (sorted keys, no whitespace).
pub fn to_canonical_string(value: &Value) -> Result<String, CoreError> {
    let json = encode(value)?;
    serde_json::to_string(&json).map_err(|e| CoreError::Encoding(e.to_string()))
}

/// Parse JSON text produced by [`to_canonical_string`] (or any JSON text).
pub fn from_canonical_str(text: &str) -> Result<Value, CoreError> {
    let json: serde_json::Value = serde_json::from_str(text)?;
    decode(&json)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> EntityTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn timestamp_is_wrapped() {
        let encoded = encode(&Value::Timestamp(at(2019, 1, 2, 3, 4, 5))).unwrap();
        assert_eq!(encoded, json!({ "_timestamp_": "2019-01-02T03:04:05" }));
    }

    #[test]
    fn sub_second_timestamp_survives() {
        let t = NaiveDate::from_ymd_opt(2020, 6, 7)
            .unwrap()
            .and_hms_micro_opt(8, 9, 10, 123_456)
            .unwrap();
        let encoded = encode(&Value::Timestamp(t)).unwrap();
        assert_eq!(encoded, json!({ "_timestamp_": "2020-06-07T08:09:10.123456" }));
        assert_eq!(decode(&encoded).unwrap(), Value::Timestamp(t));
    }

    #[test]
    fn nested_values_round_trip() {
        let mut inner = Document::new();
        inner.insert("when".into(), Value::Timestamp(at(2021, 3, 4, 5, 6, 7)));
        inner.insert("flag".into(), Value::Bool(true));
        inner.insert("nothing".into(), Value::Null);

        let mut outer = Document::new();
        outer.insert("name".into(), Value::from("outer"));
        outer.insert("count".into(), Value::Int(-7));
        outer.insert("ratio".into(), Value::Float(0.25));
        outer.insert(
            "items".into(),
            Value::List(vec![Value::Map(inner), Value::List(vec![]), Value::from("x")]),
        );

        let value = Value::Map(outer);
        assert_eq!(decode(&encode(&value).unwrap()).unwrap(), value);
    }

    #[test]
    fn canonical_text_sorts_keys() {
        let mut doc = Document::new();
        doc.insert("uid".into(), Value::from("flat01"));
        doc.insert("name".into(), Value::from("flat"));
        doc.insert("count".into(), Value::Int(3));
        let value = Value::Map(doc);

        let text = to_canonical_string(&value).unwrap();
        assert_eq!(text, r#"{"count":3,"name":"flat","uid":"flat01"}"#);
        assert_eq!(text, to_canonical_string(&value.clone()).unwrap());
        assert_eq!(from_canonical_str(&text).unwrap(), value);
    }

    #[test]
    fn non_finite_float_is_rejected() {
        assert_matches!(encode(&Value::Float(f64::NAN)), Err(CoreError::Encoding(_)));
        assert_matches!(encode(&Value::Float(f64::INFINITY)), Err(CoreError::Encoding(_)));
    }

    #[test]
    fn reserved_key_in_plain_mapping_is_rejected() {
        let mut doc = Document::new();
        doc.insert(TIMESTAMP_KEY.into(), Value::from("2019-01-02T03:04:05"));
        assert_matches!(encode(&Value::Map(doc)), Err(CoreError::Encoding(_)));
    }

    #[test]
    fn wrapper_with_extra_keys_is_malformed() {
        let bad = json!({ "_timestamp_": "2019-01-02T03:04:05", "other": 1 });
        assert_matches!(decode(&bad), Err(CoreError::Decoding(_)));
    }

    #[test]
    fn wrapper_with_non_string_is_malformed() {
        assert_matches!(decode(&json!({ "_timestamp_": 12 })), Err(CoreError::Decoding(_)));
        assert_matches!(
            decode(&json!({ "_timestamp_": "not a date" })),
            Err(CoreError::Decoding(_))
        );
    }

    #[test]
    fn offset_timestamps_normalise_to_utc() {
        let decoded = decode(&json!({ "_timestamp_": "2019-01-02T05:04:05+02:00" })).unwrap();
        assert_eq!(decoded, Value::Timestamp(at(2019, 1, 2, 3, 4, 5)));
    }

    #[test]
    fn plain_strings_stay_strings() {
        let decoded = decode(&json!("2019-01-02T03:04:05")).unwrap();
        assert_eq!(decoded, Value::from("2019-01-02T03:04:05"));
    }
}
