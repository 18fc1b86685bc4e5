/// Core data type definitions for persisted assets
///
/// Asset payloads are a tagged structured value (scalars, lists and nested maps)
/// rather than untyped JSON, so schema validation can be a pure function over them.
/// On disk they serialize as plain JSON objects.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Insertion-ordered mapping of field name to value (the domain content of an asset)
pub type Payload = IndexMap<String, Value>;

/// Free-form string metadata attached to an asset
pub type Metadata = IndexMap<String, String>;

/// Structured payload value
///
/// Serialized through `serde_json::Value` so snapshots and CLI input stay plain JSON.
/// Integers that fit in `i64` map to `Int`, every other number to `Float`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    Map(Payload),
}

impl Value {
    /// Short type name used in violation messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "number",
            Value::Text(_) => "text",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of `Int` and `Float` values
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Payload> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn into_map(self) -> Option<Payload> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Convert to a `serde_json::Value` for rendering and CLI output
    pub fn to_json(&self) -> serde_json::Value {
        self.clone().into()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            // NaN and infinities have no JSON form
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, value.into()))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        i64::try_from(n).map(Value::Int).unwrap_or(Value::Float(n as f64))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Payload> for Value {
    fn from(map: Payload) -> Self {
        Value::Map(map)
    }
}

/// Build a payload from a JSON object. Returns `None` for non-object JSON.
pub fn payload_from_json(json: serde_json::Value) -> Option<Payload> {
    Value::from(json).into_map()
}

/// Render a payload as a JSON object
pub fn payload_to_json(payload: &Payload) -> serde_json::Value {
    Value::Map(payload.clone()).to_json()
}

/// A persisted, schema-validated content record
///
/// `id` is assigned at creation and never changes; `version` starts at 1 and is
/// bumped on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Globally unique identifier (UUID v4)
    pub id: String,
    /// Kind tag selecting the schema, e.g. "social_post", "project_briefing"
    pub kind: String,
    /// Domain content
    pub payload: Payload,
    /// Free-form annotations (output paths, source row, ...)
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Asset {
    /// Look up a top-level payload field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }
}

/// Filter for listing assets. The default matches everything.
#[derive(Debug, Clone, Default)]
pub struct AssetFilter {
    /// Only assets of this kind
    pub kind: Option<String>,
    /// Only assets whose id starts with this prefix
    pub id_prefix: Option<String>,
}

impl AssetFilter {
    pub fn kind(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            id_prefix: None,
        }
    }

    pub fn matches(&self, asset: &Asset) -> bool {
        if let Some(kind) = &self.kind {
            if &asset.kind != kind {
                return false;
            }
        }
        if let Some(prefix) = &self.id_prefix {
            if !asset.id.starts_with(prefix.as_str()) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_numbers_keep_integer_and_float_apart() {
        let payload = payload_from_json(json!({"count": 3, "ratio": 0.5, "big": 1.0})).unwrap();
        assert_eq!(payload["count"], Value::Int(3));
        assert_eq!(payload["ratio"], Value::Float(0.5));
        assert_eq!(payload["big"], Value::Float(1.0));
    }

    #[test]
    fn payload_serializes_as_plain_json_in_insertion_order() {
        let mut payload = Payload::new();
        payload.insert("zeta".into(), Value::from("last"));
        payload.insert("alpha".into(), Value::from(vec!["a", "b"]));
        let encoded = serde_json::to_string(&payload).unwrap();
        assert_eq!(encoded, r#"{"zeta":"last","alpha":["a","b"]}"#);

        let decoded: Payload = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn non_object_json_is_not_a_payload() {
        assert!(payload_from_json(json!([1, 2])).is_none());
    }

    #[test]
    fn filter_by_kind_and_prefix() {
        let now = Utc::now();
        let asset = Asset {
            id: "abc-123".into(),
            kind: "briefing".into(),
            payload: Payload::new(),
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
            version: 1,
        };
        assert!(AssetFilter::default().matches(&asset));
        assert!(AssetFilter::kind("briefing").matches(&asset));
        assert!(!AssetFilter::kind("social_post").matches(&asset));
        let by_prefix = AssetFilter { kind: None, id_prefix: Some("xyz".into()) };
        assert!(!by_prefix.matches(&asset));
    }
}
