//! JSON-object payloads exchanged with the companion device.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An ordered mapping of string keys to JSON values.
///
/// Messages and application-context snapshots both use this shape. Keys
/// keep insertion order; values are restricted to JSON by construction
/// (string, number, bool, null, nested object, nested array), so any
/// `Payload` is serializable without further validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    /// Create an empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a payload from a JSON value.
    ///
    /// Returns `None` when the value is not a JSON object; payloads at
    /// the boundary must be key/value maps, never bare scalars or arrays.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Convert into a JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Insert a key/value pair, returning the previous value if any.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Get a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Value)> for Payload {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Payload> for Value {
    fn from(payload: Payload) -> Self {
        payload.into_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_value_accepts_objects_only() {
        assert!(Payload::from_value(json!({"weight": 42.5, "unit": "kg"})).is_some());
        assert!(Payload::from_value(json!([1, 2, 3])).is_none());
        assert!(Payload::from_value(json!("scalar")).is_none());
        assert!(Payload::from_value(Value::Null).is_none());
    }

    #[test]
    fn preserves_insertion_order() {
        let mut payload = Payload::new();
        payload.insert("z", json!(1));
        payload.insert("a", json!(2));
        payload.insert("m", json!(3));

        let keys: Vec<_> = payload.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn serde_roundtrip() {
        let payload = Payload::from_value(json!({
            "label": "warmup",
            "weight": 60,
            "logs": null,
            "nested": {"sets": [5, 5, 5]},
        }))
        .unwrap();

        let text = serde_json::to_string(&payload).unwrap();
        let back: Payload = serde_json::from_str(&text).unwrap();
        assert_eq!(back, payload);
    }
}
