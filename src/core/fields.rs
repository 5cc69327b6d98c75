use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Extra form fields sent alongside the file.
///
/// Only objects and arrays contribute parts. Anything else is kept as given
/// but ignored when the payload is assembled.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct AuxiliaryFields(Value);

impl AuxiliaryFields {
    pub fn new() -> Self {
        Self(Value::Object(Map::new()))
    }

    /// Sets `key`, turning a non-object value into an object first.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        if !self.0.is_object() {
            self.0 = Value::Object(Map::new());
        }
        if let Value::Object(map) = &mut self.0 {
            map.insert(key.into(), value.into());
        }
        self
    }

    pub fn is_traversable(&self) -> bool {
        matches!(self.0, Value::Object(_) | Value::Array(_))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Entries in iteration order, `null` entries skipped.
    /// `None` when the value can't be traversed.
    pub fn entries(&self) -> Option<Vec<(String, String)>> {
        match &self.0 {
            Value::Object(map) => Some(
                map.iter()
                    .filter(|(_, value)| !value.is_null())
                    .map(|(key, value)| (key.clone(), coerce(value)))
                    .collect(),
            ),
            Value::Array(items) => Some(
                items.iter()
                    .enumerate()
                    .filter(|(_, value)| !value.is_null())
                    .map(|(index, value)| (index.to_string(), coerce(value)))
                    .collect(),
            ),
            _ => None,
        }
    }
}

fn coerce(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        nested => nested.to_string(),
    }
}

impl Default for AuxiliaryFields {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Value> for AuxiliaryFields {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<&str> for AuxiliaryFields {
    fn from(value: &str) -> Self {
        Self(Value::String(value.to_string()))
    }
}

impl From<HashMap<String, String>> for AuxiliaryFields {
    fn from(map: HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl<K, V> FromIterator<(K, V)> for AuxiliaryFields
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map: Map<String, Value> = iter
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self(Value::Object(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_entries_keep_insertion_order() {
        let fields = AuxiliaryFields::from(json!({"zeta": "z", "alpha": 1, "mid": true}));
        let entries = fields.entries().unwrap();
        assert_eq!(
            entries,
            vec![
                ("zeta".to_string(), "z".to_string()),
                ("alpha".to_string(), "1".to_string()),
                ("mid".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_array_entries_use_index_keys() {
        let fields = AuxiliaryFields::from(json!(["a", null, "c"]));
        let entries = fields.entries().unwrap();
        assert_eq!(
            entries,
            vec![("0".to_string(), "a".to_string()), ("2".to_string(), "c".to_string())]
        );
    }

    #[test]
    fn test_null_entries_are_skipped() {
        let fields = AuxiliaryFields::from(json!({"owner": "alice", "tag": null}));
        assert_eq!(fields.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_scalars_are_not_traversable() {
        for value in [json!("owner=alice"), json!(42), json!(false), Value::Null] {
            let fields = AuxiliaryFields::from(value);
            assert!(!fields.is_traversable());
            assert!(fields.entries().is_none());
        }
    }

    #[test]
    fn test_nested_values_become_json_text() {
        let fields = AuxiliaryFields::from(json!({"meta": {"a": 1}, "list": [1, 2]}));
        let entries = fields.entries().unwrap();
        assert_eq!(entries[0].1, r#"{"a":1}"#);
        assert_eq!(entries[1].1, "[1,2]");
    }

    #[test]
    fn test_insert_replaces_scalar() {
        let mut fields = AuxiliaryFields::from("not a map");
        fields.insert("owner", "alice").insert("count", 3);
        assert_eq!(fields.as_value(), &json!({"owner": "alice", "count": 3}));
    }

    #[test]
    fn test_default_is_empty_object() {
        let fields = AuxiliaryFields::default();
        assert!(fields.is_traversable());
        assert!(fields.entries().unwrap().is_empty());
    }
}
