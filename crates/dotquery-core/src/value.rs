//! Tree values
//!
//! The recursive Object/Array/scalar model every query navigates. A tree is
//! owned by whoever decoded it; the query engine only ever borrows it.

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::collections::HashMap;
use std::fmt;

/// A node of a decoded document
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TreeValue {
    /// JSON null
    #[default]
    Null,

    /// Boolean value
    Bool(bool),

    /// Numeric value
    Number(f64),

    /// UTF-8 string
    String(String),

    /// Mapping of keys to children (key order carries no meaning)
    Object(HashMap<String, TreeValue>),

    /// Ordered children addressed by index
    Array(Vec<TreeValue>),
}

impl TreeValue {
    /// Returns true if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, TreeValue::Null)
    }

    /// Returns true if the value is an object
    pub fn is_object(&self) -> bool {
        matches!(self, TreeValue::Object(_))
    }

    /// Returns true if the value is an array
    pub fn is_array(&self) -> bool {
        matches!(self, TreeValue::Array(_))
    }

    /// Try to get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TreeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TreeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to get as string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TreeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as object reference
    pub fn as_object(&self) -> Option<&HashMap<String, TreeValue>> {
        match self {
            TreeValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Try to get as array reference
    pub fn as_array(&self) -> Option<&Vec<TreeValue>> {
        match self {
            TreeValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a direct child by key
    pub fn get(&self, key: &str) -> Option<&TreeValue> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Look up a direct child by index
    pub fn at(&self, index: usize) -> Option<&TreeValue> {
        self.as_array().and_then(|items| items.get(index))
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            TreeValue::Null => "null",
            TreeValue::Bool(_) => "boolean",
            TreeValue::Number(_) => "number",
            TreeValue::String(_) => "string",
            TreeValue::Object(_) => "object",
            TreeValue::Array(_) => "array",
        }
    }
}

// Convenience From implementations
impl From<bool> for TreeValue {
    fn from(v: bool) -> Self {
        TreeValue::Bool(v)
    }
}

impl From<i64> for TreeValue {
    fn from(v: i64) -> Self {
        TreeValue::Number(v as f64)
    }
}

impl From<i32> for TreeValue {
    fn from(v: i32) -> Self {
        TreeValue::Number(v as f64)
    }
}

impl From<f64> for TreeValue {
    fn from(v: f64) -> Self {
        TreeValue::Number(v)
    }
}

impl From<String> for TreeValue {
    fn from(v: String) -> Self {
        TreeValue::String(v)
    }
}

impl From<&str> for TreeValue {
    fn from(v: &str) -> Self {
        TreeValue::String(v.to_string())
    }
}

impl<T: Into<TreeValue>> From<Vec<T>> for TreeValue {
    fn from(v: Vec<T>) -> Self {
        TreeValue::Array(v.into_iter().map(Into::into).collect())
    }
}

impl FromIterator<(String, TreeValue)> for TreeValue {
    fn from_iter<I: IntoIterator<Item = (String, TreeValue)>>(iter: I) -> Self {
        TreeValue::Object(iter.into_iter().collect())
    }
}

impl From<serde_json::Value> for TreeValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => TreeValue::Null,
            serde_json::Value::Bool(b) => TreeValue::Bool(b),
            // Every JSON number is representable as f64 without arbitrary precision
            serde_json::Value::Number(n) => TreeValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => TreeValue::String(s),
            serde_json::Value::Array(items) => {
                TreeValue::Array(items.into_iter().map(TreeValue::from).collect())
            }
            serde_json::Value::Object(map) => TreeValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, TreeValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&TreeValue> for serde_json::Value {
    fn from(value: &TreeValue) -> Self {
        match value {
            TreeValue::Null => serde_json::Value::Null,
            TreeValue::Bool(b) => serde_json::Value::Bool(*b),
            TreeValue::Number(n) => match integral(*n) {
                Some(i) => serde_json::Value::from(i),
                None => serde_json::Number::from_f64(*n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
            },
            TreeValue::String(s) => serde_json::Value::String(s.clone()),
            TreeValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            TreeValue::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Numbers with no fractional part inside the i64 range are written back as integers
fn integral(n: f64) -> Option<i64> {
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Some(n as i64)
    } else {
        None
    }
}

impl Serialize for TreeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TreeValue::Null => serializer.serialize_unit(),
            TreeValue::Bool(b) => serializer.serialize_bool(*b),
            TreeValue::Number(n) => match integral(*n) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
            TreeValue::String(s) => serializer.serialize_str(s),
            TreeValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            TreeValue::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

struct TreeValueVisitor;

impl<'de> Visitor<'de> for TreeValueVisitor {
    type Value = TreeValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON-like value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<TreeValue, E> {
        Ok(TreeValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<TreeValue, E> {
        Ok(TreeValue::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<TreeValue, E> {
        Ok(TreeValue::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<TreeValue, E> {
        Ok(TreeValue::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<TreeValue, E> {
        Ok(TreeValue::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<TreeValue, E> {
        Ok(TreeValue::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<TreeValue, E> {
        Ok(TreeValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<TreeValue, E> {
        Ok(TreeValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<TreeValue, D::Error> {
        Deserialize::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<TreeValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(TreeValue::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<TreeValue, A::Error> {
        let mut map = HashMap::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, TreeValue>()? {
            map.insert(key, value);
        }
        Ok(TreeValue::Object(map))
    }
}

impl<'de> Deserialize<'de> for TreeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TreeValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_value_types() {
        assert!(TreeValue::Null.is_null());
        assert!(TreeValue::Object(HashMap::new()).is_object());
        assert!(TreeValue::Array(vec![]).is_array());
        assert_eq!(TreeValue::Bool(true).type_name(), "boolean");
        assert_eq!(TreeValue::from(3.5).type_name(), "number");
    }

    #[test]
    fn test_tree_value_accessors() {
        let tree: TreeValue = vec![("a".to_string(), TreeValue::from(vec![10, 20]))]
            .into_iter()
            .collect();

        let inner = tree.get("a").unwrap();
        assert_eq!(inner.at(1).and_then(|v| v.as_f64()), Some(20.0));
        assert!(inner.at(2).is_none());
        assert!(tree.at(0).is_none());
        assert!(inner.get("0").is_none());
    }

    #[test]
    fn test_from_serde_json_value() {
        let json = serde_json::json!({"a": {"b": [1, 2.5, "x", null, true]}});
        let tree = TreeValue::from(json);

        let b = tree.get("a").and_then(|a| a.get("b")).unwrap();
        assert_eq!(b.at(0), Some(&TreeValue::Number(1.0)));
        assert_eq!(b.at(1), Some(&TreeValue::Number(2.5)));
        assert_eq!(b.at(2), Some(&TreeValue::String("x".into())));
        assert_eq!(b.at(3), Some(&TreeValue::Null));
        assert_eq!(b.at(4), Some(&TreeValue::Bool(true)));
    }

    #[test]
    fn test_serialize_integral_numbers_as_integers() {
        let value = TreeValue::from(vec![TreeValue::Number(20.0), TreeValue::Number(0.5)]);
        assert_eq!(serde_json::to_string(&value).unwrap(), "[20,0.5]");
    }

    #[test]
    fn test_deserialize_matches_value_conversion() {
        let text = r#"{"x":[{"y":5}],"s":"str","n":null,"f":-1.25}"#;
        let direct: TreeValue = serde_json::from_str(text).unwrap();
        let via_value = TreeValue::from(serde_json::from_str::<serde_json::Value>(text).unwrap());
        assert_eq!(direct, via_value);
    }
}
