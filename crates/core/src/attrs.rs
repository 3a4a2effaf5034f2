//! Typed attribute collections and their canonical text encoding.
//!
//! Attributes cross the crate boundary as ordered `(key, AttrValue)` pairs and are
//! stored as a JSON object with sorted keys. The same encoding is what resource
//! attribute deduplication compares, so it must stay deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{LocolError, Result};
use crate::ids::hex_encode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttrValue {
    Empty,
    String(String),
    Bool(bool),
    Int(i64),
    Double(f64),
    Bytes(Vec<u8>),
    Array(Vec<AttrValue>),
    KvList(Attributes),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: AttrValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes(Vec<Attribute>);

impl AttrValue {
    pub fn to_json(&self) -> Value {
        match self {
            AttrValue::Empty => Value::Null,
            AttrValue::String(s) => Value::String(s.clone()),
            AttrValue::Bool(b) => Value::Bool(*b),
            AttrValue::Int(i) => Value::Number((*i).into()),
            AttrValue::Double(d) => Number::from_f64(*d)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            AttrValue::Bytes(b) => Value::String(hex_encode(b)),
            AttrValue::Array(values) => Value::Array(values.iter().map(Self::to_json).collect()),
            AttrValue::KvList(attrs) => attrs.to_json(),
        }
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => AttrValue::Empty,
            Value::Bool(b) => AttrValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => AttrValue::Int(i),
                None => AttrValue::Double(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => AttrValue::String(s.clone()),
            Value::Array(values) => AttrValue::Array(values.iter().map(Self::from_json).collect()),
            Value::Object(map) => AttrValue::KvList(Attributes::from_map(map)),
        }
    }

    /// Text used for the `resource_attributes.value` column.
    pub fn canonical_text(&self) -> String {
        match self {
            AttrValue::Empty => String::new(),
            AttrValue::String(s) => s.clone(),
            other => other.to_json().to_string(),
        }
    }
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: AttrValue) {
        self.0.push(Attribute {
            key: key.into(),
            value,
        });
    }

    pub fn with(mut self, key: impl Into<String>, value: AttrValue) -> Self {
        self.push(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.0.iter().rev().find(|a| a.key == key).map(|a| &a.value)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Collapses duplicate keys (last occurrence wins) and sorts by key.
    pub fn canonicalize(&self) -> Attributes {
        let mut by_key: BTreeMap<&str, &AttrValue> = BTreeMap::new();
        for attr in &self.0 {
            by_key.insert(attr.key.as_str(), &attr.value);
        }
        by_key
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for attr in self.canonicalize().0 {
            map.insert(attr.key, attr.value.to_json());
        }
        Value::Object(map)
    }

    pub fn encode(&self) -> String {
        self.to_json().to_string()
    }

    pub fn decode(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| LocolError::Parse(format!("invalid attributes json: {e}")))?;
        match value {
            Value::Object(map) => Ok(Self::from_map(&map)),
            other => Err(LocolError::Parse(format!(
                "attributes must be a json object, got {other}"
            ))),
        }
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        map.iter()
            .map(|(k, v)| (k.clone(), AttrValue::from_json(v)))
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, AttrValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, AttrValue)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| Attribute {
                    key: key.into(),
                    value,
                })
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::String(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::String(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Double(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}
