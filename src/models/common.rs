use serde::de::DeserializeOwned;
use serde::{ Deserialize, Serialize };
use std::collections::btree_map::{ self, BTreeMap };
use std::fmt;

use crate::error::{ RepoError, RepoResult };

/// A single cell as stored in, or returned from, a data store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for JSON arrays and objects, the values that get stringified on write
    pub fn is_structured(&self) -> bool {
        matches!(self, Value::Json(json) if json.is_array() || json.is_object())
    }

    /// Collapse structured values to their JSON text so a store only ever sees scalars
    pub fn into_scalar(self) -> Value {
        match self {
            Value::Json(json) =>
                match json {
                    serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                        Value::Text(json.to_string())
                    }
                    other => Value::from(other),
                }
            other => other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => write!(f, "{}", s),
            Value::Json(json) => write!(f, "{}", json),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) =>
                match n.as_i64() {
                    Some(i) => Value::Integer(i),
                    None => n.as_f64().map(Value::Real).unwrap_or(Value::Null),
                }
            serde_json::Value::String(s) => Value::Text(s),
            structured => Value::Json(structured),
        }
    }
}

/// Flat field -> value mapping, ordered by field name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, Value>);

impl Row {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Text value of a field; `None` when absent or null
    pub fn get_str(&self, field: &str) -> RepoResult<Option<&str>> {
        match self.0.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Text(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(invalid(field, "text")),
        }
    }

    pub fn get_i64(&self, field: &str) -> RepoResult<Option<i64>> {
        match self.0.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Integer(i)) => Ok(Some(*i)),
            Some(_) => Err(invalid(field, "integer")),
        }
    }

    pub fn get_f64(&self, field: &str) -> RepoResult<Option<f64>> {
        match self.0.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Real(r)) => Ok(Some(*r)),
            Some(Value::Integer(i)) => Ok(Some(*i as f64)),
            Some(_) => Err(invalid(field, "real")),
        }
    }

    /// Booleans come back from SQLite as 0/1 integers
    pub fn get_bool(&self, field: &str) -> RepoResult<Option<bool>> {
        match self.0.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::Integer(0)) => Ok(Some(false)),
            Some(Value::Integer(1)) => Ok(Some(true)),
            Some(_) => Err(invalid(field, "bool")),
        }
    }

    /// Decode a structured field, accepting either a JSON value or the JSON
    /// text it was serialized to on write
    pub fn get_json<T: DeserializeOwned>(&self, field: &str) -> RepoResult<Option<T>> {
        match self.0.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Text(s)) => Ok(Some(serde_json::from_str(s)?)),
            Some(Value::Json(json)) => Ok(Some(serde_json::from_value(json.clone())?)),
            Some(_) => Err(invalid(field, "json")),
        }
    }

    pub fn require_str(&self, field: &str) -> RepoResult<String> {
        self.get_str(field)?
            .map(str::to_string)
            .ok_or_else(|| RepoError::MissingField(field.to_string()))
    }

    pub fn require_i64(&self, field: &str) -> RepoResult<i64> {
        self.get_i64(field)?.ok_or_else(|| RepoError::MissingField(field.to_string()))
    }

    pub fn require_json<T: DeserializeOwned>(&self, field: &str) -> RepoResult<T> {
        self.get_json(field)?.ok_or_else(|| RepoError::MissingField(field.to_string()))
    }
}

fn invalid(field: &str, expected: &'static str) -> RepoError {
    RepoError::InvalidField {
        field: field.to_string(),
        expected,
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect()
        )
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Flat equality filter. An empty filter matches every row; a `Null`
/// expectation matches fields that are null or absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(BTreeMap<String, Value>);

impl Filter {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Single-field filter
    pub fn by(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().with(field, value)
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into().into_scalar());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.0.iter().all(|(field, expected)| {
            match (row.get(field), expected) {
                (None, Value::Null) | (Some(Value::Null), Value::Null) => true,
                (Some(actual), expected) => actual == expected,
                (None, _) => false,
            }
        })
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "{{}}");
        }
        let parts: Vec<String> = self.0
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn structured_values_collapse_to_json_text() {
        let value = Value::from(json!({ "theme": "dark" }));
        assert!(value.is_structured());
        assert_eq!(value.into_scalar(), Value::Text("{\"theme\":\"dark\"}".to_string()));

        assert_eq!(Value::from(json!(3)), Value::Integer(3));
        assert_eq!(Value::from(json!("x")).into_scalar(), Value::Text("x".to_string()));
    }

    #[test]
    fn filter_matches_equal_fields_only() {
        let row = Row::new().with("id_user", "a").with("first_name", "John");

        assert!(Filter::new().matches(&row));
        assert!(Filter::by("id_user", "a").matches(&row));
        assert!(!Filter::by("id_user", "b").matches(&row));
        assert!(!Filter::by("id_user", "a").with("first_name", "Mary").matches(&row));
        assert!(!Filter::by("missing", "a").matches(&row));
        assert!(Filter::by("missing", Value::Null).matches(&row));
    }

    #[test]
    fn typed_accessors_report_missing_and_invalid_fields() {
        let row = Row::new().with("name", "John").with("age", 42).with("active", 1);

        assert_eq!(row.require_str("name").unwrap(), "John");
        assert_eq!(row.require_i64("age").unwrap(), 42);
        assert_eq!(row.get_bool("active").unwrap(), Some(true));
        assert!(matches!(row.require_str("nope"), Err(RepoError::MissingField(f)) if f == "nope"));
        assert!(matches!(row.get_str("age"), Err(RepoError::InvalidField { expected: "text", .. })));
    }

    #[test]
    fn json_fields_decode_from_text_or_value() {
        let row = Row::new()
            .with("as_text", "[1,2,3]")
            .with("as_value", Value::Json(json!([4, 5])));

        let a: Vec<i32> = row.require_json("as_text").unwrap();
        let b: Vec<i32> = row.require_json("as_value").unwrap();
        assert_eq!(a, vec![1, 2, 3]);
        assert_eq!(b, vec![4, 5]);
    }

    #[test]
    fn rows_serialize_as_flat_objects() {
        let row = Row::new().with("id", 1).with("name", "x").with("gone", Value::Null);
        let text = serde_json::to_string(&row).unwrap();
        assert_eq!(text, r#"{"gone":null,"id":1,"name":"x"}"#);

        let back: Row = serde_json::from_str(&text).unwrap();
        assert_eq!(back, row);
    }
}
