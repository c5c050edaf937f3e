//! Pagination and trace metadata from the `meta` section of a response.

use std::fmt;

use serde_json::{Map, Value};

use super::component::ResponseComponent;

/// Position of the next page: a numeric offset or an opaque scroll token
/// (`after`-style pagination returns the latter).
#[derive(Debug, Clone, PartialEq)]
pub enum Offset {
    Number(i64),
    Token(String),
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Offset::Number(n) => write!(f, "{n}"),
            Offset::Token(t) => f.write_str(t),
        }
    }
}

impl PartialEq<i64> for Offset {
    fn eq(&self, other: &i64) -> bool {
        matches!(self, Offset::Number(n) if n == other)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta(Map<String, Value>);

impl Meta {
    pub fn new(meta: Map<String, Value>) -> Self {
        Meta(meta)
    }

    /// Builds from any JSON value; anything but an object is empty meta.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Meta(map),
            _ => Meta::default(),
        }
    }

    fn pagination(&self) -> Option<&Map<String, Value>> {
        self.0.get("pagination").and_then(Value::as_object)
    }

    pub fn total(&self) -> u64 {
        self.pagination()
            .and_then(|p| p.get("total"))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    pub fn limit(&self) -> u64 {
        self.pagination()
            .and_then(|p| p.get("limit"))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    pub fn offset(&self) -> Option<Offset> {
        match self.pagination()?.get("offset")? {
            Value::Number(n) => n.as_i64().map(Offset::Number),
            Value::String(s) => Some(Offset::Token(s.clone())),
            _ => None,
        }
    }

    /// Seconds the backend spent on the query, `0.0` when not reported.
    pub fn query_time(&self) -> f64 {
        self.0.get("query_time").and_then(Value::as_f64).unwrap_or(0.0)
    }

    pub fn powered_by(&self) -> Option<&str> {
        self.0.get("powered_by").and_then(Value::as_str)
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.0.get("trace_id").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.values()
    }

    pub fn items(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl ResponseComponent for Meta {
    fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(value: Value) -> Meta {
        Meta::from_value(value)
    }

    #[test]
    fn pagination_fields_are_read_from_nested_map() {
        let m = meta(json!({"pagination": {"total": 42, "offset": 10, "limit": 20}}));
        assert_eq!(m.total(), 42);
        assert_eq!(m.offset(), Some(Offset::Number(10)));
        assert_eq!(m.limit(), 20);
    }

    #[test]
    fn missing_pagination_defaults() {
        let m = Meta::default();
        assert_eq!(m.total(), 0);
        assert_eq!(m.offset(), None);
        assert_eq!(m.limit(), 0);
        assert_eq!(m.query_time(), 0.0);
        assert!(m.trace_id().is_none());
        assert!(m.powered_by().is_none());
    }

    #[test]
    fn scroll_offset_is_a_token() {
        let m = meta(json!({"pagination": {"offset": "FQoGZXIvYXdzE", "total": 3}}));
        assert_eq!(m.offset(), Some(Offset::Token("FQoGZXIvYXdzE".to_string())));
        assert_eq!(m.offset().map(|o| o.to_string()), Some("FQoGZXIvYXdzE".to_string()));
    }

    #[test]
    fn trace_fields() {
        let m = meta(json!({
            "query_time": 0.004,
            "powered_by": "device-api",
            "trace_id": "5d1a-44"
        }));
        assert!((m.query_time() - 0.004).abs() < f64::EPSILON);
        assert_eq!(m.powered_by(), Some("device-api"));
        assert_eq!(m.trace_id(), Some("5d1a-44"));
        assert_eq!(m.iter().count(), 3);
    }

    #[test]
    fn non_object_meta_is_empty() {
        assert!(meta(json!([1, 2])).is_empty());
    }
}
