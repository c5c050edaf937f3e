//! Primary payload of a response.

use bytes::Bytes;
use serde_json::Value;

use super::component::ResponseComponent;

/// What a response carried as its main content.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Resources {
    /// No payload yet, or an explicit `null`.
    #[default]
    Empty,
    /// The usual list of records.
    List(Vec<Value>),
    /// Downloaded file content.
    Binary(Bytes),
    /// A `resources` value that is not a list (a few endpoints return a
    /// single object).
    Document(Value),
}

impl Resources {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Resources::Empty,
            Value::Array(items) => Resources::List(items),
            other => Resources::Document(other),
        }
    }

    /// Listed records; empty for every other shape.
    pub fn data(&self) -> &[Value] {
        match self {
            Resources::List(items) => items,
            _ => &[],
        }
    }

    pub fn bytes(&self) -> Option<&Bytes> {
        match self {
            Resources::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// String records containing `needle`.
    pub fn contains(&self, needle: &str) -> Vec<&Value> {
        self.data()
            .iter()
            .filter(|v| v.as_str().is_some_and(|s| s.contains(needle)))
            .collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.data().iter()
    }

    /// Number of listed records; `0` for binary content and documents.
    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }
}

impl ResponseComponent for Resources {
    fn to_value(&self) -> Value {
        match self {
            Resources::Empty => Value::Array(Vec::new()),
            Resources::List(items) => Value::Array(items.clone()),
            Resources::Binary(_) => Value::Null,
            Resources::Document(v) => v.clone(),
        }
    }

    fn len(&self) -> usize {
        self.data().len()
    }

    fn binary(&self) -> bool {
        matches!(self, Resources::Binary(_))
    }
}

/// Body kept verbatim: an OAuth2 token response, or text that was not JSON.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBody(Value);

impl RawBody {
    /// Blank text normalises to `{}`.
    pub fn from_text(text: String) -> Self {
        if text.trim().is_empty() {
            RawBody(Value::Object(Default::default()))
        } else {
            RawBody(Value::String(text))
        }
    }

    pub fn new(value: Value) -> Self {
        RawBody(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }

    /// True when there is nothing beyond an empty object.
    pub fn is_blank(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }
}

impl ResponseComponent for RawBody {
    fn to_value(&self) -> Value {
        self.0.clone()
    }

    fn len(&self) -> usize {
        match &self.0 {
            Value::String(s) => s.len(),
            Value::Object(map) => map.len(),
            Value::Array(items) => items.len(),
            _ => 0,
        }
    }
}
