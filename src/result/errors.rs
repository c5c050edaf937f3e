//! The `errors` list of a response.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use super::component::ResponseComponent;

/// Typed view of one error record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorRecord {
    #[serde(default)]
    pub code: Value,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub id: Option<String>,
}

/// Always a list, possibly empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Errors(Vec<Value>);

impl Errors {
    pub fn new(errors: Vec<Value>) -> Self {
        Errors(errors)
    }

    /// A non-list value (including `null`) becomes an empty list.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => Errors(items),
            _ => Errors::default(),
        }
    }

    pub fn data(&self) -> &[Value] {
        &self.0
    }

    pub fn records(&self) -> Vec<ErrorRecord> {
        self.0
            .iter()
            .filter_map(|e| serde_json::from_value(e.clone()).ok())
            .collect()
    }

    /// Message of the first record, if it has one.
    pub fn first_message(&self) -> Option<&str> {
        self.0.first()?.get("message")?.as_str()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn render_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// `[code] message, [code] message`
impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .0
            .iter()
            .map(|e| {
                format!(
                    "[{}] {}",
                    render_field(e.get("code")),
                    render_field(e.get("message"))
                )
            })
            .collect();
        f.write_str(&rendered.join(", "))
    }
}

impl ResponseComponent for Errors {
    fn to_value(&self) -> Value {
        Value::Array(self.0.clone())
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

impl<'a> IntoIterator for &'a Errors {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_renders_code_and_message() {
        let e = Errors::from_value(json!([{"code": 404, "message": "Not Found"}]));
        assert!(e.to_string().contains("[404] Not Found"));
    }

    #[test]
    fn display_joins_with_commas() {
        let e = Errors::from_value(json!([
            {"code": 400, "message": "bad filter"},
            {"code": "x", "message": "second"}
        ]));
        assert_eq!(e.to_string(), "[400] bad filter, [x] second");
    }

    #[test]
    fn null_errors_become_empty_list() {
        let e = Errors::from_value(Value::Null);
        assert!(e.is_empty());
        assert_eq!(e.to_value(), json!([]));
    }

    #[test]
    fn records_are_typed() {
        let e = Errors::from_value(json!([{"code": 403, "message": "denied", "id": "abc"}]));
        let records = e.records();
        assert_eq!(records[0].code, json!(403));
        assert_eq!(records[0].id.as_deref(), Some("abc"));
        assert_eq!(e.first_message(), Some("denied"));
    }
}
