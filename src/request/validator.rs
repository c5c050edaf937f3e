//! Pre-flight body schema: expected field types and required fields.
//!
//! This type only stores the rule set. The request pipeline applies it
//! (see [`crate::pipeline::validate_payload`]) before any I/O happens.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON type a body field is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    /// Whether `value` is an instance of this type. `Integer` accepts only
    /// whole numbers; `Number` accepts any JSON number.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
        }
    }

    /// The type name of an arbitrary JSON value, in the same vocabulary.
    pub fn describe(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(n) if n.is_f64() => "number",
            Value::Number(_) => "integer",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
        };
        f.write_str(name)
    }
}

/// A body payload failed its pre-flight check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct PayloadValidationError {
    pub message: String,
}

impl PayloadValidationError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        PayloadValidationError {
            message: message.into(),
        }
    }
}

/// Field→type rules plus the list of fields that must be present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestValidator {
    validator: Option<BTreeMap<String, FieldType>>,
    required: Option<Vec<String>>,
}

impl RequestValidator {
    pub fn new(
        validator: Option<BTreeMap<String, FieldType>>,
        required: Option<Vec<String>>,
    ) -> Self {
        RequestValidator {
            validator,
            required,
        }
    }

    pub fn validator(&self) -> Option<&BTreeMap<String, FieldType>> {
        self.validator.as_ref()
    }

    pub fn required(&self) -> Option<&[String]> {
        self.required.as_deref()
    }

    /// True when neither a type map nor a required list was supplied.
    pub fn is_empty(&self) -> bool {
        self.validator.as_ref().is_none_or(BTreeMap::is_empty)
            && self.required.as_ref().is_none_or(Vec::is_empty)
    }
}
