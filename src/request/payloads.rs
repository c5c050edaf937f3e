//! The four payload slots a request may carry.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde_json::{Map, Value};

/// Request body: a JSON document or opaque bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Bytes(Bytes),
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Bytes(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(bytes))
    }
}

/// One multipart file part: `(field_name, (file_name, content, content_type))`.
///
/// Content is held as `Bytes` so a request can be rebuilt and re-sent after
/// a token refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub field_name: String,
    pub file_name: String,
    pub content: Bytes,
    pub content_type: String,
}

impl FileUpload {
    pub fn new(
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        content: impl Into<Bytes>,
        content_type: impl Into<String>,
    ) -> Self {
        FileUpload {
            field_name: field_name.into(),
            file_name: file_name.into(),
            content: content.into(),
            content_type: content_type.into(),
        }
    }
}

/// Query parameters, body, form data and file uploads for one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestPayloads {
    params: Option<Map<String, Value>>,
    body: Option<RequestBody>,
    data: Option<BTreeMap<String, String>>,
    files: Vec<FileUpload>,
}

impl RequestPayloads {
    pub fn new(
        params: Option<Map<String, Value>>,
        body: Option<RequestBody>,
        data: Option<BTreeMap<String, String>>,
        files: Vec<FileUpload>,
    ) -> Self {
        RequestPayloads {
            params,
            body,
            data,
            files,
        }
    }

    pub fn params(&self) -> Option<&Map<String, Value>> {
        self.params.as_ref()
    }

    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// The body as JSON, if it is a JSON body.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Some(RequestBody::Json(value)) => Some(value),
            _ => None,
        }
    }

    pub fn data(&self) -> Option<&BTreeMap<String, String>> {
        self.data.as_ref()
    }

    pub fn files(&self) -> &[FileUpload] {
        &self.files
    }

    /// Flattens `params` into query-string pairs.
    ///
    /// Arrays repeat the key once per element, booleans render as
    /// `true`/`false`, nulls are skipped and nested objects are sent as
    /// their JSON text.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let Some(params) = &self.params else {
            return pairs;
        };
        for (key, value) in params {
            match value {
                Value::Array(items) => {
                    for item in items {
                        if let Some(rendered) = render_scalar(item) {
                            pairs.push((key.clone(), rendered));
                        }
                    }
                }
                other => {
                    if let Some(rendered) = render_scalar(other) {
                        pairs.push((key.clone(), rendered));
                    }
                }
            }
        }
        pairs
    }
}

fn render_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_passes_through_unchanged() {
        let ids = json!(["a", "b"]);
        let payloads = RequestPayloads::new(None, Some(json!({"ids": ids}).into()), None, vec![]);
        assert_eq!(payloads.json_body(), Some(&json!({"ids": ["a", "b"]})));
    }

    #[test]
    fn query_pairs_repeat_array_keys() {
        let mut params = Map::new();
        params.insert("ids".into(), json!(["a", "b"]));
        params.insert("limit".into(), json!(10));
        params.insert("include_hidden".into(), json!(false));
        params.insert("skip".into(), Value::Null);
        let payloads = RequestPayloads::new(Some(params), None, None, vec![]);
        let mut pairs = payloads.query_pairs();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("ids".to_string(), "a".to_string()),
                ("ids".to_string(), "b".to_string()),
                ("include_hidden".to_string(), "false".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn empty_payloads_have_no_query() {
        assert!(RequestPayloads::default().query_pairs().is_empty());
        assert!(RequestPayloads::default().files().is_empty());
    }

    #[test]
    fn bytes_body_is_not_json() {
        let payloads = RequestPayloads::new(None, Some(b"PK\x03\x04".to_vec().into()), None, vec![]);
        assert!(payloads.json_body().is_none());
        assert!(matches!(payloads.body(), Some(RequestBody::Bytes(_))));
    }
}
