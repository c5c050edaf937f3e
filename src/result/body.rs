//! The four shapes a response body can take, decided once at the
//! transport boundary.

use bytes::Bytes;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// File content.
    Binary(Bytes),
    /// Text that did not parse as JSON; blank text normalises to `{}`.
    RawText(String),
    /// An OAuth2 token response (an object with a truthy `access_token`).
    Token(Map<String, Value>),
    /// The usual `{meta, resources, errors}` object.
    Standard(Map<String, Value>),
}

impl Default for ResponseBody {
    fn default() -> Self {
        ResponseBody::RawText(String::new())
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

impl ResponseBody {
    /// Classifies an already-parsed JSON document.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) if map.get("access_token").is_some_and(truthy) => {
                ResponseBody::Token(map)
            }
            Value::Object(map) => ResponseBody::Standard(map),
            Value::String(s) => ResponseBody::RawText(s),
            Value::Null => ResponseBody::RawText(String::new()),
            other => ResponseBody::RawText(other.to_string()),
        }
    }

    /// Classifies raw response bytes by their declared content type.
    ///
    /// JSON and plain text are parsed when possible and kept as text
    /// otherwise. Container-registry responses are JSON whatever they
    /// declare. An empty body is empty text; anything else is binary.
    pub fn classify(content_type: Option<&str>, content: Bytes, container: bool) -> Self {
        let content_type = content_type.unwrap_or("").trim().to_ascii_lowercase();
        let textual = content_type.starts_with("application/json")
            || content_type.starts_with("text/plain")
            || container;
        if textual {
            return match serde_json::from_slice::<Value>(&content) {
                Ok(value) => ResponseBody::from_json(value),
                Err(_) => ResponseBody::RawText(String::from_utf8_lossy(&content).into_owned()),
            };
        }
        if content.is_empty() {
            return ResponseBody::RawText(String::new());
        }
        ResponseBody::Binary(content)
    }

    /// Short label used in debug logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ResponseBody::Binary(_) => "binary",
            ResponseBody::RawText(_) => "text",
            ResponseBody::Token(_) => "token",
            ResponseBody::Standard(_) => "json",
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ResponseBody::Binary(b) => b.is_empty(),
            ResponseBody::RawText(s) => s.is_empty(),
            ResponseBody::Token(m) | ResponseBody::Standard(m) => m.is_empty(),
        }
    }
}

impl From<Value> for ResponseBody {
    fn from(value: Value) -> Self {
        ResponseBody::from_json(value)
    }
}

impl From<Bytes> for ResponseBody {
    fn from(content: Bytes) -> Self {
        ResponseBody::Binary(content)
    }
}

impl From<&'static [u8]> for ResponseBody {
    fn from(content: &'static [u8]) -> Self {
        ResponseBody::Binary(Bytes::from_static(content))
    }
}

impl From<String> for ResponseBody {
    fn from(text: String) -> Self {
        ResponseBody::RawText(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_requires_truthy_access_token() {
        assert_eq!(
            ResponseBody::from_json(json!({"access_token": "eyJ", "expires_in": 1799})).kind(),
            "token"
        );
        assert_eq!(
            ResponseBody::from_json(json!({"access_token": "", "resources": []})).kind(),
            "json"
        );
    }

    #[test]
    fn json_content_type_is_parsed() {
        let body = ResponseBody::classify(
            Some("application/json; charset=utf-8"),
            Bytes::from_static(br#"{"resources":["a"]}"#),
            false,
        );
        assert_eq!(body, ResponseBody::Standard(json!({"resources": ["a"]}).as_object().cloned().unwrap_or_default()));
    }

    #[test]
    fn invalid_json_degrades_to_text() {
        let body = ResponseBody::classify(
            Some("application/json"),
            Bytes::from_static(b"<html>gateway</html>"),
            false,
        );
        assert_eq!(body, ResponseBody::RawText("<html>gateway</html>".to_string()));
    }

    #[test]
    fn text_plain_tries_json_first() {
        let body = ResponseBody::classify(Some("text/plain"), Bytes::from_static(b"{\"meta\":{}}"), false);
        assert_eq!(body.kind(), "json");
        let body = ResponseBody::classify(Some("text/plain"), Bytes::from_static(b"ok"), false);
        assert_eq!(body, ResponseBody::RawText("ok".to_string()));
    }

    #[test]
    fn container_responses_parse_regardless_of_type() {
        let body = ResponseBody::classify(
            Some("application/octet-stream"),
            Bytes::from_static(b"{\"resources\":[]}"),
            true,
        );
        assert_eq!(body.kind(), "json");
    }

    #[test]
    fn empty_body_is_empty_text() {
        let body = ResponseBody::classify(None, Bytes::new(), false);
        assert_eq!(body, ResponseBody::RawText(String::new()));
    }

    #[test]
    fn other_content_is_binary() {
        let body = ResponseBody::classify(
            Some("application/octet-stream"),
            Bytes::from_static(b"PK\x03\x04"),
            false,
        );
        assert_eq!(body, ResponseBody::Binary(Bytes::from_static(b"PK\x03\x04")));
    }
}
