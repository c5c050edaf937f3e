//! Normalised view over one HTTP response.
//!
//! [`ApiResult`] is built from `(status, headers, body)` where the body has
//! already been classified into a [`ResponseBody`]. Construction never
//! fails: every shape maps onto the same set of typed views, so callers can
//! probe `status_code()`, `errors()`, `total()` or iterate resources without
//! first checking what kind of response came back.
//!
//! | body shape | `resources` | `raw` | `meta` / `errors` |
//! |---|---|---|---|
//! | `Binary` | file bytes | blank | empty |
//! | `RawText` | empty | text, or `{}` if blank | empty |
//! | `Token` | empty | token object | empty |
//! | `Standard` | `body.resources` | blank | `body.meta` / `body.errors` |

pub mod body;
pub mod component;
pub mod errors;
pub mod headers;
pub mod meta;
pub mod resources;

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

use bytes::Bytes;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

pub use body::ResponseBody;
pub use component::ResponseComponent;
pub use errors::{ErrorRecord, Errors};
pub use headers::{canonical_header_name, Headers};
pub use meta::{Meta, Offset};
pub use resources::{RawBody, Resources};

use crate::error::{FalconError, Result};

/// Body of the legacy projections: file bytes, or a JSON document.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Binary(Bytes),
    Json(Value),
}

impl Content {
    /// JSON form; file bytes become `null`.
    pub fn to_value(&self) -> Value {
        match self {
            Content::Binary(_) => Value::Null,
            Content::Json(v) => v.clone(),
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Content::Binary(b) => Some(b),
            Content::Json(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Content::Json(v) => Some(v),
            Content::Binary(_) => None,
        }
    }
}

/// The `{status_code, headers, body}` dictionary older callers expect.
#[derive(Debug, Clone, PartialEq)]
pub struct FullReturn {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Content,
}

impl FullReturn {
    pub fn to_value(&self) -> Value {
        json!({
            "status_code": self.status_code,
            "headers": self.headers,
            "body": self.body.to_value(),
        })
    }
}

/// What a service call hands back, chosen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Returned {
    Object(ApiResult),
    /// `expand_result = true`: `(status, headers, content)`.
    Expanded((u16, BTreeMap<String, String>, Content)),
    Full(FullReturn),
}

impl Returned {
    pub fn into_result(self) -> ApiResult {
        match self {
            Returned::Object(result) => result,
            Returned::Expanded((status, headers, content)) => ApiResult::from_full(FullReturn {
                status_code: status,
                headers,
                body: content,
            }),
            Returned::Full(full) => ApiResult::from_full(full),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Returned::Object(result) => result.status_code(),
            Returned::Expanded((status, _, _)) => *status,
            Returned::Full(full) => full.status_code,
        }
    }
}

/// One normalised API response. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiResult {
    status_code: u16,
    headers: Headers,
    meta: Meta,
    resources: Resources,
    errors: Errors,
    raw: RawBody,
}

impl ApiResult {
    /// Status `0` with no headers and an empty body yields the empty result.
    pub fn new(status_code: u16, headers: Headers, body: ResponseBody) -> Self {
        if status_code == 0 && headers.is_empty() && body.is_empty() {
            return ApiResult::default();
        }
        let mut result = ApiResult {
            status_code,
            headers,
            ..ApiResult::default()
        };
        match body {
            ResponseBody::Binary(content) => result.resources = Resources::Binary(content),
            ResponseBody::RawText(text) => result.raw = RawBody::from_text(text),
            ResponseBody::Token(token) => result.raw = RawBody::new(Value::Object(token)),
            ResponseBody::Standard(mut map) => {
                result.meta = Meta::from_value(map.remove("meta").unwrap_or(Value::Null));
                result.resources =
                    Resources::from_value(map.remove("resources").unwrap_or_else(|| json!([])));
                result.errors = Errors::from_value(map.remove("errors").unwrap_or(Value::Null));
            }
        }
        result
    }

    /// Rebuilds a result from its dictionary projection.
    pub fn from_full(full: FullReturn) -> Self {
        let body = match full.body {
            Content::Binary(b) => ResponseBody::Binary(b),
            Content::Json(v) => ResponseBody::from_json(v),
        };
        ApiResult::new(full.status_code, Headers::new(full.headers), body)
    }

    /// A locally generated failure; nothing was sent.
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        let body = json!({
            "errors": [{"code": code, "message": message.into()}],
            "resources": [],
        });
        ApiResult::new(code, Headers::default(), ResponseBody::from_json(body))
    }

    /// A locally generated success. The message is kept under `meta.message`.
    pub fn ok_message(code: u16, message: impl Into<String>) -> Self {
        let body = json!({
            "meta": {"message": message.into()},
            "resources": [],
        });
        ApiResult::new(code, Headers::default(), ResponseBody::from_json(body))
    }

    /// The pre-object dictionary: `{status_code, headers, body}` unchanged.
    pub fn legacy(status_code: u16, headers: &BTreeMap<String, String>, body: Value) -> Value {
        json!({
            "status_code": status_code,
            "headers": headers,
            "body": body,
        })
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn errors(&self) -> &Errors {
        &self.errors
    }

    pub fn raw(&self) -> &RawBody {
        &self.raw
    }

    pub fn binary(&self) -> bool {
        self.resources.binary()
    }

    /// Listed resource records.
    pub fn data(&self) -> &[Value] {
        self.resources.data()
    }

    pub fn total(&self) -> u64 {
        self.meta.total()
    }

    pub fn offset(&self) -> Option<Offset> {
        self.meta.offset()
    }

    pub fn limit(&self) -> u64 {
        self.meta.limit()
    }

    pub fn query_time(&self) -> f64 {
        self.meta.query_time()
    }

    pub fn powered_by(&self) -> Option<&str> {
        self.meta.powered_by()
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.meta.trace_id()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.content_type()
    }

    pub fn content_length(&self) -> u64 {
        self.headers.content_length()
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.headers.content_encoding()
    }

    pub fn date(&self) -> Option<&str> {
        self.headers.date()
    }

    pub fn region(&self) -> Option<&str> {
        self.headers.region()
    }

    pub fn ratelimit_limit(&self) -> u64 {
        self.headers
            .ratelimit_limit()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn ratelimit_remaining(&self) -> u64 {
        self.headers
            .ratelimit_remaining()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.data().get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.data().iter()
    }

    /// True if some resource record equals `item`.
    pub fn contains<T>(&self, item: &T) -> bool
    where
        T: ?Sized,
        Value: PartialEq<T>,
    {
        self.data().iter().any(|v| v == item)
    }

    /// String records containing `needle`.
    pub fn prune(&self, needle: &str) -> Vec<&Value> {
        self.resources.contains(needle)
    }

    /// Resource records deserialized into `T`.
    pub fn deserialize_resources<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.data()
            .iter()
            .map(|v| serde_json::from_value(v.clone()).map_err(FalconError::from))
            .collect()
    }

    /// `{meta, resources, errors}` rebuilt from the live views.
    pub fn body(&self) -> Value {
        json!({
            "meta": self.meta.to_value(),
            "resources": self.resources.to_value(),
            "errors": self.errors.to_value(),
        })
    }

    fn headers_map(&self) -> BTreeMap<String, String> {
        self.headers.as_map().clone()
    }

    /// `(status, headers, content)`: file bytes for downloads, the standard
    /// body otherwise.
    pub fn tupled(&self) -> (u16, BTreeMap<String, String>, Content) {
        let content = match self.resources.bytes() {
            Some(b) => Content::Binary(b.clone()),
            None => Content::Json(self.body()),
        };
        (self.status_code, self.headers_map(), content)
    }

    /// `{status_code, headers, body}`. A verbatim raw body (token or text)
    /// is returned as-is; otherwise the body is rebuilt from the views.
    pub fn full_return(&self) -> FullReturn {
        let body = if let Some(b) = self.resources.bytes() {
            Content::Binary(b.clone())
        } else if !self.raw.is_blank() {
            Content::Json(self.raw.value().clone())
        } else {
            Content::Json(self.body())
        };
        FullReturn {
            status_code: self.status_code,
            headers: self.headers_map(),
            body,
        }
    }

    /// The full projection as one JSON value; file bytes become `null`.
    pub fn dictify(&self) -> Value {
        self.full_return().to_value()
    }

    /// Fails with [`FalconError::Api`] on a status outside 2xx.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = if self.errors.is_empty() {
            status.canonical_reason().unwrap_or("unknown error").to_string()
        } else {
            self.errors.to_string()
        };
        Err(FalconError::Api { status, message })
    }

    pub fn into_returned(self, expand_result: bool) -> Returned {
        if expand_result {
            Returned::Expanded(self.tupled())
        } else {
            Returned::Object(self)
        }
    }
}

impl fmt::Display for ApiResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dictify())
    }
}

impl Index<usize> for ApiResult {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.data()[index]
    }
}

impl<'a> IntoIterator for &'a ApiResult {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl From<ApiResult> for Map<String, Value> {
    fn from(result: ApiResult) -> Self {
        match result.dictify() {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard(body: Value) -> ApiResult {
        ApiResult::new(200, Headers::default(), ResponseBody::from_json(body))
    }

    #[test]
    fn empty_inputs_give_default_result() {
        let r = ApiResult::new(0, Headers::default(), ResponseBody::default());
        assert_eq!(r, ApiResult::default());
        assert_eq!(r.len(), 0);
        assert!(r.errors().is_empty());
    }

    #[test]
    fn error_result_carries_message() {
        let r = ApiResult::error(400, "ids is required");
        assert_eq!(r.status_code(), 400);
        assert_eq!(r.errors().to_string(), "[400] ids is required");
        assert!(r.data().is_empty());
    }

    #[test]
    fn ok_message_lands_in_meta() {
        let r = ApiResult::ok_message(200, "Token revoked");
        assert_eq!(r.meta().get("message"), Some(&json!("Token revoked")));
        assert!(r.is_success());
    }

    #[test]
    fn standard_result_indexes_and_iterates() {
        let r = standard(json!({"resources": ["a", "b", "c"]}));
        assert_eq!(r[1], json!("b"));
        assert_eq!(r.get(5), None);
        assert_eq!(r.iter().rev().next(), Some(&json!("c")));
        assert!(r.contains("a"));
        assert!(!r.contains("z"));
        assert_eq!((&r).into_iter().count(), 3);
    }

    #[test]
    fn error_for_status_passes_success_through() {
        assert!(standard(json!({"resources": []})).error_for_status().is_ok());
    }

    #[test]
    fn error_for_status_renders_errors() {
        let r = ApiResult::new(
            404,
            Headers::default(),
            ResponseBody::from_json(json!({"errors": [{"code": 404, "message": "Not Found"}]})),
        );
        match r.error_for_status() {
            Err(FalconError::Api { status, message }) => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(message, "[404] Not Found");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn ratelimit_accessors_parse_numbers() {
        let headers: Headers = [("X-Ratelimit-Limit", "6000"), ("X-Ratelimit-Remaining", "5998")]
            .into_iter()
            .collect();
        let r = ApiResult::new(200, headers, ResponseBody::from_json(json!({})));
        assert_eq!(r.ratelimit_limit(), 6000);
        assert_eq!(r.ratelimit_remaining(), 5998);
    }

    #[test]
    fn display_is_json() {
        let r = standard(json!({"resources": [1]}));
        let parsed: Value = serde_json::from_str(&r.to_string()).unwrap();
        assert_eq!(parsed["status_code"], 200);
        assert_eq!(parsed["body"]["resources"], json!([1]));
    }

    #[test]
    fn expanded_return_is_tupled() {
        let r = standard(json!({"resources": ["x"]}));
        match r.clone().into_returned(true) {
            Returned::Expanded((status, _, Content::Json(body))) => {
                assert_eq!(status, 200);
                assert_eq!(body["resources"], json!(["x"]));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(r.clone().into_returned(false).into_result(), r);
    }

    fn assert_round_trips(r: &ApiResult) {
        let full = r.full_return();
        assert_eq!(ApiResult::from_full(full.clone()).full_return(), full);
    }

    #[test]
    fn token_body_round_trips_verbatim() {
        let token = json!({"access_token": "eyJ", "token_type": "bearer", "expires_in": 1799});
        let r = ApiResult::new(201, Headers::default(), ResponseBody::from_json(token.clone()));
        assert_eq!(r.len(), 0);
        assert_eq!(r.full_return().body, Content::Json(token));
        assert_round_trips(&r);
    }

    #[test]
    fn raw_text_body_round_trips() {
        let headers: Headers = [("Content-Type", "text/plain")].into_iter().collect();
        let r = ApiResult::new(
            502,
            headers,
            ResponseBody::RawText("<html>bad gateway</html>".to_string()),
        );
        assert_eq!(r.len(), 0);
        assert_eq!(r.full_return().body, Content::Json(json!("<html>bad gateway</html>")));
        assert_round_trips(&r);
    }

    #[test]
    fn blank_body_rebuilds_as_standard_shape() {
        let r = ApiResult::new(204, Headers::default(), ResponseBody::RawText(String::new()));
        assert_eq!(r.raw().value(), &json!({}));
        assert_eq!(r.len(), 0);
        let full = r.full_return();
        assert_eq!(full.body, Content::Json(json!({"meta": {}, "resources": [], "errors": []})));
        let rebuilt = ApiResult::from_full(full.clone());
        assert!(rebuilt.raw().is_blank());
        assert_eq!(rebuilt.full_return(), full);
    }

    #[test]
    fn local_results_round_trip() {
        assert_round_trips(&ApiResult::error(400, "ids is required"));
        assert_round_trips(&ApiResult::ok_message(200, "Download successful"));
    }

    #[test]
    fn binary_body_has_no_records() {
        let r = ApiResult::new(
            200,
            Headers::default(),
            ResponseBody::Binary(Bytes::from_static(b"MZ")),
        );
        assert!(r.binary());
        assert_eq!(r.len(), 0);
        assert_eq!(r.full_return().body, Content::Binary(Bytes::from_static(b"MZ")));
    }

    #[test]
    fn legacy_wraps_arguments() {
        let mut headers = BTreeMap::new();
        headers.insert("Date".to_string(), "today".to_string());
        let v = ApiResult::legacy(201, &headers, json!({"ok": true}));
        assert_eq!(v["status_code"], 201);
        assert_eq!(v["headers"]["Date"], "today");
        assert_eq!(v["body"]["ok"], true);
    }
}
