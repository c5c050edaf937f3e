//! From service call to [`ApiResult`].
//!
//! A [`ServiceCall`] collects what a caller supplied (keywords, explicit
//! query parameters, a body, form fields, files). [`prepare`] sorts the
//! keywords by each parameter's `in` location, renders the path template
//! and produces a [`RequestInit`]. [`perform_request`] runs the validation
//! gate, sends the call and classifies the response.
//!
//! Only transport failures surface as `Err`. A rejected payload comes back
//! as a synthetic status-400 result without anything being sent, and every
//! HTTP status, including 4xx/5xx, is an ordinary result.

use std::collections::BTreeMap;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::{Map, Value};

use crate::endpoint::{Endpoint, ParamLocation};
use crate::error::{FalconError, Result};
use crate::log::LogFacility;
use crate::request::{
    ApiRequest, FieldType, FileUpload, PayloadValidationError, RequestBody, RequestInit,
    RequestValidator,
};
use crate::result::{ApiResult, Headers, ResponseBody};

/// Sent as `User-Agent` (unless overridden) and always as `CrowdStrike-SDK`.
pub const USER_AGENT: &str = concat!("falcon-sdk/", env!("CARGO_PKG_VERSION"));

/// Credentials attached to one outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestAuth {
    Bearer(String),
    Basic { username: String, password: String },
    None,
}

/// Everything a caller hands to one operation.
#[derive(Debug, Clone, Default)]
pub struct ServiceCall {
    parameters: Map<String, Value>,
    keywords: Map<String, Value>,
    body: Option<Value>,
    raw_body: Option<Bytes>,
    data: BTreeMap<String, String>,
    files: Vec<FileUpload>,
    headers: BTreeMap<String, String>,
    ids: Option<String>,
    path_vars: BTreeMap<String, String>,
    validator: Option<BTreeMap<String, FieldType>>,
    required: Option<Vec<String>>,
    expand_result: Option<bool>,
}

impl ServiceCall {
    pub fn new() -> Self {
        ServiceCall::default()
    }

    /// An explicit query parameter, sent as given.
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    /// A keyword routed by the endpoint's parameter schema.
    pub fn keyword(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.insert(name.into(), value.into());
        self
    }

    pub fn keywords(mut self, keywords: Map<String, Value>) -> Self {
        self.keywords.extend(keywords);
        self
    }

    /// Keywords from `(name, Option<value>)` pairs; `None` entries are skipped.
    pub fn keywords_from<K, V, I>(mut self, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, Option<V>)>,
    {
        for (name, value) in pairs {
            if let Some(value) = value {
                self.keywords.insert(name.into(), value.into());
            }
        }
        self
    }

    /// A JSON body. Object keys win over body keywords of the same name.
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn raw_body(mut self, body: impl Into<Bytes>) -> Self {
        self.raw_body = Some(body.into());
        self
    }

    pub fn form(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(name.into(), value.into());
        self
    }

    pub fn file(mut self, file: FileUpload) -> Self {
        self.files.push(file);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// IDs substituted into a `{}` path placeholder.
    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined: Vec<String> = ids.into_iter().map(|s| s.as_ref().to_string()).collect();
        self.ids = Some(joined.join(","));
        self
    }

    pub fn path_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_vars.insert(name.into(), value.into());
        self
    }

    pub fn validator(
        mut self,
        validator: BTreeMap<String, FieldType>,
        required: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.validator = Some(validator);
        self.required = Some(required.into_iter().map(Into::into).collect());
        self
    }

    pub fn expand_result(mut self, expand: bool) -> Self {
        self.expand_result = Some(expand);
        self
    }
}

/// Keywords sorted by where the endpoint expects them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partitioned {
    pub params: Map<String, Value>,
    pub body: Map<String, Value>,
    pub data: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub path_vars: BTreeMap<String, String>,
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(scalar_text).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

/// Routes keywords by each matching parameter's `in` location.
///
/// Comma-delimited strings for array-typed query parameters are split into
/// lists. Query strings containing `%3A` draw a warning, since values are
/// encoded on send. Keywords the endpoint does not declare are dropped.
pub fn args_to_params(endpoint: &Endpoint, keywords: &Map<String, Value>, log: &LogFacility) -> Partitioned {
    let mut out = Partitioned::default();
    for (name, value) in keywords {
        let Some(spec) = endpoint.param(name) else {
            continue;
        };
        match spec.location {
            ParamLocation::Query => {
                let value = match (spec.kind, value) {
                    (Some(FieldType::Array), Value::String(s)) => Value::Array(
                        s.split(',').map(|part| Value::String(part.to_string())).collect(),
                    ),
                    _ => value.clone(),
                };
                if let Value::String(s) = &value {
                    if s.contains("%3A") && log.is_active() {
                        tracing::warn!(
                            "{name} argument contains potentially urlencoded string of '{s}'."
                        );
                    }
                }
                out.params.insert(name.clone(), value);
            }
            ParamLocation::Body => {
                out.body.insert(name.clone(), value.clone());
            }
            ParamLocation::FormData => {
                out.data.insert(name.clone(), scalar_text(value));
            }
            ParamLocation::Header => {
                out.headers.insert(name.clone(), scalar_text(value));
            }
            ParamLocation::Path => {
                out.path_vars.insert(name.clone(), scalar_text(value));
            }
        }
    }
    out
}

/// Comma-joined ID list from a string (`"a,b"` or `"a"`) or array value.
pub fn parse_id_list(ids: &Value) -> String {
    match ids {
        Value::Array(items) => items.iter().map(scalar_text).collect::<Vec<_>>().join(","),
        Value::Null => String::new(),
        other => scalar_text(other),
    }
}

/// Percent-encodes each comma-separated ID, keeping the commas.
fn encode_ids(ids: &str) -> String {
    ids.split(',')
        .map(|id| urlencoding::encode(id.trim()).into_owned())
        .collect::<Vec<_>>()
        .join(",")
}

/// Fills `{}` with `ids` and each `{name}` from `path_vars`. Substituted
/// values are percent-encoded.
pub fn render_path(
    endpoint: &Endpoint,
    ids: Option<&str>,
    path_vars: &BTreeMap<String, String>,
) -> Result<String> {
    let missing = |variable: &str| FalconError::MissingPathVariable {
        operation: endpoint.operation.clone(),
        variable: variable.to_string(),
    };
    let template = endpoint.path.as_str();
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| missing(after))?;
        let name = &after[..close];
        if name.is_empty() {
            let ids = ids.filter(|s| !s.is_empty()).ok_or_else(|| missing("ids"))?;
            rendered.push_str(&encode_ids(ids));
        } else {
            let value = path_vars.get(name).ok_or_else(|| missing(name))?;
            rendered.push_str(&urlencoding::encode(value));
        }
        rest = &after[close + 1..];
    }
    rendered.push_str(rest);
    Ok(rendered)
}

/// Checks a JSON body against a validator.
///
/// Every required key must be present. Keys present in both the body and
/// the type map must hold a value of the declared type. Keys the type map
/// does not mention are not checked.
pub fn validate_payload(
    validator: &RequestValidator,
    body: Option<&Value>,
) -> std::result::Result<(), PayloadValidationError> {
    let empty = Map::new();
    let map = body.and_then(Value::as_object).unwrap_or(&empty);
    for key in validator.required().unwrap_or_default() {
        if !map.contains_key(key) {
            return Err(PayloadValidationError::new(format!("Argument {key} must be specified.")));
        }
    }
    if let Some(types) = validator.validator() {
        for (key, value) in map {
            if let Some(expected) = types.get(key) {
                if !expected.matches(value) {
                    return Err(PayloadValidationError::new(format!(
                        "{key} is not the valid type. Should be: {expected}, was {}",
                        FieldType::describe(value)
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Output of [`prepare`]: the rendered path, the request fields, and any
/// extra headers.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub path: String,
    pub init: RequestInit,
    pub headers: BTreeMap<String, String>,
}

/// Partitions a call against its endpoint and renders the path.
pub fn prepare(endpoint: &Endpoint, call: ServiceCall, log: &LogFacility) -> Result<Prepared> {
    let ServiceCall {
        parameters,
        mut keywords,
        body,
        raw_body,
        mut data,
        files,
        mut headers,
        ids,
        mut path_vars,
        validator,
        required,
        expand_result,
    } = call;

    let keyword_expand = keywords
        .remove("expand_result")
        .and_then(|v| v.as_bool());
    let bulk_path = endpoint.path.contains("{}");
    let ids = match ids {
        Some(ids) => Some(ids),
        None if bulk_path => keywords.remove("ids").map(|v| parse_id_list(&v)),
        None => None,
    };

    let partitioned = args_to_params(endpoint, &keywords, log);
    let mut params = partitioned.params;
    params.extend(parameters);
    if bulk_path {
        params.remove("ids");
    }
    for (k, v) in partitioned.data {
        data.entry(k).or_insert(v);
    }
    for (k, v) in partitioned.headers {
        headers.entry(k).or_insert(v);
    }
    for (k, v) in partitioned.path_vars {
        path_vars.entry(k).or_insert(v);
    }

    let body = match (raw_body, body) {
        (Some(bytes), _) => Some(RequestBody::Bytes(bytes)),
        (None, Some(Value::Object(explicit))) => {
            let mut merged = partitioned.body;
            merged.extend(explicit);
            Some(RequestBody::Json(Value::Object(merged)))
        }
        (None, Some(other)) => Some(RequestBody::Json(other)),
        (None, None) if !partitioned.body.is_empty() => {
            Some(RequestBody::Json(Value::Object(partitioned.body)))
        }
        (None, None) => None,
    };

    let path = render_path(endpoint, ids.as_deref(), &path_vars)?;
    let init = RequestInit {
        method: endpoint.method,
        params: (!params.is_empty()).then_some(params),
        body,
        data: (!data.is_empty()).then_some(data),
        files,
        expand_result: expand_result.or(keyword_expand).unwrap_or(false),
        container: endpoint.is_container(),
        body_validator: validator,
        body_required: required,
        log: Some(log.clone()),
        ..RequestInit::default()
    };
    Ok(Prepared { path, init, headers })
}

fn multipart_form(data: Option<&BTreeMap<String, String>>, files: &[FileUpload]) -> Result<Form> {
    let mut form = Form::new();
    for (name, value) in data.into_iter().flatten() {
        form = form.text(name.clone(), value.clone());
    }
    for file in files {
        let part = Part::bytes(file.content.to_vec())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)?;
        form = form.part(file.field_name.clone(), part);
    }
    Ok(form)
}

fn log_payloads(request: &ApiRequest, headers: &BTreeMap<String, String>) {
    let Some(log) = request.log_util() else {
        return;
    };
    let params = Value::Object(request.params().cloned().unwrap_or_default());
    let body = match request.body() {
        Some(RequestBody::Json(v)) => log.scrub(v),
        Some(RequestBody::Bytes(b)) => Value::String(format!("<{} bytes>", b.len())),
        None => Value::Null,
    };
    let data = request
        .data()
        .map(|d| log.scrub(&serde_json::json!(d)))
        .unwrap_or(Value::Null);
    tracing::debug!(endpoint = request.endpoint(), method = %request.method(), "ENDPOINT");
    tracing::debug!(headers = ?log.scrub_headers(headers), "HEADERS");
    tracing::debug!(params = %log.scrub(&params), "PARAMETERS");
    tracing::debug!(body = %body, "BODY");
    tracing::debug!(data = %data, "DATA");
}

fn log_response(request: &ApiRequest, result: &ApiResult, kind: &str) {
    let Some(log) = request.log_util() else {
        return;
    };
    tracing::debug!(status = result.status_code(), kind, "STATUS CODE");
    if result.binary() {
        tracing::debug!("RESULT: binary response received from API");
    } else {
        tracing::debug!(result = %log.scrub(&result.dictify()), "RESULT");
    }
}

/// Sends one request and normalises the response.
pub async fn perform_request(
    transport: &Client,
    request: &mut ApiRequest,
    headers: &BTreeMap<String, String>,
    auth: &RequestAuth,
) -> Result<ApiResult> {
    if !request.verify() {
        request.log_warning("SSL verification is disabled for this request.");
    }

    if !request.validator().is_empty() {
        if let Err(err) = validate_payload(request.validator(), request.payloads().json_body()) {
            request.log_error(&format!("ERROR: [400] {}", err.message));
            request.mark_invalid();
            return Ok(ApiResult::error(400, err.message));
        }
    }
    if !request.perform() {
        return Ok(ApiResult::error(400, "Request was not performed."));
    }

    let mut outbound = headers.clone();
    outbound.insert(
        "User-Agent".to_string(),
        request.user_agent().unwrap_or(USER_AGENT).to_string(),
    );
    outbound.insert("CrowdStrike-SDK".to_string(), USER_AGENT.to_string());

    let mut builder = transport.request(request.method().into(), request.endpoint());
    for (name, value) in &outbound {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder = match auth {
        RequestAuth::Bearer(token) => builder.bearer_auth(token),
        RequestAuth::Basic { username, password } => builder.basic_auth(username, Some(password)),
        RequestAuth::None => builder,
    };
    let query = request.payloads().query_pairs();
    if !query.is_empty() {
        builder = builder.query(&query);
    }
    match request.body() {
        Some(RequestBody::Json(body)) => builder = builder.json(body),
        Some(RequestBody::Bytes(bytes)) => builder = builder.body(bytes.clone()),
        None => {}
    }
    if !request.files().is_empty() {
        builder = builder.multipart(multipart_form(request.data(), request.files())?);
    } else if let Some(data) = request.data() {
        builder = builder.form(data);
    }
    if let Some(timeout) = request.timeout() {
        builder = builder.timeout(timeout.read());
    }

    log_payloads(request, &outbound);

    let response = builder.send().await?;
    let status = response.status().as_u16();
    let response_headers = Headers::from_header_map(response.headers());
    request.set_debug_headers(response_headers.as_map().clone());
    let content = response.bytes().await?;
    let body = ResponseBody::classify(response_headers.content_type(), content, request.container());
    let kind = body.kind();
    let result = ApiResult::new(status, response_headers, body);

    log_response(request, &result, kind);
    if status >= 400 {
        let message = result
            .errors()
            .first_message()
            .map(str::to_string)
            .unwrap_or_else(|| result.errors().to_string());
        request.log_error(&format!("ERROR: {message}"));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::lookup;
    use serde_json::json;

    #[test]
    fn array_query_strings_are_split() {
        let ep = lookup("GetDeviceDetails").unwrap();
        let mut kw = Map::new();
        kw.insert("ids".into(), json!("a,b,c"));
        let out = args_to_params(ep, &kw, &LogFacility::disabled());
        assert_eq!(out.params["ids"], json!(["a", "b", "c"]));
    }

    #[test]
    fn keywords_are_routed_by_location() {
        let ep = lookup("UploadSampleV3").unwrap();
        let mut kw = Map::new();
        kw.insert("file_name".into(), json!("evil.exe"));
        kw.insert("is_confidential".into(), json!(false));
        kw.insert("bogus".into(), json!(1));
        let out = args_to_params(ep, &kw, &LogFacility::disabled());
        assert_eq!(out.data["file_name"], "evil.exe");
        assert_eq!(out.data["is_confidential"], "false");
        assert!(out.params.is_empty());
        assert!(!out.data.contains_key("bogus"));
    }

    #[test]
    fn body_keywords_collect_into_body() {
        let ep = lookup("PerformActionV2").unwrap();
        let mut kw = Map::new();
        kw.insert("ids".into(), json!(["aid1"]));
        kw.insert("action_name".into(), json!("contain"));
        let out = args_to_params(ep, &kw, &LogFacility::disabled());
        assert_eq!(out.body["ids"], json!(["aid1"]));
        assert_eq!(out.params["action_name"], json!("contain"));
    }

    #[test]
    fn bulk_placeholder_takes_joined_ids() {
        let ep = lookup("GetDeviceDetails").unwrap();
        let path = render_path(ep, Some("a,b"), &BTreeMap::new()).unwrap();
        assert_eq!(path, "/devices/entities/devices/v1?ids=a,b");
    }

    #[test]
    fn bulk_ids_are_percent_encoded() {
        let ep = lookup("GetDeviceDetails").unwrap();
        let path = render_path(ep, Some("a&b=1,c d#e"), &BTreeMap::new()).unwrap();
        assert_eq!(path, "/devices/entities/devices/v1?ids=a%26b%3D1,c%20d%23e");
    }

    #[test]
    fn named_placeholder_value_is_encoded() {
        let ep = lookup("DeleteImageDetails").unwrap();
        let mut vars = BTreeMap::new();
        vars.insert("image_id".to_string(), "../x?y".to_string());
        assert_eq!(render_path(ep, None, &vars).unwrap(), "/images/..%2Fx%3Fy");
    }

    #[test]
    fn named_placeholder_is_rendered() {
        let ep = lookup("DeleteImageDetails").unwrap();
        let mut vars = BTreeMap::new();
        vars.insert("image_id".to_string(), "sha256abc".to_string());
        assert_eq!(render_path(ep, None, &vars).unwrap(), "/images/sha256abc");
    }

    #[test]
    fn missing_placeholder_value_is_an_error() {
        let ep = lookup("DeleteImageDetails").unwrap();
        let err = render_path(ep, None, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, FalconError::MissingPathVariable { variable, .. } if variable == "image_id"));
    }

    #[test]
    fn id_lists_join() {
        assert_eq!(parse_id_list(&json!(["a", "b"])), "a,b");
        assert_eq!(parse_id_list(&json!("a,b")), "a,b");
        assert_eq!(parse_id_list(&Value::Null), "");
    }

    fn ids_validator() -> RequestValidator {
        let mut types = BTreeMap::new();
        types.insert("ids".to_string(), FieldType::Array);
        RequestValidator::new(Some(types), Some(vec!["ids".to_string()]))
    }

    #[test]
    fn validation_rejects_missing_required_field() {
        let err = validate_payload(&ids_validator(), Some(&json!({"other": 1}))).unwrap_err();
        assert_eq!(err.message, "Argument ids must be specified.");
    }

    #[test]
    fn validation_rejects_wrong_type() {
        let err = validate_payload(&ids_validator(), Some(&json!({"ids": "a,b"}))).unwrap_err();
        assert!(err.message.starts_with("ids is not the valid type"));
    }

    #[test]
    fn validation_accepts_matching_body_and_ignores_unlisted_keys() {
        assert!(validate_payload(&ids_validator(), Some(&json!({"ids": ["a"], "note": 3}))).is_ok());
    }

    #[test]
    fn prepare_merges_explicit_body_over_keywords() {
        let ep = lookup("PerformActionV2").unwrap();
        let call = ServiceCall::new()
            .keyword("action_name", "contain")
            .keyword("ids", json!(["from-kw"]))
            .body(json!({"ids": ["from-body"]}));
        let prepared = prepare(ep, call, &LogFacility::disabled()).unwrap();
        let req = ApiRequest::new(prepared.path, Some(prepared.init));
        assert_eq!(req.payloads().json_body(), Some(&json!({"ids": ["from-body"]})));
        assert_eq!(req.params().unwrap()["action_name"], json!("contain"));
    }

    #[test]
    fn prepare_moves_ids_into_bulk_path() {
        let ep = lookup("GetDeviceDetails").unwrap();
        let call = ServiceCall::new().keyword("ids", json!(["x", "y"]));
        let prepared = prepare(ep, call, &LogFacility::disabled()).unwrap();
        assert_eq!(prepared.path, "/devices/entities/devices/v1?ids=x,y");
        assert!(prepared.init.params.is_none());
    }

    #[test]
    fn prepare_reads_expand_result_keyword() {
        let ep = lookup("QueryDevicesByFilter").unwrap();
        let call = ServiceCall::new().keyword("expand_result", true).keyword("limit", 5);
        let prepared = prepare(ep, call, &LogFacility::disabled()).unwrap();
        assert!(prepared.init.expand_result);
        assert_eq!(prepared.init.params.unwrap()["limit"], json!(5));
    }

    #[test]
    fn container_endpoints_set_container_flag() {
        let ep = lookup("ImageMatchesPolicy").unwrap();
        let call = ServiceCall::new().keyword("repository", "r").keyword("tag", "latest");
        let prepared = prepare(ep, call, &LogFacility::disabled()).unwrap();
        assert!(prepared.init.container);
    }
}
