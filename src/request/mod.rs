//! Request descriptor assembled before every API call.
//!
//! An [`ApiRequest`] owns one each of [`RequestMeta`], [`RequestPayloads`],
//! [`RequestConnection`] and [`RequestBehavior`], plus a copy of the
//! client's [`LogFacility`]. It does no I/O; the pipeline reads it, sends
//! the call and records the response headers back onto it.

pub mod behavior;
pub mod connection;
pub mod meta;
pub mod payloads;
pub mod validator;

use std::collections::BTreeMap;

use serde_json::{Map, Value};

pub use behavior::RequestBehavior;
pub use connection::{RequestConnection, Timeout};
pub use meta::{HttpMethod, RequestMeta};
pub use payloads::{FileUpload, RequestBody, RequestPayloads};
pub use validator::{FieldType, PayloadValidationError, RequestValidator};

use crate::log::LogFacility;

/// Everything an [`ApiRequest`] may be built from. Unset fields keep their
/// defaults: GET, no payloads, TLS verification on, `perform = true`.
#[derive(Debug, Clone)]
pub struct RequestInit {
    pub method: HttpMethod,
    pub params: Option<Map<String, Value>>,
    pub body: Option<RequestBody>,
    pub data: Option<BTreeMap<String, String>>,
    pub files: Vec<FileUpload>,
    pub user_agent: Option<String>,
    pub proxy: Option<BTreeMap<String, String>>,
    pub timeout: Option<Timeout>,
    pub verify: bool,
    pub expand_result: bool,
    pub container: bool,
    pub authenticating: bool,
    pub perform: bool,
    pub body_validator: Option<BTreeMap<String, FieldType>>,
    pub body_required: Option<Vec<String>>,
    pub log: Option<LogFacility>,
    pub debug_record_count: Option<usize>,
    pub sanitize: Option<bool>,
}

impl Default for RequestInit {
    fn default() -> Self {
        RequestInit {
            method: HttpMethod::Get,
            params: None,
            body: None,
            data: None,
            files: Vec::new(),
            user_agent: None,
            proxy: None,
            timeout: None,
            verify: true,
            expand_result: false,
            container: false,
            authenticating: false,
            perform: true,
            body_validator: None,
            body_required: None,
            log: None,
            debug_record_count: None,
            sanitize: None,
        }
    }
}

/// One outbound API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    meta: RequestMeta,
    payloads: RequestPayloads,
    connection: RequestConnection,
    behavior: RequestBehavior,
    log: Option<LogFacility>,
}

impl ApiRequest {
    /// Builds a request for `endpoint`. `None` yields an inert GET with no
    /// payloads, used as a placeholder and never sent.
    pub fn new(endpoint: impl Into<String>, init: Option<RequestInit>) -> Self {
        let init = init.unwrap_or_default();
        let log = init.log.map(|mut log| {
            if let Some(count) = init.debug_record_count {
                log = log.with_debug_record_count(count);
            }
            if let Some(sanitize) = init.sanitize {
                log = log.with_sanitize(sanitize);
            }
            log
        });
        ApiRequest {
            meta: RequestMeta::new(endpoint, init.method),
            payloads: RequestPayloads::new(init.params, init.body, init.data, init.files),
            connection: RequestConnection::new(init.user_agent, init.proxy, init.timeout, init.verify),
            behavior: RequestBehavior::new(
                init.expand_result,
                init.container,
                init.authenticating,
                init.perform,
                RequestValidator::new(init.body_validator, init.body_required),
            ),
            log,
        }
    }

    pub fn request_meta(&self) -> &RequestMeta {
        &self.meta
    }

    pub fn payloads(&self) -> &RequestPayloads {
        &self.payloads
    }

    pub fn connection(&self) -> &RequestConnection {
        &self.connection
    }

    pub fn behavior(&self) -> &RequestBehavior {
        &self.behavior
    }

    pub fn endpoint(&self) -> &str {
        self.meta.endpoint()
    }

    pub fn method(&self) -> HttpMethod {
        self.meta.method()
    }

    pub fn debug_headers(&self) -> &BTreeMap<String, String> {
        self.meta.debug_headers()
    }

    /// Records the response headers once the call completes.
    pub fn set_debug_headers(&mut self, headers: BTreeMap<String, String>) {
        self.meta.set_debug_headers(headers);
    }

    pub fn params(&self) -> Option<&Map<String, Value>> {
        self.payloads.params()
    }

    pub fn body(&self) -> Option<&RequestBody> {
        self.payloads.body()
    }

    pub fn data(&self) -> Option<&BTreeMap<String, String>> {
        self.payloads.data()
    }

    pub fn files(&self) -> &[FileUpload] {
        self.payloads.files()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.connection.user_agent()
    }

    pub fn proxy(&self) -> Option<&BTreeMap<String, String>> {
        self.connection.proxy()
    }

    pub fn timeout(&self) -> Option<Timeout> {
        self.connection.timeout()
    }

    pub fn verify(&self) -> bool {
        self.connection.verify()
    }

    pub fn expand_result(&self) -> bool {
        self.behavior.expand_result()
    }

    pub fn container(&self) -> bool {
        self.behavior.container()
    }

    pub fn authenticating(&self) -> bool {
        self.behavior.authenticating()
    }

    pub fn perform(&self) -> bool {
        self.behavior.perform()
    }

    pub fn body_validator(&self) -> Option<&BTreeMap<String, FieldType>> {
        self.behavior.validator().validator()
    }

    pub fn body_required(&self) -> Option<&[String]> {
        self.behavior.validator().required()
    }

    pub fn validator(&self) -> &RequestValidator {
        self.behavior.validator()
    }

    /// Blocks the network call; only the validation gate calls this.
    pub(crate) fn mark_invalid(&mut self) {
        self.behavior.mark_invalid();
    }

    /// The attached facility, if it is active.
    pub fn log_util(&self) -> Option<&LogFacility> {
        self.log.as_ref().filter(|log| log.is_active())
    }

    pub fn debug_record_count(&self) -> Option<usize> {
        self.log.as_ref().map(LogFacility::debug_record_count)
    }

    pub fn sanitize_log(&self) -> Option<bool> {
        self.log.as_ref().map(LogFacility::sanitize_log)
    }

    pub fn log_error(&self, message: &str) {
        if self.log_util().is_some() {
            tracing::error!(endpoint = self.endpoint(), "{message}");
        }
    }

    pub fn log_warning(&self, message: &str) {
        if self.log_util().is_some() {
            tracing::warn!(endpoint = self.endpoint(), "{message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_initializer_builds_inert_get() {
        let req = ApiRequest::new("/devices/queries/devices/v1", None);
        assert_eq!(req.method(), HttpMethod::Get);
        assert_eq!(req.endpoint(), "/devices/queries/devices/v1");
        assert!(req.params().is_none());
        assert!(req.body().is_none());
        assert!(req.data().is_none());
        assert!(req.files().is_empty());
        assert!(req.verify());
        assert!(req.perform());
        assert!(!req.authenticating());
        assert!(req.validator().is_empty());
        assert!(req.log_util().is_none());
    }

    #[test]
    fn initializer_fields_are_flattened() {
        let init = RequestInit {
            method: HttpMethod::Post,
            body: Some(json!({"ids": ["a", "b"]}).into()),
            user_agent: Some("sweeper/1.0".to_string()),
            verify: false,
            container: true,
            body_required: Some(vec!["ids".to_string()]),
            ..RequestInit::default()
        };
        let req = ApiRequest::new("/images/{}", Some(init));
        assert_eq!(req.method(), HttpMethod::Post);
        assert_eq!(req.payloads().json_body(), Some(&json!({"ids": ["a", "b"]})));
        assert_eq!(req.user_agent(), Some("sweeper/1.0"));
        assert!(!req.verify());
        assert!(req.container());
        assert_eq!(req.body_required(), Some(&["ids".to_string()][..]));
    }

    #[test]
    fn log_overrides_apply_to_attached_facility() {
        let init = RequestInit {
            log: Some(LogFacility::active()),
            debug_record_count: Some(7),
            sanitize: Some(false),
            ..RequestInit::default()
        };
        let req = ApiRequest::new("/x", Some(init));
        assert_eq!(req.debug_record_count(), Some(7));
        assert_eq!(req.sanitize_log(), Some(false));
    }

    #[test]
    fn logging_without_facility_is_a_no_op() {
        let req = ApiRequest::new("/x", None);
        req.log_error("nothing listens");
        req.log_warning("still nothing");
        assert!(req.debug_record_count().is_none());
    }

    #[test]
    fn inactive_facility_is_not_exposed() {
        let init = RequestInit {
            log: Some(LogFacility::disabled()),
            ..RequestInit::default()
        };
        let req = ApiRequest::new("/x", Some(init));
        assert!(req.log_util().is_none());
    }

    #[test]
    fn mark_invalid_blocks_perform() {
        let mut req = ApiRequest::new("/x", None);
        req.mark_invalid();
        assert!(!req.perform());
    }
}
