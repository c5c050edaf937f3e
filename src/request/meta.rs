//! Endpoint and verb of a single outbound call.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::error::FalconError;

/// HTTP verbs accepted by the API.
///
/// Parsing is case-insensitive; anything outside these five variants is
/// rejected with `FalconError::InvalidMethod`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = FalconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PATCH" => Ok(HttpMethod::Patch),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => Err(FalconError::InvalidMethod(s.to_string())),
        }
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

/// Target URL, verb, and (after the call) the response headers recorded
/// for debugging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    endpoint: String,
    method: HttpMethod,
    debug_headers: BTreeMap<String, String>,
}

impl RequestMeta {
    pub fn new(endpoint: impl Into<String>, method: HttpMethod) -> Self {
        RequestMeta {
            endpoint: endpoint.into(),
            method,
            debug_headers: BTreeMap::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Response headers captured once the call completes; empty before.
    pub fn debug_headers(&self) -> &BTreeMap<String, String> {
        &self.debug_headers
    }

    pub fn set_debug_headers(&mut self, headers: BTreeMap<String, String>) {
        self.debug_headers = headers;
    }
}
