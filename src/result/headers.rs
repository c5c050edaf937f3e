//! Response header view.
//!
//! Names are stored exactly as given and looked up case-sensitively.
//! [`Headers::from_header_map`] is the normalisation point: it rewrites
//! whatever casing the transport delivered into `Train-Case`
//! (`x-ratelimit-limit` → `X-Ratelimit-Limit`).

use std::collections::BTreeMap;

use reqwest::header::HeaderMap;
use serde_json::Value;

use super::component::ResponseComponent;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new(headers: BTreeMap<String, String>) -> Self {
        Headers(headers)
    }

    /// Copies a transport header map, canonicalising every name. Values that
    /// are not valid visible ASCII are decoded lossily.
    pub fn from_header_map(map: &HeaderMap) -> Self {
        let mut headers = BTreeMap::new();
        for (name, value) in map {
            let value = match value.to_str() {
                Ok(v) => v.to_string(),
                Err(_) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
            };
            headers
                .entry(canonical_header_name(name.as_str()))
                .and_modify(|existing: &mut String| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }
        Headers(headers)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get("Content-Type")
    }

    /// Declared body length, `0` when absent or unparseable.
    pub fn content_length(&self) -> u64 {
        self.get("Content-Length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.get("Content-Encoding")
    }

    pub fn date(&self) -> Option<&str> {
        self.get("Date")
    }

    /// Cloud region that served the request.
    pub fn region(&self) -> Option<&str> {
        self.get("X-Cs-Region")
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.get("X-Cs-Traceid")
    }

    pub fn ratelimit_limit(&self) -> Option<&str> {
        self.get("X-Ratelimit-Limit")
    }

    pub fn ratelimit_remaining(&self) -> Option<&str> {
        self.get("X-Ratelimit-Remaining")
    }

    /// Epoch second after which a throttled caller may retry.
    pub fn retry_after(&self) -> Option<&str> {
        self.get("X-Ratelimit-Retryafter")
    }
}

/// `content-TYPE` → `Content-Type`.
pub fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

impl From<BTreeMap<String, String>> for Headers {
    fn from(map: BTreeMap<String, String>) -> Self {
        Headers(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Headers(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl ResponseComponent for Headers {
    fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}
