//! Log facility shared by the client and every request it builds.
//!
//! All output goes through `tracing`; this type only decides *whether* the
//! SDK emits its request/response debug records and how much of each
//! payload is allowed into them. Sanitisation is on by default: credential
//! fields are replaced with `REDACTED` and logged `resources` arrays are
//! truncated to `debug_record_count` entries.

use std::collections::BTreeMap;

use serde_json::Value;

/// Default number of resource records written to debug logs.
pub const MAX_DEBUG_RECORDS: usize = 100;

/// Upper bound on records returned by any endpoint; also caps the debug
/// record count.
pub const GLOBAL_API_MAX_RETURN: usize = 5000;

const REDACTED_KEYS: &[&str] = &["access_token", "client_id", "client_secret", "member_cid", "token"];

/// Logging configuration attached to a client and copied into each request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFacility {
    active: bool,
    debug_record_count: usize,
    sanitize: bool,
}

impl Default for LogFacility {
    fn default() -> Self {
        LogFacility {
            active: false,
            debug_record_count: MAX_DEBUG_RECORDS,
            sanitize: true,
        }
    }
}

impl LogFacility {
    /// An active facility with default record count and sanitisation.
    pub fn active() -> Self {
        LogFacility {
            active: true,
            ..LogFacility::default()
        }
    }

    /// A facility that never logs.
    pub fn disabled() -> Self {
        LogFacility::default()
    }

    pub fn with_debug_record_count(mut self, count: usize) -> Self {
        self.debug_record_count = count;
        self
    }

    pub fn with_sanitize(mut self, sanitize: bool) -> Self {
        self.sanitize = sanitize;
        self
    }

    /// Stops all SDK debug logging for holders of this facility.
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn sanitize_log(&self) -> bool {
        self.sanitize
    }

    pub fn debug_record_count(&self) -> usize {
        self.debug_record_count
    }

    /// Returns a copy of `value` suitable for logging under this facility's
    /// sanitisation rules.
    pub fn scrub(&self, value: &Value) -> Value {
        if self.sanitize {
            sanitize_value(value, self.debug_record_count)
        } else {
            value.clone()
        }
    }

    /// Returns a copy of `headers` with the `Authorization` value masked
    /// when sanitisation is on.
    pub fn scrub_headers(&self, headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut cleaned = headers.clone();
        if self.sanitize {
            for (name, value) in cleaned.iter_mut() {
                if name.eq_ignore_ascii_case("authorization") {
                    *value = "Bearer REDACTED".to_string();
                }
            }
        }
        cleaned
    }
}

/// Strips confidential data from a logged JSON value.
///
/// Top-level credential keys and the same keys inside a nested `body`
/// object are redacted. A `body.resources` (or top-level `resources`)
/// array is truncated to `record_max` entries, never fewer than one.
pub fn sanitize_value(dirty: &Value, record_max: usize) -> Value {
    let mut cleaned = dirty.clone();
    let Value::Object(map) = &mut cleaned else {
        return cleaned;
    };
    redact_map(map, record_max);
    if let Some(Value::Object(body)) = map.get_mut("body") {
        redact_map(body, record_max);
    }
    if let Some(auth) = map.get_mut("Authorization") {
        *auth = Value::String("Bearer REDACTED".to_string());
    }
    cleaned
}

fn redact_map(map: &mut serde_json::Map<String, Value>, record_max: usize) {
    for key in REDACTED_KEYS {
        if let Some(value) = map.get_mut(*key) {
            *value = Value::String("REDACTED".to_string());
        }
    }
    if let Some(Value::Array(resources)) = map.get_mut("resources") {
        let keep = record_max.clamp(1, GLOBAL_API_MAX_RETURN);
        resources.truncate(keep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_facility_is_inactive_and_sanitizes() {
        let log = LogFacility::default();
        assert!(!log.is_active());
        assert!(log.sanitize_log());
        assert_eq!(log.debug_record_count(), MAX_DEBUG_RECORDS);
    }

    #[test]
    fn deactivate_turns_logging_off() {
        let mut log = LogFacility::active();
        log.deactivate();
        assert!(!log.is_active());
    }

    #[test]
    fn credentials_are_redacted() {
        let dirty = json!({
            "client_id": "abc",
            "client_secret": "shh",
            "body": {"access_token": "eyJ...", "expires_in": 1799}
        });
        let clean = sanitize_value(&dirty, 10);
        assert_eq!(clean["client_id"], "REDACTED");
        assert_eq!(clean["client_secret"], "REDACTED");
        assert_eq!(clean["body"]["access_token"], "REDACTED");
        assert_eq!(clean["body"]["expires_in"], 1799);
    }

    #[test]
    fn resources_are_truncated_to_record_count() {
        let dirty = json!({"body": {"resources": [1, 2, 3, 4, 5]}});
        let clean = sanitize_value(&dirty, 2);
        assert_eq!(clean["body"]["resources"], json!([1, 2]));
    }

    #[test]
    fn zero_record_count_still_keeps_one_record() {
        let dirty = json!({"resources": ["a", "b"]});
        let clean = sanitize_value(&dirty, 0);
        assert_eq!(clean["resources"], json!(["a"]));
    }

    #[test]
    fn scrub_is_identity_when_sanitizing_is_off() {
        let log = LogFacility::active().with_sanitize(false);
        let dirty = json!({"client_secret": "shh"});
        assert_eq!(log.scrub(&dirty), dirty);
    }

    #[test]
    fn authorization_header_is_masked() {
        let log = LogFacility::active();
        let mut headers = BTreeMap::new();
        headers.insert("Authorization".to_string(), "Bearer eyJ.secret".to_string());
        headers.insert("User-Agent".to_string(), "falcon-sdk/0.1.0".to_string());
        let clean = log.scrub_headers(&headers);
        assert_eq!(clean["Authorization"], "Bearer REDACTED");
        assert_eq!(clean["User-Agent"], "falcon-sdk/0.1.0");
    }

    #[test]
    fn non_object_values_pass_through() {
        assert_eq!(sanitize_value(&json!("plain"), 5), json!("plain"));
    }
}
