//! Typed error hierarchy for the falcon-sdk crate.
//!
//! `FalconError` only covers failures that prevent a response from being
//! produced at all: the token endpoint rejecting us, the transport failing,
//! a caller naming an operation that does not exist. Anything the API
//! actually answers (including 4xx/5xx statuses, malformed JSON and payload
//! validation failures) is folded into an [`ApiResult`](crate::result::ApiResult)
//! instead, so callers can probe `status_code()` and `errors()` uniformly.
//!
//! - `Auth` covers the `/oauth2/token` and `/oauth2/revoke` boundary.
//! - `Api` is only produced on request, via `ApiResult::error_for_status()`.
//! - `Network` wraps `reqwest::Error` for DNS/TCP/TLS failures that never
//!   yield an HTTP status code.

use reqwest::StatusCode;

/// Unified error type for all falcon-sdk library operations.
#[derive(Debug, thiserror::Error)]
pub enum FalconError {
    /// Authentication failure at the OAuth2 token endpoint, or no usable
    /// credentials were configured.
    #[error("authentication failed: {message}")]
    Auth {
        /// Human-readable description, including the API's error message
        /// when one was returned.
        message: String,
        /// The underlying transport or parse error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The API returned a non-success HTTP status code and the caller asked
    /// for it to be treated as a hard failure.
    #[error("API error {status}: {message}")]
    Api {
        /// The HTTP status code returned by the API.
        status: StatusCode,
        /// Rendered error list (`[code] message, ...`) from the response body.
        message: String,
    },

    /// No endpoint with this operation ID (or legacy alias) exists in the
    /// endpoint manifest.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// The HTTP verb is not one of GET, POST, PATCH, PUT or DELETE.
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// A path template placeholder was left without a value.
    #[error("operation {operation} requires path variable '{variable}'")]
    MissingPathVariable {
        /// The operation ID being rendered.
        operation: String,
        /// The placeholder that was not supplied.
        variable: String,
    },

    /// Invalid or unreadable configuration.
    #[error("configuration error: {message}")]
    Config {
        /// What was wrong with the configuration.
        message: String,
        /// The underlying parse error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// JSON (de)serialization failed.
    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    /// A network-level failure occurred (DNS resolution, TCP connection,
    /// TLS handshake, request timeout, etc.).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Local I/O failed (reading a config file or an upload).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl FalconError {
    /// Shorthand for an `Auth` error without an underlying cause.
    pub fn auth(message: impl Into<String>) -> Self {
        FalconError::Auth {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a `Config` error without an underlying cause.
    pub fn config(message: impl Into<String>) -> Self {
        FalconError::Config {
            message: message.into(),
            source: None,
        }
    }
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, FalconError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn auth_error_displays_message() {
        let err = FalconError::auth("[403] access denied, invalid bearer token");
        let msg = err.to_string();
        assert!(msg.contains("authentication failed"));
        assert!(msg.contains("invalid bearer token"));
    }

    #[test]
    fn auth_error_with_source_chains_correctly() {
        let json_err: serde_json::Error = serde_json::from_str::<String>("not-json").unwrap_err();
        let err = FalconError::Auth {
            message: "failed to read token response".to_string(),
            source: Some(Box::new(json_err)),
        };
        assert!(err.source().is_some());
    }

    #[test]
    fn api_error_preserves_status_and_message() {
        let err = FalconError::Api {
            status: StatusCode::NOT_FOUND,
            message: "[404] Not Found".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("404"));
        assert!(msg.contains("Not Found"));
    }

    #[test]
    fn missing_path_variable_names_operation_and_variable() {
        let err = FalconError::MissingPathVariable {
            operation: "DeleteImageDetails".to_string(),
            variable: "image_id".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("DeleteImageDetails"));
        assert!(msg.contains("image_id"));
    }

    #[test]
    fn parse_error_wraps_serde_json() {
        let json_err: serde_json::Error =
            serde_json::from_str::<String>("{{bad json}}").unwrap_err();
        let err = FalconError::Parse(json_err);
        assert!(err.to_string().contains("failed to parse response"));
        assert!(err.source().is_some());
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FalconError>();
    }
}
