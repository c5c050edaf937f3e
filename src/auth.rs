//! OAuth2 client-credentials authentication for the Falcon API.
//!
//! `TokenProvider` owns the API credentials, the cached bearer token and
//! the base URL (which token responses may move to another region). Token
//! requests run through the same pipeline as every other call, flagged
//! `authenticating` so they never trigger a nested refresh.

use std::collections::BTreeMap;
use std::time::Instant;

use reqwest::Client;
use serde::Deserialize;

use crate::config::{autodiscover_region, confirm_base_url, Region, DEFAULT_RENEW_WINDOW};
use crate::error::{FalconError, Result};
use crate::pipeline::{perform_request, RequestAuth};
use crate::request::{ApiRequest, HttpMethod, RequestInit};
use crate::result::ApiResult;

pub const TOKEN_PATH: &str = "/oauth2/token";
pub const REVOKE_PATH: &str = "/oauth2/revoke";

/// API client ID and secret, plus the child CID to act as, if any.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub member_cid: Option<String>,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Credentials {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            member_cid: None,
        }
    }

    /// Form fields for the token request.
    pub fn token_form(&self) -> BTreeMap<String, String> {
        let mut form = BTreeMap::new();
        form.insert("client_id".to_string(), self.client_id.clone());
        form.insert("client_secret".to_string(), self.client_secret.clone());
        if let Some(cid) = &self.member_cid {
            form.insert("member_cid".to_string(), cid.clone());
        }
        form
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"REDACTED")
            .field("member_cid", &self.member_cid)
            .finish()
    }
}

/// The part of a token response we keep.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub expires_in: u64,
}

#[derive(Debug, Clone)]
pub struct BearerToken {
    value: String,
    expires_in: u64,
    acquired_at: Instant,
}

impl BearerToken {
    pub fn new(value: impl Into<String>, expires_in: u64) -> Self {
        BearerToken {
            value: value.into(),
            expires_in,
            acquired_at: Instant::now(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_in(&self) -> u64 {
        self.expires_in
    }

    /// True once less than `renew_window` seconds of lifetime remain.
    pub fn is_stale(&self, renew_window: u64) -> bool {
        let lifetime = self.expires_in.saturating_sub(renew_window);
        self.acquired_at.elapsed().as_secs() >= lifetime
    }
}

/// Manages token acquisition, caching and revocation.
///
/// Invariants:
/// - `token` is `None` until a login returns 201, and again after a failed
///   login, an invalidation or a revocation of the current token.
/// - `token()` returns `None` once the cached token enters the renew window.
#[derive(Debug)]
pub struct TokenProvider {
    credentials: Option<Credentials>,
    base_url: String,
    renew_window: u64,
    token: Option<BearerToken>,
    token_status: Option<u16>,
    fail_reason: Option<String>,
}

impl TokenProvider {
    pub fn new(credentials: Credentials, base_url: &str, renew_window: u64) -> Self {
        TokenProvider {
            credentials: Some(credentials),
            base_url: confirm_base_url(base_url),
            renew_window,
            token: None,
            token_status: None,
            fail_reason: None,
        }
    }

    /// A provider holding a pre-set token and no credentials.
    /// Used by tests to skip the token endpoint; the token is treated as
    /// freshly acquired with a 30-minute lifetime.
    pub fn with_token(token: &str) -> Self {
        TokenProvider {
            credentials: None,
            base_url: Region::Us1.url(),
            renew_window: DEFAULT_RENEW_WINDOW,
            token: Some(BearerToken::new(token, 1799)),
            token_status: Some(201),
            fail_reason: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_base_url(&mut self, base_url: &str) {
        self.base_url = confirm_base_url(base_url);
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn set_member_cid(&mut self, member_cid: Option<String>) {
        if let Some(creds) = self.credentials.as_mut() {
            creds.member_cid = member_cid;
        }
    }

    /// The cached token, or `None` if absent or inside the renew window.
    pub fn token(&self) -> Option<&str> {
        self.token
            .as_ref()
            .filter(|t| !t.is_stale(self.renew_window))
            .map(BearerToken::value)
    }

    pub fn token_status(&self) -> Option<u16> {
        self.token_status
    }

    pub fn fail_reason(&self) -> Option<&str> {
        self.fail_reason.as_deref()
    }

    pub fn invalidate(&mut self) {
        self.token = None;
    }

    /// Requests a new token and caches it on success.
    ///
    /// The token response is returned as-is whether or not it succeeded;
    /// only missing credentials or a transport failure are errors. A
    /// successful response carrying an `X-Cs-Region` header for another
    /// cloud moves the base URL there.
    pub async fn login(&mut self, transport: &Client, template: &RequestInit) -> Result<ApiResult> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| FalconError::auth("no API client credentials configured"))?;
        let init = RequestInit {
            method: HttpMethod::Post,
            data: Some(creds.token_form()),
            authenticating: true,
            ..template.clone()
        };
        let mut request = ApiRequest::new(format!("{}{TOKEN_PATH}", self.base_url), Some(init));
        if request.log_util().is_some() {
            tracing::debug!("OPERATION: oauth2AccessToken");
        }
        let result = perform_request(transport, &mut request, &BTreeMap::new(), &RequestAuth::None).await?;

        self.token_status = Some(result.status_code());
        if result.status_code() == 201 {
            let parsed: TokenResponse =
                serde_json::from_value(result.raw().value().clone()).map_err(|e| FalconError::Auth {
                    message: "token response did not contain an access token".to_string(),
                    source: Some(Box::new(e)),
                })?;
            self.token = Some(BearerToken::new(parsed.access_token, parsed.expires_in));
            self.fail_reason = None;
            self.base_url = autodiscover_region(&self.base_url, result.region());
        } else {
            self.token = None;
            self.fail_reason = result.errors().first_message().map(str::to_string);
        }
        Ok(result)
    }

    /// Logs in and fails unless a token was issued.
    pub async fn refresh_token(&mut self, transport: &Client, template: &RequestInit) -> Result<()> {
        let result = self.login(transport, template).await?;
        if self.token.is_some() {
            return Ok(());
        }
        let reason = self
            .fail_reason
            .clone()
            .unwrap_or_else(|| "token request failed".to_string());
        Err(FalconError::auth(format!("[{}] {reason}", result.status_code())))
    }

    /// Revokes `token`, or the cached token when `None`.
    ///
    /// Uses HTTP basic auth with the client credentials. Revoking the cached
    /// token also drops it.
    pub async fn revoke(
        &mut self,
        transport: &Client,
        template: &RequestInit,
        token: Option<&str>,
    ) -> Result<ApiResult> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| FalconError::auth("no API client credentials configured"))?;
        let cached = self.token.as_ref().map(|t| t.value().to_string());
        let Some(value) = token.map(str::to_string).or_else(|| cached.clone()) else {
            return Ok(ApiResult::error(400, "No token available to revoke."));
        };
        let mut form = BTreeMap::new();
        form.insert("token".to_string(), value.clone());
        let init = RequestInit {
            method: HttpMethod::Post,
            data: Some(form),
            ..template.clone()
        };
        let mut request = ApiRequest::new(format!("{}{REVOKE_PATH}", self.base_url), Some(init));
        let auth = RequestAuth::Basic {
            username: creds.client_id.clone(),
            password: creds.client_secret.clone(),
        };
        let result = perform_request(transport, &mut request, &BTreeMap::new(), &auth).await?;
        if cached.as_deref() == Some(value.as_str()) {
            self.token = None;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn token_is_none_before_login() {
        let tp = TokenProvider::new(Credentials::new("id", "secret"), "US1", 120);
        assert!(tp.token().is_none());
        assert_eq!(tp.base_url(), "https://api.crowdstrike.com");
    }

    #[test]
    fn token_form_serializes_with_optional_member_cid() {
        let mut creds = Credentials::new("cid", "s3cr3t~");
        let encoded = serde_urlencoded::to_string(creds.token_form()).unwrap();
        assert_eq!(encoded, "client_id=cid&client_secret=s3cr3t%7E");
        creds.member_cid = Some("child".to_string());
        let encoded = serde_urlencoded::to_string(creds.token_form()).unwrap();
        assert!(encoded.contains("member_cid=child"));
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let rendered = format!("{:?}", Credentials::new("cid", "hunter2"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn token_response_deserializes() {
        let json = r#"{"access_token": "eyJ.test", "token_type": "bearer", "expires_in": 1799}"#;
        let resp: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.access_token, "eyJ.test");
        assert_eq!(resp.expires_in, 1799);
    }

    #[test]
    fn fresh_token_is_available() {
        assert_eq!(TokenProvider::with_token("tok").token(), Some("tok"));
    }

    #[test]
    fn token_inside_renew_window_is_stale() {
        let mut tp = TokenProvider::with_token("tok");
        if let Some(t) = tp.token.as_mut() {
            t.acquired_at = Instant::now() - Duration::from_secs(1700);
        }
        assert!(tp.token().is_none());
    }

    #[test]
    fn token_before_renew_window_is_valid() {
        let mut tp = TokenProvider::with_token("tok");
        if let Some(t) = tp.token.as_mut() {
            t.acquired_at = Instant::now() - Duration::from_secs(60);
        }
        assert_eq!(tp.token(), Some("tok"));
    }

    #[test]
    fn invalidate_drops_token() {
        let mut tp = TokenProvider::with_token("tok");
        tp.invalidate();
        assert!(tp.token().is_none());
    }

    #[test]
    fn member_cid_is_set_on_credentials() {
        let mut tp = TokenProvider::new(Credentials::new("id", "secret"), "US1", 120);
        tp.set_member_cid(Some("child".to_string()));
        assert_eq!(tp.credentials().unwrap().member_cid.as_deref(), Some("child"));
    }
}
