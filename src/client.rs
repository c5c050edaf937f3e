//! Authenticated client for the Falcon OAuth2 API.
//!
//! `FalconClient` owns the HTTP transport and a `TokenProvider` behind a
//! `Mutex`. Every operation goes through [`FalconClient::execute`]:
//! endpoint lookup, keyword partitioning, token check, send, normalise.
//!
//! Token lifecycle:
//! - Lazy acquisition: the first call that finds no usable token logs in.
//! - Renew window: a token within `renew_window` seconds of expiry counts
//!   as absent and is replaced on the next call.
//! - One-shot 401 retry: a `401 Unauthorized` invalidates the cached token,
//!   logs in again and repeats the call exactly once. A second 401 is
//!   returned to the caller as an ordinary result.

use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::{Client, Proxy};
use tokio::sync::Mutex;

use crate::auth::{Credentials, TokenProvider, REVOKE_PATH, TOKEN_PATH};
use crate::config::{FalconConfig, Region};
use crate::endpoint::{self, Endpoint};
use crate::error::{FalconError, Result};
use crate::log::LogFacility;
use crate::pipeline::{perform_request, prepare, RequestAuth, ServiceCall};
use crate::request::{ApiRequest, RequestInit};
use crate::result::{ApiResult, Returned};

/// Connect timeout used when the configuration does not set one.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_REDIRECTS: usize = 10;

/// Only token issue and revocation may follow redirects.
fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        let origin_is_oauth = attempt
            .previous()
            .first()
            .map(|url| {
                let path = url.path();
                path.ends_with(TOKEN_PATH) || path.ends_with(REVOKE_PATH)
            })
            .unwrap_or(false);
        if !origin_is_oauth {
            attempt.stop()
        } else if attempt.previous().len() > MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else {
            attempt.follow()
        }
    })
}

/// A 401 earns one retry with a fresh token, except on the token request
/// itself.
fn needs_token_retry(result: &ApiResult, request: &ApiRequest) -> bool {
    result.status_code() == 401 && !request.authenticating()
}

fn build_transport(config: &FalconConfig) -> Result<Client> {
    let connect = config
        .timeout
        .map(|t| t.connect())
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT);
    let mut builder = Client::builder()
        .redirect(redirect_policy())
        .connect_timeout(connect)
        .danger_accept_invalid_certs(!config.ssl_verify);
    for (scheme, url) in config.proxy.iter().flatten() {
        let proxy = match scheme.as_str() {
            "http" => Proxy::http(url)?,
            "https" => Proxy::https(url)?,
            "all" => Proxy::all(url)?,
            other => {
                return Err(FalconError::config(format!("unsupported proxy scheme '{other}'")));
            }
        };
        builder = builder.proxy(proxy);
    }
    Ok(builder.build()?)
}

/// Authenticated client for the Falcon REST API.
///
/// `auth` sits behind a `Mutex` because logging in mutates the provider
/// while calls only need `&self`. The lock covers token checks and token
/// requests, never an API call.
pub struct FalconClient {
    transport: Client,
    config: FalconConfig,
    auth: Mutex<TokenProvider>,
    log: LogFacility,
}

impl FalconClient {
    /// Builds a client from configuration. No request is made until the
    /// first call.
    pub fn new(config: FalconConfig) -> Result<Self> {
        let (Some(client_id), Some(client_secret)) = (&config.client_id, &config.client_secret)
        else {
            return Err(FalconError::auth("client_id and client_secret are required"));
        };
        let mut credentials = Credentials::new(client_id.clone(), client_secret.clone());
        credentials.member_cid = config.member_cid.clone();
        let auth = TokenProvider::new(credentials, &config.base_url, config.renew_window());
        Self::with_token_provider(config, auth)
    }

    /// Builds a client around an existing provider; the provider's base URL
    /// wins over the configuration's.
    pub fn with_token_provider(config: FalconConfig, auth: TokenProvider) -> Result<Self> {
        let transport = build_transport(&config)?;
        let log = config.log_facility();
        Ok(FalconClient {
            transport,
            config,
            auth: Mutex::new(auth),
            log,
        })
    }

    /// Points the client at a custom base URL, used by tests to talk to a
    /// local mock server.
    pub fn with_base_url(mut auth: TokenProvider, base_url: &str) -> Result<Self> {
        auth.set_base_url(base_url);
        Self::with_token_provider(FalconConfig::default().with_base_url(base_url), auth)
    }

    pub fn config(&self) -> &FalconConfig {
        &self.config
    }

    pub fn log(&self) -> &LogFacility {
        &self.log
    }

    pub async fn base_url(&self) -> String {
        self.auth.lock().await.base_url().to_string()
    }

    pub async fn authenticated(&self) -> bool {
        self.auth.lock().await.token().is_some()
    }

    pub async fn token_status(&self) -> Option<u16> {
        self.auth.lock().await.token_status()
    }

    pub async fn token_fail_reason(&self) -> Option<String> {
        self.auth.lock().await.fail_reason().map(str::to_string)
    }

    /// Connection fields every request starts from.
    fn request_template(&self) -> RequestInit {
        RequestInit {
            user_agent: self.config.user_agent.clone(),
            proxy: self.config.proxy.clone(),
            timeout: self.config.timeout,
            verify: self.config.ssl_verify,
            log: Some(self.log.clone()),
            ..RequestInit::default()
        }
    }

    /// A usable token and the current base URL, logging in if needed.
    async fn bearer_token(&self) -> Result<(String, String)> {
        let mut auth = self.auth.lock().await;
        if auth.token().is_none() {
            auth.refresh_token(&self.transport, &self.request_template()).await?;
        }
        let token = auth
            .token()
            .map(str::to_owned)
            .ok_or_else(|| FalconError::auth("token missing after refresh"))?;
        Ok((token, auth.base_url().to_string()))
    }

    /// Drops the cached token and logs in again.
    async fn force_refresh(&self) -> Result<String> {
        let mut auth = self.auth.lock().await;
        auth.invalidate();
        auth.refresh_token(&self.transport, &self.request_template()).await?;
        auth.token()
            .map(str::to_owned)
            .ok_or_else(|| FalconError::auth("token missing after forced refresh"))
    }

    /// Requests a token now. The raw token response is returned whatever
    /// its status.
    pub async fn login(&self) -> Result<ApiResult> {
        let mut auth = self.auth.lock().await;
        auth.login(&self.transport, &self.request_template()).await
    }

    /// Revokes the cached token.
    pub async fn logout(&self) -> Result<ApiResult> {
        let mut auth = self.auth.lock().await;
        auth.revoke(&self.transport, &self.request_template(), None).await
    }

    /// Revokes any token issued to these credentials.
    pub async fn revoke(&self, token: &str) -> Result<ApiResult> {
        let mut auth = self.auth.lock().await;
        auth.revoke(&self.transport, &self.request_template(), Some(token)).await
    }

    /// Re-authenticates as a child CID. `Ok(true)` when a token was issued.
    pub async fn child_login(&self, member_cid: &str) -> Result<bool> {
        let mut auth = self.auth.lock().await;
        auth.set_member_cid(Some(member_cid.to_string()));
        let result = auth.login(&self.transport, &self.request_template()).await?;
        Ok(result.status_code() == 201)
    }

    /// Leaves the child CID, then logs back in as the parent or just
    /// revokes the token.
    pub async fn child_logout(&self, login_as_parent: bool) -> Result<bool> {
        let mut auth = self.auth.lock().await;
        auth.set_member_cid(None);
        let template = self.request_template();
        if login_as_parent {
            let result = auth.login(&self.transport, &template).await?;
            Ok(result.status_code() == 201)
        } else {
            let result = auth.revoke(&self.transport, &template, None).await?;
            Ok(result.is_success())
        }
    }

    async fn dispatch(&self, operation: &str, call: ServiceCall) -> Result<(ApiResult, bool)> {
        let endpoint: &Endpoint = endpoint::lookup(operation)?;
        let call = if endpoint.operation == "ImageMatchesPolicy" {
            call.parameter("policy_type", "image-prevention-policy")
        } else {
            call
        };
        let prepared = prepare(endpoint, call, &self.log)?;
        if self.log.is_active() {
            tracing::debug!(operation = %endpoint.operation, "OPERATION");
        }

        let (token, base_url) = self.bearer_token().await?;
        let base_url = match (endpoint.is_container(), Region::from_base_url(&base_url)) {
            (true, Some(region)) => region.container_url(),
            _ => base_url,
        };
        let init = RequestInit {
            user_agent: self.config.user_agent.clone(),
            proxy: self.config.proxy.clone(),
            timeout: self.config.timeout,
            verify: self.config.ssl_verify,
            ..prepared.init
        };
        let expand_result = init.expand_result;
        let url = format!("{base_url}{}", prepared.path);

        let mut request = ApiRequest::new(url.clone(), Some(init.clone()));
        let result = perform_request(
            &self.transport,
            &mut request,
            &prepared.headers,
            &RequestAuth::Bearer(token),
        )
        .await?;

        if !needs_token_retry(&result, &request) {
            return Ok((result, expand_result));
        }
        tracing::debug!(operation = %endpoint.operation, "401 received, refreshing token");
        let fresh = self.force_refresh().await?;
        let mut retry = ApiRequest::new(url, Some(init));
        let result = perform_request(
            &self.transport,
            &mut retry,
            &prepared.headers,
            &RequestAuth::Bearer(fresh),
        )
        .await?;
        Ok((result, expand_result))
    }

    /// Runs an operation (by operation ID or method name) and returns the
    /// normalised result.
    pub async fn execute(&self, operation: &str, call: ServiceCall) -> Result<ApiResult> {
        self.dispatch(operation, call).await.map(|(result, _)| result)
    }

    /// Like [`execute`](Self::execute), honouring `expand_result`.
    pub async fn command(&self, operation: &str, call: ServiceCall) -> Result<Returned> {
        let (result, expand) = self.dispatch(operation, call).await?;
        Ok(result.into_returned(expand))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_requires_credentials() {
        let err = FalconClient::new(FalconConfig::default()).err();
        assert!(matches!(err, Some(FalconError::Auth { .. })));
    }

    #[test]
    fn unknown_proxy_scheme_is_rejected() {
        let mut cfg = FalconConfig::new("id", "secret");
        let mut proxy = std::collections::BTreeMap::new();
        proxy.insert("socks9".to_string(), "socks9://nowhere".to_string());
        cfg.proxy = Some(proxy);
        assert!(matches!(build_transport(&cfg), Err(FalconError::Config { .. })));
    }

    #[test]
    fn only_non_token_401s_are_retried() {
        let unauthorized = ApiResult::error(401, "access denied");
        let call = ApiRequest::new("https://api.crowdstrike.com/devices", None);
        let token_request = ApiRequest::new(
            "https://api.crowdstrike.com/oauth2/token",
            Some(RequestInit {
                authenticating: true,
                ..RequestInit::default()
            }),
        );
        assert!(needs_token_retry(&unauthorized, &call));
        assert!(!needs_token_retry(&unauthorized, &token_request));
        assert!(!needs_token_retry(&ApiResult::error(403, "forbidden"), &call));
    }

    #[tokio::test]
    async fn base_url_comes_from_provider() {
        let client =
            FalconClient::with_base_url(TokenProvider::with_token("tok"), "http://127.0.0.1:9/").unwrap();
        assert_eq!(client.base_url().await, "http://127.0.0.1:9");
        assert!(client.authenticated().await);
    }
}
