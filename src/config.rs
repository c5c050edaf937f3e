//! Client configuration and cloud region resolution.
//!
//! `FalconConfig` is read from a TOML file or built in code. Credentials not
//! present in the file fall back to the `FALCON_CLIENT_ID` and
//! `FALCON_CLIENT_SECRET` environment variables.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::{FalconError, Result};
use crate::log::{LogFacility, GLOBAL_API_MAX_RETURN, MAX_DEBUG_RECORDS};
use crate::request::Timeout;

pub const CLIENT_ID_ENV: &str = "FALCON_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "FALCON_CLIENT_SECRET";

/// Seconds before expiry at which a token is considered stale.
pub const DEFAULT_RENEW_WINDOW: u64 = 120;
const MAX_RENEW_WINDOW: u64 = 1200;

/// A Falcon cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Us1,
    Us2,
    Eu1,
    UsGov1,
    UsGov2,
}

impl Region {
    pub const ALL: [Region; 5] = [Region::Us1, Region::Us2, Region::Eu1, Region::UsGov1, Region::UsGov2];

    pub fn name(&self) -> &'static str {
        match self {
            Region::Us1 => "US1",
            Region::Us2 => "US2",
            Region::Eu1 => "EU1",
            Region::UsGov1 => "USGOV1",
            Region::UsGov2 => "USGOV2",
        }
    }

    /// API host, without scheme.
    pub fn host(&self) -> &'static str {
        match self {
            Region::Us1 => "api.crowdstrike.com",
            Region::Us2 => "api.us-2.crowdstrike.com",
            Region::Eu1 => "api.eu-1.crowdstrike.com",
            Region::UsGov1 => "api.laggar.gcw.crowdstrike.com",
            Region::UsGov2 => "api.us-gov-2.crowdstrike.mil",
        }
    }

    /// Container registry host, without scheme.
    pub fn container_host(&self) -> &'static str {
        match self {
            Region::Us1 => "container-upload.us-1.crowdstrike.com",
            Region::Us2 => "container-upload.us-2.crowdstrike.com",
            Region::Eu1 => "container-upload.eu-1.crowdstrike.com",
            Region::UsGov1 => "container-upload.laggar.gcw.crowdstrike.com",
            Region::UsGov2 => "container-upload.us-gov-2.crowdstrike.mil",
        }
    }

    pub fn url(&self) -> String {
        format!("https://{}", self.host())
    }

    pub fn container_url(&self) -> String {
        format!("https://{}", self.container_host())
    }

    /// Accepts `US1`, `us-1`, `USGOV1`, `us-gov-1` and so on.
    pub fn from_name(name: &str) -> Option<Region> {
        let compact = name.trim().replace('-', "").to_ascii_uppercase();
        Region::ALL.into_iter().find(|r| r.name() == compact)
    }

    /// The region whose API host `base_url` points at.
    pub fn from_base_url(base_url: &str) -> Option<Region> {
        let host = base_url
            .trim()
            .trim_start_matches("https://")
            .trim_end_matches('/')
            .to_ascii_lowercase();
        Region::ALL.into_iter().find(|r| r.host() == host)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Normalises a base URL or region short name into `https://host`.
///
/// Region names map to their API host. Other values without a scheme get
/// `https://` prepended. A trailing `/` is dropped.
pub fn confirm_base_url(provided: &str) -> String {
    let provided = provided.trim();
    let mut base = if provided.contains("://") {
        provided.to_string()
    } else {
        match Region::from_name(provided) {
            Some(region) => region.url(),
            None => format!("https://{provided}"),
        }
    };
    if base.ends_with('/') {
        base.pop();
    }
    base
}

/// Base URL to use after a token response reported `region`.
///
/// Only a base URL pointing at a known cloud is switched; custom hosts
/// (proxies, test servers) are left alone.
pub fn autodiscover_region(base_url: &str, region: Option<&str>) -> String {
    let base_url = confirm_base_url(base_url);
    let Some(current) = Region::from_base_url(&base_url) else {
        return base_url;
    };
    match region.and_then(Region::from_name) {
        Some(reported) if reported != current => {
            tracing::info!(from = %current, to = %reported, "switching to autodiscovered region");
            reported.url()
        }
        _ => base_url,
    }
}

fn default_base_url() -> String {
    Region::Us1.name().to_string()
}

fn default_true() -> bool {
    true
}

fn default_renew_window() -> u64 {
    DEFAULT_RENEW_WINDOW
}

fn default_debug_record_count() -> usize {
    MAX_DEBUG_RECORDS
}

/// Settings for a [`FalconClient`](crate::client::FalconClient).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FalconConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Child CID to authenticate as (Flight Control).
    #[serde(default)]
    pub member_cid: Option<String>,
    /// URL or region short name.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_true")]
    pub ssl_verify: bool,
    /// Scheme (`http`, `https`, `all`) → proxy URL.
    #[serde(default)]
    pub proxy: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub timeout: Option<Timeout>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_renew_window")]
    pub renew_window: u64,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_debug_record_count")]
    pub debug_record_count: usize,
    #[serde(default = "default_true")]
    pub sanitize_log: bool,
}

impl Default for FalconConfig {
    fn default() -> Self {
        FalconConfig {
            client_id: None,
            client_secret: None,
            member_cid: None,
            base_url: default_base_url(),
            ssl_verify: true,
            proxy: None,
            timeout: None,
            user_agent: None,
            renew_window: DEFAULT_RENEW_WINDOW,
            debug: false,
            debug_record_count: MAX_DEBUG_RECORDS,
            sanitize_log: true,
        }
    }
}

impl FalconConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        FalconConfig {
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
            ..FalconConfig::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| FalconError::Config {
            message: "invalid configuration".to_string(),
            source: Some(Box::new(e)),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Fills missing credentials from the environment.
    pub fn with_env_fallback(mut self) -> Self {
        if self.client_id.is_none() {
            self.client_id = std::env::var(CLIENT_ID_ENV).ok();
        }
        if self.client_secret.is_none() {
            self.client_secret = std::env::var(CLIENT_SECRET_ENV).ok();
        }
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_member_cid(mut self, member_cid: impl Into<String>) -> Self {
        self.member_cid = Some(member_cid.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn resolved_base_url(&self) -> String {
        confirm_base_url(&self.base_url)
    }

    /// Renew window clamped to 120..=1200 seconds.
    pub fn renew_window(&self) -> u64 {
        self.renew_window.clamp(DEFAULT_RENEW_WINDOW, MAX_RENEW_WINDOW)
    }

    pub fn log_facility(&self) -> LogFacility {
        let log = if self.debug {
            LogFacility::active()
        } else {
            LogFacility::disabled()
        };
        log.with_debug_record_count(self.debug_record_count.min(GLOBAL_API_MAX_RETURN))
            .with_sanitize(self.sanitize_log)
    }
}
