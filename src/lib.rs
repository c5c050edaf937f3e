//! Async Rust client library for the CrowdStrike Falcon OAuth2 REST API.
//!
//! Every API call flows through the same pipeline: an operation ID is
//! looked up in the embedded endpoint manifest, caller keywords are
//! partitioned into query, body, form and header values, an
//! [`ApiRequest`](request::ApiRequest) is assembled and validated, and the
//! response is normalised into an [`ApiResult`](result::ApiResult) whatever
//! its shape (standard JSON, token, plain text or binary).
//!
//! # Modules
//!
//! - [`auth`]: OAuth2 client-credentials token provider with renew window.
//! - [`client`]: authenticated client, region routing and 401 retry.
//! - [`config`]: TOML/environment configuration and base-URL resolution.
//! - [`endpoint`]: embedded endpoint manifest and operation lookup.
//! - [`error`]: typed error hierarchy (`FalconError`).
//! - [`log`]: debug-log enablement and sanitisation.
//! - [`pipeline`]: argument partitioning, validation and transport.
//! - [`request`]: the request object graph.
//! - [`result`]: the normalised result model.
//! - [`hosts`], [`alerts`], [`sample_uploads`], [`sensor_download`]:
//!   service collections.
//!
//! # Quick Start
//!
//! ```ignore
//! use falcon_sdk::client::FalconClient;
//! use falcon_sdk::config::FalconConfig;
//! use falcon_sdk::hosts::{query_devices_by_filter, DeviceQuery};
//!
//! let config = FalconConfig::new("client_id", "client_secret").with_base_url("US2");
//! let client = FalconClient::new(config)?;
//! let result = query_devices_by_filter(&client, &DeviceQuery::filter("platform_name:'Linux'")).await?;
//! for aid in result.iter() {
//!     println!("{aid}");
//! }
//! ```

pub mod alerts;
pub mod auth;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod hosts;
pub mod log;
pub mod pipeline;
pub mod request;
pub mod result;
pub mod sample_uploads;
pub mod sensor_download;

pub use client::FalconClient;
pub use config::FalconConfig;
pub use error::{FalconError, Result};
pub use pipeline::ServiceCall;
pub use result::ApiResult;
