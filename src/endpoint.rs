//! Endpoint descriptors and operation lookup.
//!
//! Descriptors are compiled in from `manifest/endpoints.toml` and parsed
//! once on first use. Operations are addressed by their operation ID
//! (`QueryDevicesByFilter`) or by the snake_case method name used in this
//! crate (`query_devices_by_filter`); [`canonical_operation`] maps both to
//! the operation ID.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Deserialize;

use crate::error::{FalconError, Result};
use crate::request::{FieldType, HttpMethod};

const MANIFEST: &str = include_str!("../manifest/endpoints.toml");

/// Operations served from the container-upload host rather than the API
/// host.
pub const CONTAINER_OPERATIONS: &[&str] = &[
    "GetImageAssessmentReport",
    "DeleteImageDetails",
    "ImageMatchesPolicy",
];

/// Operation ID ↔ method name.
const ALIASES: &[(&str, &str)] = &[
    ("oauth2AccessToken", "token"),
    ("oauth2RevokeToken", "revoke"),
    ("QueryDevicesByFilter", "query_devices_by_filter"),
    ("QueryDevicesByFilterScroll", "query_devices_by_filter_scroll"),
    ("GetDeviceDetails", "get_device_details_v1"),
    ("PostDeviceDetailsV2", "get_device_details"),
    ("PerformActionV2", "perform_action"),
    ("GetQueriesAlertsV2", "query_alerts"),
    ("PostEntitiesAlertsV2", "get_alerts"),
    ("PatchEntitiesAlertsV3", "update_alerts"),
    ("UploadSampleV3", "upload_sample"),
    ("GetSampleV3", "get_sample"),
    ("DeleteSampleV3", "delete_sample"),
    ("GetCombinedSensorInstallersByQuery", "get_sensor_installers_by_query"),
    ("DownloadSensorInstallerById", "download_sensor_installer"),
    ("GetImageAssessmentReport", "get_image_assessment_report"),
    ("DeleteImageDetails", "delete_image_details"),
    ("ImageMatchesPolicy", "image_matches_policy"),
];

/// Where a parameter travels in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ParamLocation {
    #[serde(rename = "query")]
    Query,
    #[serde(rename = "body")]
    Body,
    #[serde(rename = "header")]
    Header,
    #[serde(rename = "formData")]
    FormData,
    #[serde(rename = "path")]
    Path,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParamLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "type", default)]
    pub kind: Option<FieldType>,
}

/// One API operation: verb, path template and parameter schema.
#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    pub operation: String,
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
}

impl Endpoint {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn is_container(&self) -> bool {
        CONTAINER_OPERATIONS.contains(&self.operation.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    endpoints: Vec<Endpoint>,
}

static REGISTRY: OnceLock<HashMap<String, Endpoint>> = OnceLock::new();

fn registry() -> &'static HashMap<String, Endpoint> {
    REGISTRY.get_or_init(|| match toml::from_str::<Manifest>(MANIFEST) {
        Ok(manifest) => manifest
            .endpoints
            .into_iter()
            .map(|ep| (ep.operation.clone(), ep))
            .collect(),
        Err(e) => {
            tracing::error!(error = %e, "embedded endpoint manifest failed to parse");
            HashMap::new()
        }
    })
}

/// Resolves an operation ID or method name to the operation ID.
pub fn canonical_operation(name: &str) -> Option<&'static str> {
    ALIASES
        .iter()
        .find(|(op, method)| *op == name || *method == name)
        .map(|(op, _)| *op)
        .or_else(|| registry().get_key_value(name).map(|(k, _)| k.as_str()))
}

/// Snake_case method name for an operation ID.
pub fn method_name(operation: &str) -> Option<&'static str> {
    ALIASES
        .iter()
        .find(|(op, _)| *op == operation)
        .map(|(_, method)| *method)
}

/// Looks up an operation by ID or method name.
pub fn lookup(name: &str) -> Result<&'static Endpoint> {
    canonical_operation(name)
        .and_then(|op| registry().get(op))
        .ok_or_else(|| FalconError::UnknownOperation(name.to_string()))
}

/// Every known endpoint, sorted by operation ID.
pub fn all() -> Vec<&'static Endpoint> {
    let mut endpoints: Vec<_> = registry().values().collect();
    endpoints.sort_by(|a, b| a.operation.cmp(&b.operation));
    endpoints
}
