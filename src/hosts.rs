//! Host lookup and containment for the Falcon API.
//!
//! This module covers the "Hosts" service collection:
//!
//! - [`query_devices_by_filter`] and [`query_devices_by_filter_scroll`]:
//!   FQL search returning agent IDs (AIDs).
//! - [`get_device_details`]: full host records for a list of AIDs.
//! - [`perform_action`]: contain, lift containment, hide or unhide hosts.
//!
//! Every call returns the normalised [`ApiResult`]; [`Device`] is a typed
//! view for callers that want one (`result.deserialize_resources::<Device>()`).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::FalconClient;
use crate::error::Result;
use crate::pipeline::ServiceCall;
use crate::request::FieldType;
use crate::result::ApiResult;

// ── Request types ──────────────────────────────────────────────────────

/// FQL search options shared by the query endpoints.
///
/// `offset` is a record number for [`query_devices_by_filter`] and an
/// opaque scroll token for [`query_devices_by_filter_scroll`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceQuery {
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<String>,
}

impl DeviceQuery {
    pub fn filter(filter: impl Into<String>) -> Self {
        DeviceQuery {
            filter: Some(filter.into()),
            ..DeviceQuery::default()
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: impl Into<String>) -> Self {
        self.offset = Some(offset.into());
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    fn to_call(&self) -> ServiceCall {
        ServiceCall::new().keywords_from([
            ("filter", self.filter.clone().map(serde_json::Value::from)),
            ("sort", self.sort.clone().map(serde_json::Value::from)),
            ("limit", self.limit.map(serde_json::Value::from)),
            ("offset", self.offset.clone().map(serde_json::Value::from)),
        ])
    }
}

/// Host actions accepted by `PerformActionV2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    Contain,
    LiftContainment,
    HideHost,
    UnhideHost,
    DetectionSuppress,
    DetectionUnsuppress,
}

impl HostAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostAction::Contain => "contain",
            HostAction::LiftContainment => "lift_containment",
            HostAction::HideHost => "hide_host",
            HostAction::UnhideHost => "unhide_host",
            HostAction::DetectionSuppress => "detection_suppress",
            HostAction::DetectionUnsuppress => "detection_unsuppress",
        }
    }
}

impl fmt::Display for HostAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `{name, value}` pair passed alongside an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionParameter {
    pub name: String,
    pub value: String,
}

impl ActionParameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        ActionParameter {
            name: name.into(),
            value: value.into(),
        }
    }
}

// ── Response types ─────────────────────────────────────────────────────

/// A host as returned by the device details endpoints. Only commonly used
/// fields are modelled; the rest stay in the raw resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub platform_name: Option<String>,
    #[serde(default)]
    pub os_version: Option<String>,
    #[serde(default)]
    pub agent_version: Option<String>,
    #[serde(default)]
    pub local_ip: Option<String>,
    #[serde(default)]
    pub external_ip: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
    /// `normal`, `containment_pending`, `contained` or `lift_containment_pending`.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub first_seen: Option<String>,
    #[serde(default)]
    pub last_seen: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

// ── API functions ──────────────────────────────────────────────────────

/// Searches for hosts and returns their AIDs. Offset paging, up to 10,000
/// records.
pub async fn query_devices_by_filter(client: &FalconClient, query: &DeviceQuery) -> Result<ApiResult> {
    client.execute("QueryDevicesByFilter", query.to_call()).await
}

/// Searches for hosts with scroll paging; pass the previous result's
/// `offset()` token to continue.
pub async fn query_devices_by_filter_scroll(
    client: &FalconClient,
    query: &DeviceQuery,
) -> Result<ApiResult> {
    client.execute("QueryDevicesByFilterScroll", query.to_call()).await
}

/// Full host records for up to 5,000 AIDs, sent in the request body.
pub async fn get_device_details<S: AsRef<str>>(client: &FalconClient, ids: &[S]) -> Result<ApiResult> {
    let ids: Vec<&str> = ids.iter().map(AsRef::as_ref).collect();
    client
        .execute("PostDeviceDetailsV2", ServiceCall::new().body(json!({ "ids": ids })))
        .await
}

/// Host records through the older GET endpoint (IDs in the URL).
pub async fn get_device_details_v1<S: AsRef<str>>(client: &FalconClient, ids: &[S]) -> Result<ApiResult> {
    client
        .execute("GetDeviceDetails", ServiceCall::new().ids(ids.iter().map(AsRef::as_ref)))
        .await
}

/// Applies `action` to the given hosts.
///
/// The body must carry an `ids` list; a body that does not is rejected
/// locally with a 400 result and nothing is sent.
pub async fn perform_action<S: AsRef<str>>(
    client: &FalconClient,
    action: HostAction,
    ids: &[S],
    action_parameters: &[ActionParameter],
) -> Result<ApiResult> {
    let ids: Vec<&str> = ids.iter().map(AsRef::as_ref).collect();
    let mut body = json!({ "ids": ids });
    if !action_parameters.is_empty() {
        body["action_parameters"] = json!(action_parameters);
    }
    client
        .execute("PerformActionV2", perform_action_call(action, body))
        .await
}

pub(crate) fn perform_action_call(action: HostAction, body: serde_json::Value) -> ServiceCall {
    let mut validator = BTreeMap::new();
    validator.insert("ids".to_string(), FieldType::Array);
    validator.insert("action_parameters".to_string(), FieldType::Array);
    ServiceCall::new()
        .keyword("action_name", action.as_str())
        .body(body)
        .validator(validator, ["ids"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::lookup;
    use crate::log::LogFacility;
    use crate::pipeline::prepare;

    #[test]
    fn host_actions_render_api_names() {
        assert_eq!(HostAction::Contain.as_str(), "contain");
        assert_eq!(HostAction::LiftContainment.to_string(), "lift_containment");
    }

    #[test]
    fn device_query_skips_unset_fields() {
        let ep = lookup("QueryDevicesByFilter").unwrap();
        let call = DeviceQuery::filter("platform_name:'Windows'").with_limit(50).to_call();
        let prepared = prepare(ep, call, &LogFacility::disabled()).unwrap();
        let params = prepared.init.params.unwrap();
        assert_eq!(params["filter"], "platform_name:'Windows'");
        assert_eq!(params["limit"], 50);
        assert!(!params.contains_key("offset"));
        assert!(!params.contains_key("sort"));
    }

    #[test]
    fn perform_action_carries_validator() {
        let ep = lookup("PerformActionV2").unwrap();
        let call = perform_action_call(HostAction::Contain, json!({"ids": ["aid"]}));
        let prepared = prepare(ep, call, &LogFacility::disabled()).unwrap();
        assert_eq!(prepared.init.body_required, Some(vec!["ids".to_string()]));
        assert_eq!(prepared.init.params.unwrap()["action_name"], "contain");
    }

    #[test]
    fn device_deserializes_with_missing_fields() {
        let device: Device = serde_json::from_value(json!({
            "device_id": "abc123",
            "hostname": "WS-01",
            "tags": ["FalconGroupingTags/prod"],
            "unmodelled": {"nested": true}
        }))
        .unwrap();
        assert_eq!(device.device_id, "abc123");
        assert_eq!(device.hostname.as_deref(), Some("WS-01"));
        assert!(device.platform_name.is_none());
        assert_eq!(device.tags.len(), 1);
    }
}
