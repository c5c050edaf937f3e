//! Alert search, retrieval and triage.
//!
//! - [`query_alerts`]: FQL search returning composite alert IDs.
//! - [`get_alerts`]: alert documents for a list of composite IDs.
//! - [`update_alerts`]: status changes, assignment, tags and comments.
//!
//! Composite IDs have the form `<cid>:<product>:<id>` and contain colons.
//! Pass them unencoded; an already URL-encoded `%3A` is logged as a
//! warning because the API will not match it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::client::FalconClient;
use crate::error::Result;
use crate::hosts::ActionParameter;
use crate::pipeline::ServiceCall;
use crate::request::FieldType;
use crate::result::ApiResult;

/// Search options for [`query_alerts`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertQuery {
    pub filter: Option<String>,
    pub sort: Option<String>,
    /// Free-text search across alert fields.
    pub q: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub include_hidden: Option<bool>,
}

impl AlertQuery {
    pub fn filter(filter: impl Into<String>) -> Self {
        AlertQuery {
            filter: Some(filter.into()),
            ..AlertQuery::default()
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_query(mut self, q: impl Into<String>) -> Self {
        self.q = Some(q.into());
        self
    }

    fn to_call(&self) -> ServiceCall {
        ServiceCall::new().keywords_from([
            ("filter", self.filter.clone().map(Value::from)),
            ("sort", self.sort.clone().map(Value::from)),
            ("q", self.q.clone().map(Value::from)),
            ("limit", self.limit.map(Value::from)),
            ("offset", self.offset.map(Value::from)),
            ("include_hidden", self.include_hidden.map(Value::from)),
        ])
    }
}

/// Triage status values accepted by `update_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    New,
    InProgress,
    Reopened,
    Closed,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::New => "new",
            AlertStatus::InProgress => "in_progress",
            AlertStatus::Reopened => "reopened",
            AlertStatus::Closed => "closed",
        }
    }
}

/// Changes applied by [`update_alerts`].
///
/// `action_parameters` carries the free-form actions (`assign_to_name`,
/// `add_tag`, `append_comment`, `show_in_ui`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertUpdate {
    pub update_status: Option<AlertStatus>,
    pub action_parameters: Vec<ActionParameter>,
}

impl AlertUpdate {
    pub fn status(status: AlertStatus) -> Self {
        AlertUpdate {
            update_status: Some(status),
            action_parameters: Vec::new(),
        }
    }

    pub fn with_action(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.action_parameters.push(ActionParameter::new(name, value));
        self
    }
}

/// A subset of the alert document. Everything else is available through
/// the raw resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub composite_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub severity: Option<u8>,
    #[serde(default)]
    pub severity_name: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_timestamp: Option<String>,
    #[serde(default)]
    pub assigned_to_name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub async fn query_alerts(client: &FalconClient, query: &AlertQuery) -> Result<ApiResult> {
    client.execute("GetQueriesAlertsV2", query.to_call()).await
}

/// Fetches up to 1,000 alerts by composite ID.
pub async fn get_alerts<S: AsRef<str>>(
    client: &FalconClient,
    composite_ids: &[S],
    include_hidden: Option<bool>,
) -> Result<ApiResult> {
    let ids: Vec<&str> = composite_ids.iter().map(AsRef::as_ref).collect();
    let call = ServiceCall::new()
        .keyword("composite_ids", json!(ids))
        .keywords_from([("include_hidden", include_hidden)]);
    client.execute("PostEntitiesAlertsV2", call).await
}

pub async fn update_alerts<S: AsRef<str>>(
    client: &FalconClient,
    composite_ids: &[S],
    update: &AlertUpdate,
) -> Result<ApiResult> {
    client
        .execute("PatchEntitiesAlertsV3", update_call(composite_ids, update))
        .await
}

fn update_call<S: AsRef<str>>(composite_ids: &[S], update: &AlertUpdate) -> ServiceCall {
    let ids: Vec<&str> = composite_ids.iter().map(AsRef::as_ref).collect();
    let mut validator = BTreeMap::new();
    validator.insert("composite_ids".to_string(), FieldType::Array);
    validator.insert("action_parameters".to_string(), FieldType::Array);
    validator.insert("update_status".to_string(), FieldType::String);

    let mut call = ServiceCall::new()
        .keyword("composite_ids", json!(ids))
        .keywords_from([("update_status", update.update_status.map(|s| s.as_str()))])
        .validator(validator, ["composite_ids"]);
    if !update.action_parameters.is_empty() {
        call = call.keyword("action_parameters", json!(update.action_parameters));
    }
    call
}
