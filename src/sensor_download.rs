//! Falcon sensor installer catalogue and downloads.
//!
//! Installers are identified by their SHA256. [`download_sensor_installer`]
//! returns the binary in the result; [`save_sensor_installer`] writes it to
//! disk and returns a small confirmation result instead.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::FalconClient;
use crate::error::{FalconError, Result};
use crate::pipeline::ServiceCall;
use crate::result::ApiResult;

/// FQL search for installers, e.g. `platform:"windows"+os:"Windows"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallerQuery {
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl InstallerQuery {
    pub fn filter(filter: impl Into<String>) -> Self {
        InstallerQuery {
            filter: Some(filter.into()),
            ..InstallerQuery::default()
        }
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    fn to_call(&self) -> ServiceCall {
        ServiceCall::new().keywords_from([
            ("filter", self.filter.clone().map(Value::from)),
            ("sort", self.sort.clone().map(Value::from)),
            ("limit", self.limit.map(Value::from)),
            ("offset", self.offset.map(Value::from)),
        ])
    }
}

/// An installer entry from the combined query endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorInstaller {
    pub sha256: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub os_version: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub release_date: Option<String>,
}

/// Installer metadata matching `query`.
pub async fn get_sensor_installers_by_query(
    client: &FalconClient,
    query: &InstallerQuery,
) -> Result<ApiResult> {
    client
        .execute("GetCombinedSensorInstallersByQuery", query.to_call())
        .await
}

/// Downloads the installer with the given SHA256 as a binary result.
pub async fn download_sensor_installer(client: &FalconClient, sha256: &str) -> Result<ApiResult> {
    client
        .execute("DownloadSensorInstallerById", ServiceCall::new().keyword("id", sha256))
        .await
}

/// Downloads an installer into `directory`, creating it if needed.
///
/// On success the file is written to `directory/file_name` and a 200
/// result with the message `Download successful` is returned. API errors
/// come back unchanged and nothing is written. `file_name` must be a bare
/// file name; anything with a directory part is a configuration error and
/// no request is made.
pub async fn save_sensor_installer(
    client: &FalconClient,
    sha256: &str,
    directory: impl AsRef<Path>,
    file_name: &str,
) -> Result<ApiResult> {
    let target = installer_path(directory.as_ref(), file_name)?;
    let result = download_sensor_installer(client, sha256).await?;
    let Some(content) = result.resources().bytes().filter(|_| result.is_success()) else {
        return Ok(result);
    };
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, content).await?;
    tracing::debug!(path = %target.display(), bytes = content.len(), "sensor installer saved");
    Ok(ApiResult::ok_message(200, "Download successful"))
}

fn installer_path(directory: &Path, file_name: &str) -> Result<PathBuf> {
    let mut components = Path::new(file_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => Ok(directory.join(name)),
        _ => Err(FalconError::config(format!(
            "installer file name '{file_name}' must not contain a directory"
        ))),
    }
}
