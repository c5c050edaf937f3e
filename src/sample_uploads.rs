//! Sample submission for cloud analysis (`/samples/entities/samples/v3`).
//!
//! Uploads are sent as `multipart/form-data`: the file goes in a `sample`
//! part and `file_name`, `comment` and `is_confidential` travel as form
//! fields. Successful uploads return the sample's SHA256 in
//! `resources[0].sha256`, which is the ID used by [`get_sample`] and
//! [`delete_sample`].

use std::path::Path;

use bytes::Bytes;

use crate::client::FalconClient;
use crate::error::{FalconError, Result};
use crate::pipeline::ServiceCall;
use crate::request::FileUpload;
use crate::result::ApiResult;

const SAMPLE_FIELD: &str = "sample";
const SAMPLE_CONTENT_TYPE: &str = "application/octet-stream";

/// Optional metadata attached to an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleOptions {
    pub comment: Option<String>,
    /// Confidential samples are hidden from other customers.
    pub is_confidential: Option<bool>,
}

/// Uploads `content` under `file_name`.
pub async fn upload_sample(
    client: &FalconClient,
    file_name: &str,
    content: impl Into<Bytes>,
    options: &SampleOptions,
) -> Result<ApiResult> {
    client
        .execute("UploadSampleV3", upload_call(file_name, content.into(), options))
        .await
}

/// Reads `path` and uploads it. The file name defaults to the path's final
/// component.
pub async fn upload_sample_file(
    client: &FalconClient,
    path: impl AsRef<Path>,
    file_name: Option<&str>,
    options: &SampleOptions,
) -> Result<ApiResult> {
    let path = path.as_ref();
    let name = match file_name {
        Some(name) => name.to_string(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| FalconError::config(format!("{} has no file name", path.display())))?,
    };
    let content = tokio::fs::read(path).await?;
    upload_sample(client, &name, content, options).await
}

fn upload_call(file_name: &str, content: Bytes, options: &SampleOptions) -> ServiceCall {
    ServiceCall::new()
        .keyword("file_name", file_name)
        .keywords_from([("comment", options.comment.clone())])
        .keywords_from([("is_confidential", options.is_confidential)])
        .file(FileUpload::new(SAMPLE_FIELD, file_name, content, SAMPLE_CONTENT_TYPE))
}

/// Downloads a sample by SHA256. The result is binary; read it with
/// `result.resources().bytes()`. With `password_protected` the file comes
/// back inside a zip protected with the password `infected`.
pub async fn get_sample(
    client: &FalconClient,
    sha256: &str,
    password_protected: Option<bool>,
) -> Result<ApiResult> {
    let call = ServiceCall::new()
        .keyword("ids", sha256)
        .keywords_from([("password_protected", password_protected)]);
    client.execute("GetSampleV3", call).await
}

pub async fn delete_sample(client: &FalconClient, sha256: &str) -> Result<ApiResult> {
    client
        .execute("DeleteSampleV3", ServiceCall::new().keyword("ids", sha256))
        .await
}
