//! Job endpoints: start, status and download for imports and exports.

use std::future::Future;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use super::types::{BatchJob, JobKind};
use crate::error::{Error, Result};
use crate::remote::{ApiClient, Entity};

/// Anything that can report the current state of a job.
///
/// Implemented over HTTP by [`JobEndpoint`]; tests substitute scripted
/// sources.
pub trait JobStatusSource: Send + Sync {
    /// Fetch the job's current state.
    fn status(&self, job_id: &str) -> impl Future<Output = Result<BatchJob>> + Send;
}

/// Status endpoint for one job family.
#[derive(Debug, Clone)]
pub struct JobEndpoint {
    client: ApiClient,
    kind: JobKind,
}

impl JobEndpoint {
    #[must_use]
    pub const fn new(client: ApiClient, kind: JobKind) -> Self {
        Self { client, kind }
    }

    #[must_use]
    pub const fn kind(&self) -> JobKind {
        self.kind
    }
}

impl JobStatusSource for JobEndpoint {
    fn status(&self, job_id: &str) -> impl Future<Output = Result<BatchJob>> + Send {
        let path = format!("{}/{job_id}/", self.kind.collection());
        async move { self.client.get_json(&path).await }
    }
}

/// Parameters of an export job.
#[derive(Debug, Clone, Serialize)]
pub struct ExportRequest {
    pub entity: String,
    pub format: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub filters: Map<String, Value>,
}

impl ExportRequest {
    #[must_use]
    pub fn new(entity: Entity, format: &str) -> Self {
        Self {
            entity: entity.as_str().to_string(),
            format: format.to_string(),
            filters: Map::new(),
        }
    }

    /// Add a filter. Later values for the same key replace earlier ones.
    #[must_use]
    pub fn filter(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.filters.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(alias = "file_id", alias = "upload_id")]
    id: Value,
}

impl ApiClient {
    /// Start an export job.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the job.
    pub async fn start_export(&self, request: &ExportRequest) -> Result<BatchJob> {
        let job: BatchJob = self.post_json("exports/", request).await?;
        info!(job_id = %job.id, entity = %request.entity, "Export started");
        Ok(job)
    }

    /// Current state of an export job.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_export_status(&self, job_id: &str) -> Result<BatchJob> {
        self.get_json(&format!("exports/{job_id}/")).await
    }

    /// Download the file produced by a finished export.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn download_export_file(&self, job_id: &str) -> Result<Vec<u8>> {
        self.download(&format!("exports/{job_id}/download/")).await
    }

    /// Upload a file to import. Returns the upload id the backend assigned.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, the upload fails, or the
    /// response carries no id.
    pub async fn upload_import_file(&self, file: &Path, entity: Entity) -> Result<String> {
        let response: UploadResponse = self
            .upload_file("imports/upload/", file, &[("entity", entity.as_str().to_string())])
            .await?;

        match response.id {
            Value::String(s) if !s.is_empty() => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(Error::Api {
                status: 200,
                message: format!("Upload response carries no usable id: {other}"),
            }),
        }
    }

    /// Start importing a previously uploaded file.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the job.
    pub async fn start_import(&self, file_id: &str, entity: Entity) -> Result<BatchJob> {
        let body = serde_json::json!({ "file_id": file_id, "entity": entity.as_str() });
        let job: BatchJob = self.post_json("imports/", &body).await?;
        info!(job_id = %job.id, %entity, "Import started");
        Ok(job)
    }

    /// Current state of an import job.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_import_status(&self, job_id: &str) -> Result<BatchJob> {
        self.get_json(&format!("imports/{job_id}/")).await
    }

    /// Status source for one job family, for use with a poller.
    #[must_use]
    pub fn job_endpoint(&self, kind: JobKind) -> JobEndpoint {
        JobEndpoint::new(self.clone(), kind)
    }
}
