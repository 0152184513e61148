//! Analysis endpoints

use insight_core::domain::job::JobRecord;
use insight_core::dto::job::{SubmitResponse, result_url, status_url};
use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::InsightClient;
use crate::error::{ClientError, Result};

impl InsightClient {
    /// Upload a zip archive for analysis
    ///
    /// The archive is sent as the `zipFile` multipart field under its own
    /// file name.
    pub async fn submit_archive(&self, path: impl AsRef<Path>) -> Result<SubmitResponse> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ClientError::ArchiveUnreadable {
                path: path.to_path_buf(),
                source,
            })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archive.zip".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/zip")?;
        let form = Form::new().part("zipFile", part);

        let url = format!("{}/api/analyze", self.base_url);
        let response = self.client.post(&url).multipart(form).send().await?;

        self.handle_response(response).await
    }

    /// Get a job's status record
    pub async fn get_status(&self, id: Uuid) -> Result<JobRecord> {
        let url = format!("{}{}", self.base_url, status_url(id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Get a completed job's analysis result, exactly as the analyzer wrote it
    pub async fn get_result(&self, id: Uuid) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, result_url(id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Poll a job's status until it reaches a terminal status
    pub async fn wait_for_completion(
        &self,
        id: Uuid,
        interval: Duration,
        timeout: Duration,
    ) -> Result<JobRecord> {
        let started = Instant::now();

        loop {
            let record = self.get_status(id).await?;
            if record.status.is_terminal() {
                return Ok(record);
            }

            debug!(job_id = %id, "Job is {}, waiting", record.status);

            if started.elapsed() + interval > timeout {
                return Err(ClientError::Timeout {
                    id,
                    waited: started.elapsed(),
                });
            }

            tokio::time::sleep(interval).await;
        }
    }
}
