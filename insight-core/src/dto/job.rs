//! Job DTOs for the HTTP API

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned by `POST /api/analyze` once a job is queued
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub id: Uuid,
    /// Same as `id`, for upload-page clients that read `jobId`
    pub job_id: Uuid,
    pub status_url: String,
    pub message: String,
}

impl SubmitResponse {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            job_id: id,
            status_url: status_url(id),
            message: "Analysis request accepted and queued. Check status endpoint for progress."
                .to_string(),
        }
    }
}

/// Error body returned by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Relative URL clients poll for a job's status
pub fn status_url(id: Uuid) -> String {
    format!("/api/analysis-status/{}", id)
}

/// Relative URL of a job's result
pub fn result_url(id: Uuid) -> String {
    format!("/api/results/{}", id)
}
