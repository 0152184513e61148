//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use insight_core::domain::job::JobStatus;
use insight_core::dto::job::ErrorResponse;

use crate::api::upload::UploadError;
use crate::service::status::StatusError;
use crate::service::submission::SubmitError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    /// Unknown job; the body carries `status: "not_found"`
    NotFound(String),
    /// Known job, but its result file is gone
    ResultNotFound(String),
    BadRequest(String),
    NotCompleted { message: String, status: JobStatus },
    PayloadTooLarge(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, job_status) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, Some("not_found".to_string())),
            ApiError::ResultNotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::NotCompleted { message, status } => {
                (StatusCode::BAD_REQUEST, message, Some(status.to_string()))
            }
            ApiError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg, None),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg, None)
            }
        };

        let body = ErrorResponse {
            error,
            status: job_status,
        };

        (status, Json(body)).into_response()
    }
}

impl From<StatusError> for ApiError {
    fn from(err: StatusError) -> Self {
        let message = err.to_string();
        match err {
            StatusError::NotFound(_) => {
                ApiError::NotFound("Job not found or already processed and cleaned.".to_string())
            }
            StatusError::NotCompleted { status, .. } => ApiError::NotCompleted { message, status },
            StatusError::ResultMissing { id, path } => {
                tracing::warn!(job_id = %id, "Result file missing: {}", path.display());
                ApiError::ResultNotFound(
                    "Analysis result data or file not found for completed job.".to_string(),
                )
            }
            StatusError::ResultUnreadable { id, source } => {
                tracing::error!(job_id = %id, "Error reading result file: {}", source);
                ApiError::InternalError("Failed to read analysis result file.".to_string())
            }
            StatusError::ResultInvalid { id, source } => {
                tracing::error!(job_id = %id, "Error parsing result JSON: {}", source);
                ApiError::InternalError("Failed to parse result data.".to_string())
            }
        }
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Missing | UploadError::NotZip(_) => ApiError::BadRequest(err.to_string()),
            UploadError::TooLarge { .. } => ApiError::PayloadTooLarge(err.to_string()),
            UploadError::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                ApiError::PayloadTooLarge(e.body_text())
            }
            UploadError::Multipart(e) => ApiError::BadRequest(e.body_text()),
            UploadError::Io { .. } => ApiError::InternalError(err.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
