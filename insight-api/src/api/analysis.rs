//! Analysis API Handlers
//!
//! Submission, status polling and result retrieval.

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use insight_core::domain::job::JobRecord;
use insight_core::dto::job::SubmitResponse;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::upload;
use crate::service::{status_service, submission_service};
use crate::state::AppState;

/// POST /api/analyze
/// Accept a zip archive and queue it for analysis
pub async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let upload = upload::store_upload(
        &mut multipart,
        &state.layout.uploads_dir(),
        state.max_upload_bytes,
    )
    .await?;

    tracing::info!(file = %upload.original_file_name, "Received archive for analysis");

    let response = submission_service::submit(&state, upload).await?;

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /api/analysis-status/{id}
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobRecord>> {
    let id = parse_job_id(&id)?;
    tracing::debug!(job_id = %id, "Getting status");

    let record = status_service::get_status(&state, id).await?;
    Ok(Json(record))
}

/// GET /api/results/{id}
/// Returns the analyzer's JSON output unchanged
pub async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = parse_job_id(&id)?;
    tracing::debug!(job_id = %id, "Getting result");

    let result = status_service::get_result(&state, id).await?;
    Ok(Json(result))
}

/// Ids that are not UUIDs cannot name a job
fn parse_job_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::NotFound("Job not found or already processed and cleaned.".to_string()))
}
