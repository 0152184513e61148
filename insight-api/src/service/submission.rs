//! Submission Service
//!
//! Turns a stored upload into a queued job: allocates the id, prepares the
//! output directory, writes the status record and the queue descriptor.

use insight_core::domain::job::{JobRecord, JobTask, JobUpdate};
use insight_core::dto::job::SubmitResponse;
use insight_core::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::state::AppState;

/// User id stamped on jobs while there is no authentication
pub const ANONYMOUS_USER: &str = "anonymous";

/// An archive already written to the uploads directory
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub path: PathBuf,
    pub original_file_name: String,
}

/// Service error type
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to record status for job {id}: {source}")]
    Status {
        id: Uuid,
        #[source]
        source: StoreError,
    },

    #[error("Failed to queue job {id}: {source}")]
    Queue {
        id: Uuid,
        #[source]
        source: StoreError,
    },
}

impl SubmitError {
    /// Id of the job the failure belongs to, once one was allocated
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            SubmitError::OutputDir { .. } => None,
            SubmitError::Status { id, .. } | SubmitError::Queue { id, .. } => Some(*id),
        }
    }
}

/// Queue an uploaded archive for analysis
///
/// On success exactly one status record (`queued`) and one queue descriptor
/// exist for the job and agree on the output path. On any failure the upload
/// is deleted; a failed queue write also leaves the record as
/// `failed_to_queue`.
pub async fn submit(state: &AppState, upload: StoredUpload) -> Result<SubmitResponse, SubmitError> {
    // v7 ids sort by creation time, which keeps queue file names in FIFO order
    let id = Uuid::now_v7();

    let results_dir = state.layout.job_results_dir(id);
    if let Err(source) = tokio::fs::create_dir_all(&results_dir).await {
        discard_upload(&upload).await;
        return Err(SubmitError::OutputDir {
            path: results_dir,
            source,
        });
    }
    let output_path = state.layout.output_path(id);

    let record = JobRecord::queued(
        id,
        upload.original_file_name.clone(),
        Some(ANONYMOUS_USER.to_string()),
        output_path.clone(),
    );
    let created_at = record.created_at;

    if let Err(source) = state.status_store.insert(record).await {
        discard_upload(&upload).await;
        return Err(SubmitError::Status { id, source });
    }

    let task = JobTask {
        id,
        archive_path: upload.path.clone(),
        output_path,
        original_file_name: upload.original_file_name.clone(),
        user_id: Some(ANONYMOUS_USER.to_string()),
        created_at,
    };

    if let Err(source) = state.queue.enqueue(&task).await {
        tracing::error!(job_id = %id, "Failed to queue job: {}", source);

        let update = JobUpdate::failed_to_queue(format!("Failed to queue job: {}", source));
        if let Err(e) = state.status_store.update(id, update).await {
            tracing::error!(job_id = %id, "Failed to mark job as failed_to_queue: {}", e);
        }

        discard_upload(&upload).await;
        return Err(SubmitError::Queue { id, source });
    }

    tracing::info!(
        job_id = %id,
        file = %upload.original_file_name,
        "Analysis job queued"
    );

    Ok(SubmitResponse::new(id))
}

/// Best-effort removal of an upload that will never be analyzed
pub async fn discard_upload(upload: &StoredUpload) {
    if let Err(e) = tokio::fs::remove_file(&upload.path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to delete upload {}: {}", upload.path.display(), e);
        }
    }
}
