//! Status Service
//!
//! Read-only access to job records and completed results.

use insight_core::domain::job::{JobRecord, JobStatus};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::state::AppState;

/// Service error type
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error("Job {id} is not completed. Current status: {status}")]
    NotCompleted { id: Uuid, status: JobStatus },

    #[error("Result file for job {id} not found at {path}")]
    ResultMissing { id: Uuid, path: PathBuf },

    #[error("Failed to read result file for job {id}: {source}")]
    ResultUnreadable {
        id: Uuid,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse result data for job {id}: {source}")]
    ResultInvalid {
        id: Uuid,
        #[source]
        source: serde_json::Error,
    },
}

/// Get the status record for a job
///
/// A job with no record but a pending queue descriptor is reported as
/// `queued`, rebuilt from the descriptor. This only happens when the status
/// file was lost or corrupted after submission.
pub async fn get_status(state: &AppState, id: Uuid) -> Result<JobRecord, StatusError> {
    if let Some(record) = state.status_store.get(id).await {
        return Ok(record);
    }

    if !state.queue.contains(id).await {
        return Err(StatusError::NotFound(id));
    }

    tracing::warn!(job_id = %id, "No status record for queued job, synthesizing one");

    let record = match state.queue.load(id).await {
        Ok(Some(task)) => JobRecord::from_task(&task),
        Ok(None) => return Err(StatusError::NotFound(id)),
        Err(e) => {
            tracing::warn!(job_id = %id, "Queue descriptor unreadable: {}", e);
            JobRecord::queued(id, String::new(), None, state.layout.output_path(id))
        }
    };

    Ok(record)
}

/// Get the parsed result of a completed job
///
/// The analyzer's JSON output is returned as-is.
pub async fn get_result(state: &AppState, id: Uuid) -> Result<serde_json::Value, StatusError> {
    let record = get_status(state, id).await?;

    if record.status != JobStatus::Completed {
        return Err(StatusError::NotCompleted {
            id,
            status: record.status,
        });
    }

    let path = record.result_path.unwrap_or(record.output_path);

    let content = match tokio::fs::read(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StatusError::ResultMissing { id, path });
        }
        Err(source) => return Err(StatusError::ResultUnreadable { id, source }),
    };

    serde_json::from_slice(&content).map_err(|source| StatusError::ResultInvalid { id, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use insight_core::DataLayout;
    use insight_core::domain::job::{JobTask, JobUpdate};
    use tempfile::TempDir;

    async fn setup() -> (TempDir, AppState) {
        let dir = TempDir::new().unwrap();
        let layout = DataLayout::new(dir.path());
        layout.ensure().await.unwrap();
        let state = AppState::from_layout(layout, 1024 * 1024);
        (dir, state)
    }

    async fn insert_queued(state: &AppState) -> JobRecord {
        let id = Uuid::now_v7();
        let record = JobRecord::queued(
            id,
            "project.zip".to_string(),
            None,
            state.layout.output_path(id),
        );
        state.status_store.insert(record.clone()).await.unwrap();
        record
    }

    async fn complete(state: &AppState, record: &JobRecord) {
        state
            .status_store
            .update(record.id, JobUpdate::processing())
            .await
            .unwrap();
        state
            .status_store
            .update(
                record.id,
                JobUpdate::completed(record.output_path.clone(), 0),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let (_dir, state) = setup().await;
        let err = get_status(&state, Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, StatusError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_queued_is_synthesized_from_descriptor() {
        let (_dir, state) = setup().await;
        let id = Uuid::now_v7();
        let task = JobTask {
            id,
            archive_path: state.layout.uploads_dir().join("a.zip"),
            output_path: state.layout.output_path(id),
            original_file_name: "a.zip".to_string(),
            user_id: None,
            created_at: Utc::now(),
        };
        state.queue.enqueue(&task).await.unwrap();

        let record = get_status(&state, id).await.unwrap();
        assert_eq!(record.status, JobStatus::Queued);
        assert_eq!(record.original_file_name, "a.zip");
    }

    #[tokio::test]
    async fn test_result_requires_completion() {
        let (_dir, state) = setup().await;
        let record = insert_queued(&state).await;
        state
            .status_store
            .update(record.id, JobUpdate::processing())
            .await
            .unwrap();

        match get_result(&state, record.id).await.unwrap_err() {
            StatusError::NotCompleted { status, .. } => assert_eq!(status, JobStatus::Processing),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_result_is_returned_verbatim() {
        let (_dir, state) = setup().await;
        let record = insert_queued(&state).await;
        tokio::fs::create_dir_all(record.output_path.parent().unwrap())
            .await
            .unwrap();
        std::fs::write(&record.output_path, r#"{"classes":[],"extra":{"n":1}}"#).unwrap();
        complete(&state, &record).await;

        let value = get_result(&state, record.id).await.unwrap();
        assert_eq!(value, serde_json::json!({"classes": [], "extra": {"n": 1}}));
    }

    #[tokio::test]
    async fn test_missing_and_invalid_results_are_distinct() {
        let (_dir, state) = setup().await;

        let missing = insert_queued(&state).await;
        complete(&state, &missing).await;
        assert!(matches!(
            get_result(&state, missing.id).await.unwrap_err(),
            StatusError::ResultMissing { .. }
        ));

        let invalid = insert_queued(&state).await;
        tokio::fs::create_dir_all(invalid.output_path.parent().unwrap())
            .await
            .unwrap();
        std::fs::write(&invalid.output_path, "{ truncated").unwrap();
        complete(&state, &invalid).await;
        assert!(matches!(
            get_result(&state, invalid.id).await.unwrap_err(),
            StatusError::ResultInvalid { .. }
        ));
    }
}
