//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Job status record
///
/// Persisted in the status store, written by the API at submission and by the
/// worker while the job runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: Uuid,
    pub status: JobStatus,
    pub original_file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub output_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl JobRecord {
    /// Creates a freshly queued record
    pub fn queued(
        id: Uuid,
        original_file_name: String,
        user_id: Option<String>,
        output_path: PathBuf,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Queued,
            original_file_name,
            user_id,
            created_at: now,
            started_at: None,
            finished_at: None,
            updated_at: now,
            output_path,
            result_path: None,
            exit_code: None,
            error: None,
            error_kind: None,
            details: None,
        }
    }

    /// Rebuilds a queued record from the descriptor sitting in the queue
    pub fn from_task(task: &JobTask) -> Self {
        Self {
            created_at: task.created_at,
            ..Self::queued(
                task.id,
                task.original_file_name.clone(),
                task.user_id.clone(),
                task.output_path.clone(),
            )
        }
    }

    /// Applies the set fields of an update and refreshes `updated_at`
    pub fn apply(&mut self, update: JobUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(started_at) = update.started_at {
            self.started_at = Some(started_at);
        }
        if let Some(finished_at) = update.finished_at {
            self.finished_at = Some(finished_at);
        }
        if let Some(result_path) = update.result_path {
            self.result_path = Some(result_path);
        }
        if let Some(exit_code) = update.exit_code {
            self.exit_code = Some(exit_code);
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        if let Some(kind) = update.error_kind {
            self.error_kind = Some(kind);
        }
        if let Some(details) = update.details {
            self.details = Some(details);
        }
        self.updated_at = Utc::now();
    }
}

/// Job lifecycle status
///
/// `Queued → Processing → {Completed | Failed}`, with `FailedToQueue`
/// reachable only while the submission is still writing the queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    FailedToQueue,
}

impl JobStatus {
    /// Whether no further transitions can happen
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::FailedToQueue
        )
    }

    /// Check if transition from this status to target is valid
    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        match (self, target) {
            (JobStatus::Queued, JobStatus::Processing) => true,
            (JobStatus::Queued, JobStatus::FailedToQueue) => true,

            // Re-claimed after the worker died mid-job
            (JobStatus::Processing, JobStatus::Processing) => true,
            (JobStatus::Processing, JobStatus::Completed) => true,
            (JobStatus::Processing, JobStatus::Failed) => true,

            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::FailedToQueue => "failed_to_queue",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a job ended up failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The queue entry could not be written at submission
    QueueWrite,
    /// The analyzer process could not be started (critical)
    Launch,
    /// The analyzer exited non-zero or was killed by a signal
    ExitStatus,
    /// The analyzer exited 0 without writing its output file
    MissingOutput,
    /// The analyzer exceeded the job timeout and was killed
    Timeout,
    /// The worker hit an error of its own while driving the job
    Internal,
}

/// Job task descriptor
///
/// One file per queued job. Carries what the worker needs to run the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTask {
    pub id: Uuid,
    pub archive_path: PathBuf,
    pub output_path: PathBuf,
    pub original_file_name: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Partial update merged over a stored record
///
/// Unset fields leave the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result_path: Option<PathBuf>,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    pub error_kind: Option<FailureKind>,
    pub details: Option<String>,
}

impl JobUpdate {
    /// Worker picked the job up
    pub fn processing() -> Self {
        Self {
            status: Some(JobStatus::Processing),
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Analyzer succeeded and its output is at `result_path`
    pub fn completed(result_path: PathBuf, exit_code: i32) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            finished_at: Some(Utc::now()),
            result_path: Some(result_path),
            exit_code: Some(exit_code),
            ..Default::default()
        }
    }

    /// Job failed for the given reason
    pub fn failed(kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            finished_at: Some(Utc::now()),
            error: Some(error.into()),
            error_kind: Some(kind),
            ..Default::default()
        }
    }

    /// Submission could not write the queue entry
    pub fn failed_to_queue(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::FailedToQueue),
            finished_at: Some(Utc::now()),
            error: Some(error.into()),
            error_kind: Some(FailureKind::QueueWrite),
            ..Default::default()
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_exit_code(mut self, exit_code: Option<i32>) -> Self {
        self.exit_code = exit_code;
        self
    }
}
