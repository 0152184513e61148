//! End-to-end job lifecycle: submission through the API services, processing
//! by the worker with a shell script standing in for the Java analyzer.

#![cfg(unix)]

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

use insight_api::AppState;
use insight_api::service::status::{self, StatusError};
use insight_api::service::submission::{self, StoredUpload};
use insight_core::DataLayout;
use insight_core::domain::job::{FailureKind, JobStatus};
use insight_worker::scheduler::{CycleOutcome, JobPoller};
use insight_worker::service::ProcessAnalyzer;

/// Script run as `sh -c <script> analyzer <archive> <output>`
fn script_analyzer(script: &str, timeout: Duration) -> ProcessAnalyzer {
    ProcessAnalyzer::new(
        "sh",
        vec![
            OsString::from("-c"),
            OsString::from(script),
            OsString::from("analyzer"),
        ],
        timeout,
        64 * 1024,
    )
}

struct Harness {
    _dir: TempDir,
    state: AppState,
    layout: DataLayout,
}

impl Harness {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let layout = DataLayout::new(dir.path());
        layout.ensure().await.unwrap();
        let state = AppState::from_layout(layout.clone(), 1024 * 1024);
        Self {
            _dir: dir,
            state,
            layout,
        }
    }

    async fn submit(&self, name: &str) -> (Uuid, StoredUpload) {
        let path = self.layout.uploads_dir().join(format!("{}-1.zip", name));
        std::fs::write(&path, b"PK\x03\x04").unwrap();
        let upload = StoredUpload {
            path,
            original_file_name: format!("{}.zip", name),
        };

        let response = submission::submit(&self.state, upload.clone())
            .await
            .unwrap();
        (response.id, upload)
    }

    fn worker(&self, script: &str) -> JobPoller {
        JobPoller::from_layout(
            &self.layout,
            Duration::from_secs(60),
            Arc::new(script_analyzer(script, Duration::from_secs(10))),
        )
    }
}

#[tokio::test]
async fn test_successful_analysis_is_served() {
    let harness = Harness::new().await;
    let (id, upload) = harness.submit("project").await;

    let record = status::get_status(&harness.state, id).await.unwrap();
    assert_eq!(record.status, JobStatus::Queued);

    let worker = harness.worker(r#"printf '{"classes":[]}' > "$2""#);
    let outcome = worker.process_next().await.unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Finished {
            id,
            status: JobStatus::Completed
        }
    );

    let record = status::get_status(&harness.state, id).await.unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.exit_code, Some(0));

    let result = status::get_result(&harness.state, id).await.unwrap();
    assert_eq!(result, serde_json::json!({"classes": []}));

    // Archive and queue entry are gone; the result stays
    assert!(!upload.path.exists());
    assert!(harness.state.queue.list_pending().await.unwrap().is_empty());
    assert!(harness.layout.output_path(id).exists());
}

#[tokio::test]
async fn test_failing_analysis_reports_stderr() {
    let harness = Harness::new().await;
    let (id, upload) = harness.submit("broken").await;

    let worker = harness.worker("echo boom >&2; exit 1");
    worker.process_next().await.unwrap();

    let record = status::get_status(&harness.state, id).await.unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.error_kind, Some(FailureKind::ExitStatus));
    assert_eq!(record.exit_code, Some(1));
    assert!(!record.error.as_deref().unwrap_or("").is_empty());
    assert!(record.details.as_deref().unwrap_or("").contains("boom"));

    assert!(!upload.path.exists());
    assert!(matches!(
        status::get_result(&harness.state, id).await.unwrap_err(),
        StatusError::NotCompleted {
            status: JobStatus::Failed,
            ..
        }
    ));
}

#[tokio::test]
async fn test_result_while_processing_is_not_completed() {
    let harness = Harness::new().await;
    let (id, _upload) = harness.submit("slow").await;

    // Marker file tells the test the analyzer is running
    let marker = harness.layout.root().join("running");
    let script = format!(
        r#"touch '{}'; sleep 1; printf '{{}}' > "$2""#,
        marker.display()
    );
    let worker = Arc::new(harness.worker(&script));

    let running = {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move { worker.check_queue().await })
    };

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !marker.exists() {
        assert!(tokio::time::Instant::now() < deadline, "analyzer never started");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    match status::get_result(&harness.state, id).await.unwrap_err() {
        StatusError::NotCompleted { status, .. } => assert_eq!(status, JobStatus::Processing),
        other => panic!("unexpected error: {:?}", other),
    }

    assert_eq!(running.await.unwrap(), 1);
    assert_eq!(
        status::get_status(&harness.state, id).await.unwrap().status,
        JobStatus::Completed
    );
}

#[tokio::test]
async fn test_invalid_output_is_a_distinct_error() {
    let harness = Harness::new().await;
    let (id, _upload) = harness.submit("garbled").await;

    let worker = harness.worker(r#"printf '{"classes":' > "$2""#);
    worker.process_next().await.unwrap();

    // Exit 0 with a file present counts as completed; parsing happens on read
    assert_eq!(
        status::get_status(&harness.state, id).await.unwrap().status,
        JobStatus::Completed
    );
    assert!(matches!(
        status::get_result(&harness.state, id).await.unwrap_err(),
        StatusError::ResultInvalid { .. }
    ));
}

#[tokio::test]
async fn test_missing_runtime_fails_job_as_launch_error() {
    let harness = Harness::new().await;
    let (id, upload) = harness.submit("nojava").await;

    let worker = JobPoller::from_layout(
        &harness.layout,
        Duration::from_secs(60),
        Arc::new(ProcessAnalyzer::new(
            "/nonexistent/bin/java",
            vec![OsString::from("-jar"), OsString::from("analyzer.jar")],
            Duration::from_secs(10),
            1024,
        )),
    );
    worker.process_next().await.unwrap();

    let record = status::get_status(&harness.state, id).await.unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.error_kind, Some(FailureKind::Launch));
    assert!(!upload.path.exists());
    assert!(harness.state.queue.list_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_hung_analyzer_times_out() {
    let harness = Harness::new().await;
    let (id, _upload) = harness.submit("hung").await;

    let worker = JobPoller::from_layout(
        &harness.layout,
        Duration::from_secs(60),
        Arc::new(script_analyzer(
            "echo stuck >&2; exec sleep 30",
            Duration::from_millis(300),
        )),
    );
    worker.process_next().await.unwrap();

    let record = status::get_status(&harness.state, id).await.unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.error_kind, Some(FailureKind::Timeout));
    assert!(record.details.as_deref().unwrap_or("").contains("stuck"));
}
