//! Job poller
//!
//! Checks the queue on a fixed interval and drains it one job at a time.
//! Each job goes `queued → processing → completed | failed`; the queue entry
//! is deleted only after the final status is written, so a crash in between
//! leaves the job to be picked up again.

use anyhow::{Context, Result};
use insight_core::DataLayout;
use insight_core::domain::job::{FailureKind, JobRecord, JobStatus, JobTask, JobUpdate};
use insight_core::store::{Claim, JobQueue, StatusStore};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::service::{Analyzer, AnalyzerError, AnalyzerOutcome};

/// Stored in `details` when the analyzer printed nothing to stderr
pub const NO_DIAGNOSTICS: &str = "(no diagnostic output)";

/// What a single cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing pending
    Idle,
    /// The oldest entry was malformed and renamed aside
    Quarantined(String),
    /// The job had already finished; its stale entry was dropped
    Discarded(Uuid),
    /// The analyzer ran and the job reached a terminal status
    Finished { id: Uuid, status: JobStatus },
}

/// Job poller that drains the queue on a timer
pub struct JobPoller {
    poll_interval: Duration,
    status_store: StatusStore,
    queue: JobQueue,
    analyzer: Arc<dyn Analyzer>,
    busy: AtomicBool,
}

impl JobPoller {
    /// Creates a new job poller
    pub fn new(config: &Config, analyzer: Arc<dyn Analyzer>) -> Self {
        Self::from_layout(&config.layout(), config.poll_interval, analyzer)
    }

    /// Poller over the standard paths of `layout`
    pub fn from_layout(
        layout: &DataLayout,
        poll_interval: Duration,
        analyzer: Arc<dyn Analyzer>,
    ) -> Self {
        Self {
            poll_interval,
            status_store: StatusStore::new(layout.status_file()),
            queue: JobQueue::new(layout.queue_dir()),
            analyzer,
            busy: AtomicBool::new(false),
        }
    }

    /// Starts the polling loop
    ///
    /// Every tick spawns a queue check so a long analyzer run never delays
    /// the timer; checks that overlap a running one return immediately.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        info!("Starting job poller (interval: {:?})", self.poll_interval);

        let mut interval = time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let poller = Arc::clone(&self);
            tokio::spawn(async move {
                let processed = poller.check_queue().await;
                if processed > 0 {
                    info!("Processed {} job(s) this cycle", processed);
                }
            });
        }
    }

    /// Drains the queue, returning how many entries were handled
    ///
    /// Returns 0 without touching the queue if another check is running.
    pub async fn check_queue(&self) -> usize {
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            debug!("Previous queue check still running, skipping");
            return 0;
        };

        let mut handled = 0;

        loop {
            match self.process_next().await {
                Ok(CycleOutcome::Idle) => break,
                Ok(_) => handled += 1,
                Err(e) => {
                    error!("Error during poll cycle: {:#}", e);
                    break;
                }
            }

            match self.queue.list_pending().await {
                Ok(pending) if !pending.is_empty() => {
                    debug!("{} job(s) still pending, continuing", pending.len());
                }
                Ok(_) => break,
                Err(e) => {
                    error!("Failed to list pending jobs: {}", e);
                    break;
                }
            }
        }

        handled
    }

    /// Claims and runs the oldest pending job
    pub async fn process_next(&self) -> Result<CycleOutcome> {
        let claimed = match self
            .queue
            .claim_oldest()
            .await
            .context("Failed to read the job queue")?
        {
            None => {
                debug!("No jobs available");
                return Ok(CycleOutcome::Idle);
            }
            Some(Claim::Quarantined { file_name, reason }) => {
                error!("Malformed queue entry {} quarantined: {}", file_name, reason);
                return Ok(CycleOutcome::Quarantined(file_name));
            }
            Some(Claim::Ready(claimed)) => claimed,
        };

        let id = claimed.task.id;
        let result = self.run_job(&claimed.task).await;

        if let Err(e) = &result {
            error!(job_id = %id, "Job is in an ambiguous state: {:#}", e);
            self.mark_internal_failure(id, e).await;
        }

        // The entry goes whether or not the job made it to a terminal status
        let removed = self
            .queue
            .remove(&claimed)
            .await
            .with_context(|| format!("Failed to remove queue entry {}", claimed.file_name));

        let outcome = result?;
        removed?;
        Ok(outcome)
    }

    async fn run_job(&self, task: &JobTask) -> Result<CycleOutcome> {
        let id = task.id;

        match self.status_store.get(id).await {
            Some(record) if record.status.is_terminal() => {
                info!(
                    job_id = %id,
                    "Job already {}, discarding stale queue entry",
                    record.status
                );
                delete_archive(id, &task.archive_path).await;
                return Ok(CycleOutcome::Discarded(id));
            }
            Some(_) => {}
            None => {
                warn!(job_id = %id, "No status record for queued job, recreating it");
                self.status_store
                    .insert(JobRecord::from_task(task))
                    .await
                    .context("Failed to recreate status record")?;
            }
        }

        self.status_store
            .update(id, JobUpdate::processing())
            .await
            .context("Failed to mark job as processing")?;

        info!(
            job_id = %id,
            file = %task.original_file_name,
            "Starting analysis"
        );

        let update = match self
            .analyzer
            .analyze(id, &task.archive_path, &task.output_path)
            .await
        {
            Ok(outcome) => {
                let output_exists = tokio::fs::metadata(&task.output_path)
                    .await
                    .is_ok_and(|m| m.is_file());
                outcome_update(task, &outcome, output_exists)
            }
            Err(e @ AnalyzerError::Spawn { .. }) => {
                error!(job_id = %id, "CRITICAL: {}", e);
                JobUpdate::failed(FailureKind::Launch, e.to_string())
            }
            // Started, but the worker lost track of the process
            Err(e @ AnalyzerError::Wait(_)) => {
                error!(job_id = %id, "Analyzer run aborted: {}", e);
                JobUpdate::failed(FailureKind::Internal, e.to_string())
            }
        };

        delete_archive(id, &task.archive_path).await;

        let record = self
            .status_store
            .update(id, update)
            .await
            .context("Failed to record job outcome")?;

        match record.status {
            JobStatus::Completed => info!(
                job_id = %id,
                "Analysis successful. Output at: {}",
                task.output_path.display()
            ),
            status => warn!(
                job_id = %id,
                "Analysis {}: {}",
                status,
                record.error.as_deref().unwrap_or("")
            ),
        }

        Ok(CycleOutcome::Finished {
            id,
            status: record.status,
        })
    }

    /// Best-effort attempt to move a job stuck mid-flight to `failed`
    async fn mark_internal_failure(&self, id: Uuid, err: &anyhow::Error) {
        let Some(record) = self.status_store.get(id).await else {
            return;
        };
        if record.status.is_terminal() {
            return;
        }

        let update = JobUpdate::failed(FailureKind::Internal, format!("Worker error: {:#}", err));
        if let Err(e) = self.status_store.update(id, update).await {
            error!(job_id = %id, "Failed to record worker error: {}", e);
        }
    }
}

/// Maps a finished analyzer run to the terminal status update
pub fn outcome_update(task: &JobTask, outcome: &AnalyzerOutcome, output_exists: bool) -> JobUpdate {
    if outcome.timed_out {
        return JobUpdate::failed(
            FailureKind::Timeout,
            format!(
                "Analyzer timed out after {}s and was killed",
                outcome.elapsed.as_secs()
            ),
        )
        .with_details(diagnostics(outcome));
    }

    if outcome.success {
        if output_exists {
            return JobUpdate::completed(task.output_path.clone(), outcome.exit_code.unwrap_or(0));
        }

        return JobUpdate::failed(
            FailureKind::MissingOutput,
            format!(
                "Analysis completed (exit code 0) but output file not found: {}",
                task.output_path.display()
            ),
        )
        .with_exit_code(outcome.exit_code)
        .with_details(diagnostics(outcome));
    }

    let error = match outcome.exit_code {
        Some(code) => match exit_code_meaning(code) {
            Some(meaning) => format!("Analyzer exited with code {} ({})", code, meaning),
            None => format!("Analyzer exited with code {}", code),
        },
        None => "Analyzer was terminated by a signal".to_string(),
    };

    JobUpdate::failed(FailureKind::ExitStatus, error)
        .with_exit_code(outcome.exit_code)
        .with_details(diagnostics(outcome))
}

/// Exit codes the analyzer documents
fn exit_code_meaning(code: i32) -> Option<&'static str> {
    match code {
        1 => Some("invalid arguments"),
        2 => Some("I/O error"),
        3 => Some("critical analyzer error"),
        _ => None,
    }
}

fn diagnostics(outcome: &AnalyzerOutcome) -> String {
    let stderr = outcome.stderr.text.trim();
    let mut details = if stderr.is_empty() {
        NO_DIAGNOSTICS.to_string()
    } else {
        stderr.to_string()
    };

    if outcome.stderr.truncated {
        details.push_str("\n[output truncated]");
    }

    details
}

async fn delete_archive(id: Uuid, path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(job_id = %id, "Deleted uploaded archive {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            job_id = %id,
            "Failed to delete uploaded archive {}: {}",
            path.display(),
            e
        ),
    }
}

/// Clears the busy flag when a check ends, however it ends
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
