//! Job queue
//!
//! One `<job id>.json` descriptor per pending job in a directory. Job ids are
//! UUIDv7, so sorting file names sorts by submission time (to the
//! millisecond). Descriptors are removed only after the job is finished, so a
//! worker crash leaves the entry behind for reprocessing.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::{StoreError, StoreResult};
use super::with_suffix;
use crate::domain::job::JobTask;

const DESCRIPTOR_EXTENSION: &str = ".json";
const QUARANTINE_SUFFIX: &str = ".error";

#[derive(Debug, Clone)]
pub struct JobQueue {
    dir: PathBuf,
    /// Descriptors claimed by this process and not yet removed or released
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// A descriptor claimed for processing
#[derive(Debug, Clone)]
pub struct ClaimedTask {
    pub file_name: String,
    pub path: PathBuf,
    pub task: JobTask,
}

/// Outcome of [`JobQueue::claim_oldest`]
#[derive(Debug)]
pub enum Claim {
    /// The oldest descriptor parsed and is now in flight
    Ready(ClaimedTask),
    /// The oldest descriptor was malformed and has been renamed aside
    Quarantined { file_name: String, reason: String },
}

impl JobQueue {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Descriptor file name for a job
    pub fn file_name_for(id: Uuid) -> String {
        format!("{}{}", id, DESCRIPTOR_EXTENSION)
    }

    /// Writes the descriptor for a new job
    pub async fn enqueue(&self, task: &JobTask) -> StoreResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?;

        let file_name = Self::file_name_for(task.id);
        let path = self.dir.join(&file_name);
        // Dot-prefixed temp name is never listed as pending
        let temp_path = self.dir.join(format!(".{}.tmp", file_name));

        let json = serde_json::to_vec_pretty(task)?;
        tokio::fs::write(&temp_path, &json)
            .await
            .map_err(|e| StoreError::io(&temp_path, e))?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;

        info!(job_id = %task.id, "Job enqueued: {}", file_name);
        Ok(path)
    }

    /// Pending descriptor file names, oldest first
    ///
    /// A missing queue directory has no pending jobs.
    pub async fn list_pending(&self) -> StoreResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.dir, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_descriptor_name(&name) {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    /// Claims the oldest descriptor not already in flight
    ///
    /// A descriptor that fails to parse is quarantined as `<name>.error` and
    /// reported instead of claimed. It is never retried automatically.
    pub async fn claim_oldest(&self) -> StoreResult<Option<Claim>> {
        let pending = self.list_pending().await?;

        let Some(file_name) = pending.into_iter().find(|name| !self.is_in_flight(name)) else {
            return Ok(None);
        };
        let path = self.dir.join(&file_name);

        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Descriptor {} vanished before it could be read", file_name);
                return Ok(None);
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        match serde_json::from_slice::<JobTask>(&content) {
            Ok(task) => {
                self.in_flight
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .insert(file_name.clone());
                debug!(job_id = %task.id, "Claimed descriptor {}", file_name);
                Ok(Some(Claim::Ready(ClaimedTask {
                    file_name,
                    path,
                    task,
                })))
            }
            Err(e) => {
                let reason = e.to_string();
                self.quarantine(&path).await?;
                Ok(Some(Claim::Quarantined { file_name, reason }))
            }
        }
    }

    /// Deletes a finished job's descriptor
    ///
    /// Returns `false` if it was already gone.
    pub async fn remove(&self, claimed: &ClaimedTask) -> StoreResult<bool> {
        let result = tokio::fs::remove_file(&claimed.path).await;
        self.release(claimed);

        match result {
            Ok(()) => {
                debug!(job_id = %claimed.task.id, "Removed descriptor {}", claimed.file_name);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Descriptor {} was already removed", claimed.file_name);
                Ok(false)
            }
            Err(e) => Err(StoreError::io(&claimed.path, e)),
        }
    }

    /// Gives a claimed descriptor back without deleting it
    pub fn release(&self, claimed: &ClaimedTask) {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&claimed.file_name);
    }

    /// Whether a descriptor for `id` is still pending
    pub async fn contains(&self, id: Uuid) -> bool {
        tokio::fs::try_exists(self.dir.join(Self::file_name_for(id)))
            .await
            .unwrap_or(false)
    }

    /// Reads the pending descriptor for `id`, if any
    pub async fn load(&self, id: Uuid) -> StoreResult<Option<JobTask>> {
        let path = self.dir.join(Self::file_name_for(id));
        match tokio::fs::read(&path).await {
            Ok(content) => Ok(Some(serde_json::from_slice(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    fn is_in_flight(&self, file_name: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(file_name)
    }

    async fn quarantine(&self, path: &Path) -> StoreResult<()> {
        let target = with_suffix(path, QUARANTINE_SUFFIX);
        match tokio::fs::rename(path, &target).await {
            Ok(()) => {
                warn!("Quarantined malformed descriptor as {}", target.display());
                Ok(())
            }
            Err(e) => {
                error!(
                    "Failed to quarantine malformed descriptor {}: {}",
                    path.display(),
                    e
                );
                Err(StoreError::io(path, e))
            }
        }
    }
}

fn is_descriptor_name(name: &str) -> bool {
    name.ends_with(DESCRIPTOR_EXTENSION) && !name.starts_with('.')
}
