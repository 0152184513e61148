//! Status store
//!
//! A single JSON file mapping job id to [`JobRecord`]. Every operation is a
//! whole-file read or write; updating one record reads the map, merges the
//! change into the entry and writes the map back.
//!
//! Writers inside one process are serialized, so two concurrent submissions
//! cannot drop each other's records. Separate processes (API and worker) still
//! race on the read-modify-write; the system assumes one API instance and one
//! worker.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::{StoreError, StoreResult};
use super::with_suffix;
use crate::domain::job::{JobRecord, JobUpdate};

/// The persisted mapping
pub type StatusMap = BTreeMap<Uuid, JobRecord>;

#[derive(Debug, Clone)]
pub struct StatusStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl StatusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole map
    ///
    /// Never fails: a missing or empty file is an empty map, and an unreadable
    /// or corrupt file is logged and treated as empty. Corrupt content is
    /// copied aside to `<file>.corrupt` first.
    pub async fn read_all(&self) -> StatusMap {
        match self.load().await {
            Ok(map) => map,
            Err(e) => {
                error!("Failed to read status file, treating it as empty: {}", e);
                StatusMap::new()
            }
        }
    }

    /// Reads the map for a read-modify-write
    ///
    /// Content that does not decode is preserved and yields an empty map, so
    /// the next write replaces it. Any other I/O error is returned: writing
    /// over a file that could not be read would drop every other record.
    async fn load(&self) -> StoreResult<StatusMap> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StatusMap::new()),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        if content.trim_ascii().is_empty() {
            return Ok(StatusMap::new());
        }

        match serde_json::from_slice(&content) {
            Ok(map) => Ok(map),
            Err(e) => {
                error!(
                    "Status file {} is corrupt, treating it as empty: {}",
                    self.path.display(),
                    e
                );
                self.preserve_corrupt().await;
                Ok(StatusMap::new())
            }
        }
    }

    /// Replaces the whole map
    ///
    /// Written to a temporary sibling and renamed over the live file so a
    /// concurrent reader never sees a half-written file.
    pub async fn write_all(&self, map: &StatusMap) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(map)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StoreError::io(parent, e))?;
            }
        }

        let temp_path = with_suffix(&self.path, &format!(".{}.tmp", std::process::id()));
        tokio::fs::write(&temp_path, &json)
            .await
            .map_err(|e| StoreError::io(&temp_path, e))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;

        Ok(())
    }

    /// Get a single record
    pub async fn get(&self, id: Uuid) -> Option<JobRecord> {
        self.read_all().await.remove(&id)
    }

    /// Insert (or replace) a record
    pub async fn insert(&self, record: JobRecord) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut map = self.load().await?;
        let id = record.id;
        let status = record.status;
        map.insert(id, record);
        self.write_all(&map).await?;

        info!(job_id = %id, "Status record written: {}", status);
        Ok(())
    }

    /// Merge `update` into the record for `id`
    ///
    /// A missing record is not an error: it may not be visible yet or may have
    /// been cleaned up externally. It is re-initialized as a minimal record and
    /// the update applied on top. Status changes on existing records must follow
    /// [`JobStatus::can_transition_to`](crate::domain::job::JobStatus::can_transition_to).
    pub async fn update(&self, id: Uuid, update: JobUpdate) -> StoreResult<JobRecord> {
        let _guard = self.write_lock.lock().await;

        let mut map = self.load().await?;

        match map.get(&id) {
            Some(existing) => {
                if let Some(target) = update.status {
                    if !existing.status.can_transition_to(target) {
                        return Err(StoreError::InvalidTransition {
                            id,
                            from: existing.status,
                            to: target,
                        });
                    }
                }
            }
            None => warn!(job_id = %id, "No status record to update, re-initializing it"),
        }

        let record = map.entry(id).or_insert_with(|| minimal_record(id));
        record.apply(update);
        let updated = record.clone();

        self.write_all(&map).await?;

        debug!(job_id = %id, "Status updated: {}", updated.status);
        Ok(updated)
    }

    async fn preserve_corrupt(&self) {
        let backup = with_suffix(&self.path, ".corrupt");
        match tokio::fs::copy(&self.path, &backup).await {
            Ok(_) => warn!("Corrupt status file copied to {}", backup.display()),
            Err(e) => warn!(
                "Failed to copy corrupt status file to {}: {}",
                backup.display(),
                e
            ),
        }
    }
}

fn minimal_record(id: Uuid) -> JobRecord {
    JobRecord::queued(id, String::new(), None, PathBuf::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::{FailureKind, JobStatus};
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> StatusStore {
        StatusStore::new(dir.path().join("job_statuses.json"))
    }

    fn record(name: &str) -> JobRecord {
        JobRecord::queued(
            Uuid::now_v7(),
            name.to_string(),
            Some("anonymous".to_string()),
            PathBuf::from(format!("/tmp/results/{}/analysis_output.json", name)),
        )
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(store.read_all().await.is_empty());
        assert!(store.get(Uuid::now_v7()).await.is_none());
    }

    #[tokio::test]
    async fn test_empty_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "  \n").unwrap();

        assert!(store.read_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_empty_and_preserved() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{ not json").unwrap();

        assert!(store.read_all().await.is_empty());

        let backup = dir.path().join("job_statuses.json.corrupt");
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn test_non_utf8_file_is_preserved_before_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let garbage = b"{\"x\": \"\xff\xfe\"}".to_vec();
        std::fs::write(store.path(), &garbage).unwrap();

        assert!(store.read_all().await.is_empty());
        store.insert(record("fresh")).await.unwrap();

        let backup = dir.path().join("job_statuses.json.corrupt");
        assert_eq!(std::fs::read(backup).unwrap(), garbage);
        assert_eq!(store.read_all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_file_aborts_writes() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        // Reading a directory fails with something other than NotFound
        std::fs::create_dir(store.path()).unwrap();

        assert!(store.read_all().await.is_empty());

        let err = store.insert(record("lost")).await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));

        let err = store
            .update(Uuid::now_v7(), JobUpdate::processing())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(store.path().is_dir());
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut map = StatusMap::new();
        for name in ["a", "b", "c"] {
            let r = record(name);
            map.insert(r.id, r);
        }

        store.write_all(&map).await.unwrap();
        assert_eq!(store.read_all().await, map);

        // No temp file left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let r = record("merge");
        let id = r.id;
        let created_at = r.created_at;
        store.insert(r).await.unwrap();

        let updated = store.update(id, JobUpdate::processing()).await.unwrap();
        assert_eq!(updated.status, JobStatus::Processing);
        assert!(updated.updated_at >= created_at);

        let stored = store.get(id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Processing);
        assert_eq!(stored.original_file_name, "merge");
        assert!(stored.started_at.is_some());
    }

    #[tokio::test]
    async fn test_update_missing_record_reinitializes() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let id = Uuid::now_v7();

        let updated = store
            .update(
                id,
                JobUpdate::failed(FailureKind::Internal, "lost track of job"),
            )
            .await
            .unwrap();

        assert_eq!(updated.id, id);
        assert_eq!(updated.status, JobStatus::Failed);
        assert!(store.get(id).await.is_some());
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_transition() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let r = record("skip");
        let id = r.id;
        store.insert(r).await.unwrap();

        let err = store
            .update(id, JobUpdate::completed(PathBuf::from("/tmp/out.json"), 0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        // Nothing written
        assert_eq!(store.get(id).await.unwrap().status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.insert(record(&format!("job-{}", i))).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.read_all().await.len(), 16);
    }
}
