//! On-disk layout of the shared data directory
//!
//! The API and the worker run as separate processes and coordinate only
//! through these paths, so both derive them from the same root.

use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// File name of the serialized status map
pub const STATUS_FILE_NAME: &str = "job_statuses.json";

/// File name the analyzer writes inside each job's result directory
pub const OUTPUT_FILE_NAME: &str = "analysis_output.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn status_file(&self) -> PathBuf {
        self.root.join(STATUS_FILE_NAME)
    }

    pub fn queue_dir(&self) -> PathBuf {
        self.root.join("queue")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    /// Directory dedicated to one job's analyzer output
    pub fn job_results_dir(&self, id: Uuid) -> PathBuf {
        self.results_dir().join(id.to_string())
    }

    /// Where the analyzer must write a job's JSON result
    pub fn output_path(&self, id: Uuid) -> PathBuf {
        self.job_results_dir(id).join(OUTPUT_FILE_NAME)
    }

    /// Creates every directory of the layout
    pub async fn ensure(&self) -> io::Result<()> {
        for dir in [self.queue_dir(), self.uploads_dir(), self.results_dir()] {
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }
}
