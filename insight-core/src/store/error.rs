//! Storage error types

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::job::JobStatus;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid status transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
