//! File-backed storage
//!
//! The status store and the job queue are plain files under the data
//! directory. Both are shared between the API process (producer) and the
//! worker process (consumer).

mod error;
pub mod queue;
pub mod status;

pub use error::{StoreError, StoreResult};
pub use queue::{Claim, ClaimedTask, JobQueue};
pub use status::{StatusMap, StatusStore};

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// `path` with `suffix` appended to its file name
pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
