//! Shared handler state

use insight_core::DataLayout;
use insight_core::store::{JobQueue, StatusStore};

use crate::config::Config;

/// State handed to every handler and service call
#[derive(Debug, Clone)]
pub struct AppState {
    pub layout: DataLayout,
    pub status_store: StatusStore,
    pub queue: JobQueue,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self::from_layout(config.layout(), config.max_upload_bytes)
    }

    /// State over the standard paths of `layout`
    pub fn from_layout(layout: DataLayout, max_upload_bytes: usize) -> Self {
        Self {
            status_store: StatusStore::new(layout.status_file()),
            queue: JobQueue::new(layout.queue_dir()),
            layout,
            max_upload_bytes,
        }
    }
}
