//! Service Module
//!
//! Business logic layer for the API.
//! Services work against the file-backed status store and job queue.

pub mod status;
pub mod submission;

// Re-export for convenience
pub use status as status_service;
pub use submission as submission_service;
