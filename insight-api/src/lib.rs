//! Insight API
//!
//! HTTP front door of the analysis pipeline: accepts archive uploads, records
//! and queues jobs, and serves job status and results to polling clients.

pub mod api;
pub mod config;
pub mod service;
pub mod state;

pub use state::AppState;
