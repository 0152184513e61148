//! Insight Worker
//!
//! Drains the on-disk job queue one job at a time, running the external Java
//! analyzer for each archive and recording the outcome in the status store.
//!
//! Architecture:
//! - Configuration: settings from environment or defaults
//! - Preflight: analyzer artifact and Java runtime checks at startup
//! - Services: the analyzer process runner
//! - Scheduler: queue polling and job lifecycle

pub mod config;
pub mod preflight;
pub mod scheduler;
pub mod service;
