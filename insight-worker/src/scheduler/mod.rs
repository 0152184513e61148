//! Scheduler layer for the worker
//!
//! Polls the queue directory and drives each job from claim to terminal
//! status.

pub mod poller;

pub use poller::{CycleOutcome, JobPoller};
