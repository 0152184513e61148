//! Core domain types
//!
//! These types represent the job lifecycle and are shared between the API
//! (creates records, serves them) and the worker (drives jobs to completion).

pub mod job;
pub mod report;
