//! Insight Core
//!
//! Core types and storage for the Java Insight analysis pipeline.
//!
//! This crate contains:
//! - Domain types: job records, statuses, task descriptors, result summaries
//! - DTOs: payloads exchanged between the API and its clients
//! - Store: the file-backed status store and job queue shared by the API and worker

pub mod domain;
pub mod dto;
pub mod layout;
pub mod store;

pub use layout::DataLayout;
