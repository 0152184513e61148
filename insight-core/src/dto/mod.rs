//! Data Transfer Objects
//!
//! Payloads exchanged between the HTTP API and its clients.

pub mod job;
