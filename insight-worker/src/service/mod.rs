//! Service layer for the worker

pub mod analyzer;

pub use analyzer::{Analyzer, AnalyzerError, AnalyzerOutcome, CapturedOutput, ProcessAnalyzer};
