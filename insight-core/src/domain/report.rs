//! Analysis report view
//!
//! The analyzer's JSON output is passed through the API verbatim. These types
//! are a lenient, read-only view over the parts clients summarize.

use serde::Deserialize;

/// Top-level analyzer output
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisReport {
    pub classes: Vec<ClassReport>,
    pub graph_edges: Vec<serde_json::Value>,
    pub processing_errors: Vec<String>,
}

/// One analyzed class or interface
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassReport {
    pub package_name: Option<String>,
    pub class_name: String,
    pub simple_name: String,
    /// Jackson names the `isInterface()` getter's property `interface`
    #[serde(alias = "interface")]
    pub is_interface: bool,
    pub loc: u64,
    pub field_count: u64,
    pub method_count: u64,
}

/// Aggregate figures for a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnalysisSummary {
    pub classes: usize,
    pub interfaces: usize,
    pub total_loc: u64,
    pub methods: u64,
    pub processing_errors: usize,
}

impl AnalysisReport {
    /// Parses a report out of an arbitrary result payload
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn summary(&self) -> AnalysisSummary {
        AnalysisSummary {
            classes: self.classes.iter().filter(|c| !c.is_interface).count(),
            interfaces: self.classes.iter().filter(|c| c.is_interface).count(),
            total_loc: self.classes.iter().map(|c| c.loc).sum(),
            methods: self.classes.iter().map(|c| c.method_count).sum(),
            processing_errors: self.processing_errors.len(),
        }
    }
}
