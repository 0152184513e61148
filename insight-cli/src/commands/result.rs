//! Result command

use anyhow::{Context, Result};
use colored::*;
use insight_client::InsightClient;
use insight_core::domain::report::AnalysisReport;
use uuid::Uuid;

/// Get and display a completed job's result
pub async fn show_result(client: &InsightClient, id: Uuid, raw: bool) -> Result<()> {
    let result = client.get_result(id).await?;

    if raw {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_summary(&result)
}

/// Print the headline figures of an analysis result
pub fn print_summary(result: &serde_json::Value) -> Result<()> {
    let report = AnalysisReport::from_value(result.clone())
        .context("Result does not look like analyzer output")?;
    let summary = report.summary();

    println!("{}", "Analysis Summary:".bold());
    println!("  Classes:     {}", summary.classes);
    println!("  Interfaces:  {}", summary.interfaces);
    println!("  Methods:     {}", summary.methods);
    println!("  Total LOC:   {}", summary.total_loc);
    println!("  Edges:       {}", report.graph_edges.len());

    if summary.processing_errors > 0 {
        println!(
            "\n{}",
            format!("{} file(s) could not be processed:", summary.processing_errors).yellow()
        );
        for error in &report.processing_errors {
            println!("  {} {}", "✗".red(), error);
        }
    }

    let mut largest: Vec<_> = report.classes.iter().collect();
    largest.sort_by(|a, b| b.loc.cmp(&a.loc));
    if !largest.is_empty() {
        println!("\n{}", "Largest types:".bold());
        for class in largest.iter().take(5) {
            println!(
                "  {} {} ({} LOC, {} methods)",
                "▸".cyan(),
                class.class_name,
                class.loc,
                class.method_count
            );
        }
    }

    Ok(())
}
