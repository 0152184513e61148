//! Analyze command

use anyhow::Result;
use colored::*;
use insight_client::{InsightClient, JobStatus};
use std::path::Path;
use std::time::Duration;

use super::result::print_summary;
use super::status::{colorize_status, print_record};

/// Upload an archive and optionally wait for the analysis
pub async fn analyze(
    client: &InsightClient,
    archive: &Path,
    wait: bool,
    interval: u64,
    timeout: u64,
) -> Result<()> {
    let submitted = client.submit_archive(archive).await?;

    println!("{} {}", "✓".green(), submitted.message);
    println!("  Job ID: {}", submitted.id.to_string().cyan());
    println!("  Status: {}{}", client.base_url(), submitted.status_url);

    if !wait {
        return Ok(());
    }

    println!();
    println!("{}", "Waiting for analysis to finish...".dimmed());

    let record = client
        .wait_for_completion(
            submitted.id,
            Duration::from_secs(interval.max(1)),
            Duration::from_secs(timeout),
        )
        .await?;

    println!("Analysis finished: {}", colorize_status(record.status));
    println!();

    if record.status == JobStatus::Completed {
        let result = client.get_result(record.id).await?;
        print_summary(&result)?;
    } else {
        print_record(&record);
    }

    Ok(())
}
