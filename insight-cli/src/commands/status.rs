//! Status command

use anyhow::Result;
use colored::*;
use insight_client::{InsightClient, JobRecord, JobStatus};
use uuid::Uuid;

/// Get and display a job's status
pub async fn show_status(client: &InsightClient, id: Uuid) -> Result<()> {
    let record = client.get_status(id).await?;
    print_record(&record);
    Ok(())
}

/// Print detailed job information
pub fn print_record(record: &JobRecord) {
    println!("{}", "Job Details:".bold());
    println!("  ID:        {}", record.id.to_string().cyan());
    println!("  File:      {}", record.original_file_name);
    println!("  Status:    {}", colorize_status(record.status));
    println!(
        "  Submitted: {}",
        record.created_at.format("%Y-%m-%d %H:%M:%S")
    );

    if let Some(started) = record.started_at {
        println!("  Started:   {}", started.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Some(finished) = record.finished_at {
        println!("  Finished:  {}", finished.format("%Y-%m-%d %H:%M:%S"));

        if let Some(started) = record.started_at {
            let seconds = finished.signed_duration_since(started).num_seconds();
            println!("  Duration:  {}s", seconds);
        }
    }

    if let Some(code) = record.exit_code {
        println!("  Exit Code: {}", code);
    }

    if let Some(error) = &record.error {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }

    if let Some(details) = &record.details {
        println!("\n{}", "Details:".bold());
        println!("{}", details.dimmed());
    }
}

/// Colorize job status for display
pub fn colorize_status(status: JobStatus) -> ColoredString {
    let text = status.as_str();
    match status {
        JobStatus::Queued => text.yellow(),
        JobStatus::Processing => text.cyan(),
        JobStatus::Completed => text.green(),
        JobStatus::Failed | JobStatus::FailedToQueue => text.red(),
    }
}
