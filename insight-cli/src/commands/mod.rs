//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod analyze;
mod result;
mod status;

use anyhow::{Context, Result};
use clap::Subcommand;
use insight_client::InsightClient;
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Upload a zip archive for analysis
    Analyze {
        /// Path to the project archive (.zip)
        archive: PathBuf,

        /// Wait for the analysis to finish
        #[arg(short, long)]
        wait: bool,

        /// Seconds between status checks while waiting
        #[arg(long, default_value_t = 2)]
        interval: u64,

        /// Give up waiting after this many seconds
        #[arg(long, default_value_t = 300)]
        timeout: u64,
    },
    /// Show a job's status
    Status {
        /// Job ID
        id: String,
    },
    /// Show a completed job's result
    Result {
        /// Job ID
        id: String,

        /// Print the raw JSON instead of a summary
        #[arg(long)]
        raw: bool,
    },
}

/// Handle a CLI command
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let client = InsightClient::new(&config.api_url);

    match command {
        Commands::Analyze {
            archive,
            wait,
            interval,
            timeout,
        } => analyze::analyze(&client, &archive, wait, interval, timeout).await,
        Commands::Status { id } => status::show_status(&client, parse_id(&id)?).await,
        Commands::Result { id, raw } => result::show_result(&client, parse_id(&id)?, raw).await,
    }
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).with_context(|| format!("'{}' is not a valid job ID", id))
}
