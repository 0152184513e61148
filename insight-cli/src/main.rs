//! Insight CLI
//!
//! Command-line interface for submitting Java projects to the Insight
//! analysis service and reading back their results.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "insight")]
#[command(about = "Java project analysis CLI", long_about = None)]
struct Cli {
    /// Insight API URL
    #[arg(long, env = "INSIGHT_API_URL", default_value = "http://localhost:3001")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        api_url: cli.api_url,
    };

    handle_command(cli.command, &config).await
}
