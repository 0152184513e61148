//! Insight Worker
//!
//! Polls the shared queue directory and runs the Java analyzer on each
//! uploaded archive, one job at a time.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use insight_worker::config::Config;
use insight_worker::preflight;
use insight_worker::scheduler::JobPoller;
use insight_worker::service::{Analyzer, ProcessAnalyzer};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "insight_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Insight Worker");

    // Load configuration
    let config = Config::from_env();
    config.validate().context("Invalid configuration")?;
    info!(
        "Loaded configuration: data_dir={}, java={}",
        config.data_dir.display(),
        config.java.display()
    );

    let layout = config.layout();
    layout.ensure().await.with_context(|| {
        format!(
            "Failed to prepare data directory {}",
            layout.root().display()
        )
    })?;

    // Nothing can be analyzed without these
    if let Err(e) = preflight::check(&config).await {
        error!("CRITICAL: {:#}", e);
        return Err(e);
    }

    let analyzer: Arc<dyn Analyzer> = Arc::new(ProcessAnalyzer::java(&config));
    let poller = Arc::new(JobPoller::new(&config, analyzer));

    info!(
        "Poll interval: {:?}, job timeout: {:?}",
        config.poll_interval, config.job_timeout
    );
    info!("Worker started. Waiting for jobs...");

    tokio::select! {
        result = poller.run() => {
            if let Err(e) = &result {
                error!("Poller error: {:#}", e);
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}
