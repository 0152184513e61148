use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use insight_api::{AppState, api, config::Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "insight_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Insight API...");

    let config = Config::from_env();
    config.validate().context("Invalid configuration")?;

    let layout = config.layout();
    layout.ensure().await.with_context(|| {
        format!(
            "Failed to prepare data directory {}",
            layout.root().display()
        )
    })?;

    tracing::info!("Data directory: {}", layout.root().display());
    tracing::info!("Upload limit: {} bytes", config.max_upload_bytes);

    // Build router with all API endpoints
    let app = api::create_router(AppState::new(&config));

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
