//! API Module
//!
//! HTTP API layer for the analysis service.
//! Each submodule handles endpoints for a specific concern.

pub mod analysis;
pub mod error;
pub mod health;
pub mod upload;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// Room for multipart boundaries and part headers on top of the archive itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Analysis endpoints
        .route(
            "/api/analyze",
            post(analysis::analyze).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/analysis-status/{id}", get(analysis::get_status))
        .route("/api/results/{id}", get(analysis::get_result))
        // Add state and middleware
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
