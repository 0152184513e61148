//! Insight HTTP Client
//!
//! A type-safe HTTP client for the Insight analysis API.
//!
//! # Example
//!
//! ```no_run
//! use insight_client::InsightClient;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> insight_client::Result<()> {
//!     let client = InsightClient::new("http://localhost:3001");
//!
//!     let submitted = client.submit_archive("project.zip").await?;
//!     let record = client
//!         .wait_for_completion(submitted.id, Duration::from_secs(2), Duration::from_secs(300))
//!         .await?;
//!
//!     println!("Job {} finished: {}", record.id, record.status);
//!     Ok(())
//! }
//! ```

mod analysis;
pub mod error;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use insight_core::domain::job::{JobRecord, JobStatus};
pub use insight_core::dto::job::SubmitResponse;

use insight_core::dto::job::ErrorResponse;
use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Insight API
#[derive(Debug, Clone)]
pub struct InsightClient {
    /// Base URL of the API server (e.g., "http://localhost:3001")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl InsightClient {
    /// Create a new client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the API server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Handle an API response and deserialize JSON
    ///
    /// Error bodies are `{error, status?}`; anything else is reported verbatim.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            return Err(match serde_json::from_str::<ErrorResponse>(&error_text) {
                Ok(body) => ClientError::ApiError {
                    status: status.as_u16(),
                    message: body.error,
                    job_status: body.status,
                },
                Err(_) => ClientError::api_error(status.as_u16(), error_text),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
