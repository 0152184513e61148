//! Configuration module

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the Insight API server
    pub api_url: String,
}
