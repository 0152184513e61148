//! API server configuration
//!
//! Defines the bind address, the shared data directory and upload limits.

use std::net::SocketAddr;
use std::path::PathBuf;

use insight_core::DataLayout;

/// Default upload limit (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// API server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the data directory shared with the worker
    pub data_dir: PathBuf,

    /// Address the HTTP server listens on
    pub bind_addr: String,

    /// Largest accepted archive, in bytes
    pub max_upload_bytes: usize,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            bind_addr: "0.0.0.0:3001".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Environment variables (all optional):
    /// - INSIGHT_DATA_DIR (default: ./data)
    /// - INSIGHT_BIND_ADDR (default: 0.0.0.0:3001)
    /// - INSIGHT_MAX_UPLOAD_BYTES (default: 10485760)
    pub fn from_env() -> Self {
        let data_dir = std::env::var("INSIGHT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));

        let mut config = Self::new(data_dir);

        if let Ok(addr) = std::env::var("INSIGHT_BIND_ADDR") {
            config.bind_addr = addr;
        }

        if let Some(limit) = std::env::var("INSIGHT_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            config.max_upload_bytes = limit;
        }

        config
    }

    pub fn layout(&self) -> DataLayout {
        DataLayout::new(&self.data_dir)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            anyhow::bail!("data_dir cannot be empty");
        }

        if self.bind_addr.parse::<SocketAddr>().is_err() {
            anyhow::bail!("bind_addr '{}' is not a valid socket address", self.bind_addr);
        }

        if self.max_upload_bytes == 0 {
            anyhow::bail!("max_upload_bytes must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(PathBuf::from("data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bind_addr, "0.0.0.0:3001");
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.bind_addr = "not-an-address".to_string();
        assert!(config.validate().is_err());

        config.bind_addr = "127.0.0.1:8080".to_string();
        config.max_upload_bytes = 0;
        assert!(config.validate().is_err());

        config.max_upload_bytes = 1024;
        assert!(config.validate().is_ok());
    }
}
