//! Worker configuration
//!
//! Defines the analyzer command, polling interval, per-job limits and the
//! shared data directory.

use std::path::PathBuf;
use std::time::Duration;

use insight_core::DataLayout;

/// Where `mvn package` leaves the standalone analyzer jar
pub const DEFAULT_ANALYZER_JAR: &str =
    "java-analyzer/target/java-analyzer-1.0-SNAPSHOT-standalone.jar";

/// Worker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the data directory shared with the API server
    pub data_dir: PathBuf,

    /// Analyzer jar passed to `java -jar`
    pub analyzer_jar: PathBuf,

    /// Java executable
    pub java: PathBuf,

    /// How often to check the queue
    pub poll_interval: Duration,

    /// Maximum time an analyzer run may take before it is killed
    pub job_timeout: Duration,

    /// Bytes kept from each of the analyzer's stdout and stderr
    pub capture_limit: usize,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            analyzer_jar: PathBuf::from(DEFAULT_ANALYZER_JAR),
            java: PathBuf::from("java"),
            poll_interval: Duration::from_secs(5),
            job_timeout: Duration::from_secs(300), // 5 minutes
            capture_limit: 64 * 1024,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Environment variables (all optional):
    /// - INSIGHT_DATA_DIR (default: ./data)
    /// - INSIGHT_ANALYZER_JAR (default: java-analyzer/target/...-standalone.jar)
    /// - INSIGHT_JAVA, else JDK11_HOME/bin/java, else JAVA_HOME/bin/java, else java
    /// - INSIGHT_POLL_INTERVAL (seconds, default: 5)
    /// - INSIGHT_JOB_TIMEOUT (seconds, default: 300)
    /// - INSIGHT_CAPTURE_LIMIT (bytes, default: 65536)
    pub fn from_env() -> Self {
        let data_dir = std::env::var("INSIGHT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));

        let mut config = Self::new(data_dir);

        if let Ok(jar) = std::env::var("INSIGHT_ANALYZER_JAR") {
            config.analyzer_jar = PathBuf::from(jar);
        }

        config.java = resolve_java(
            std::env::var("INSIGHT_JAVA").ok(),
            std::env::var("JDK11_HOME").ok(),
            std::env::var("JAVA_HOME").ok(),
        );

        if let Some(secs) = env_u64("INSIGHT_POLL_INTERVAL") {
            config.poll_interval = Duration::from_secs(secs);
        }

        if let Some(secs) = env_u64("INSIGHT_JOB_TIMEOUT") {
            config.job_timeout = Duration::from_secs(secs);
        }

        if let Some(limit) = std::env::var("INSIGHT_CAPTURE_LIMIT")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            config.capture_limit = limit;
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

        if self.analyzer_jar.as_os_str().is_empty() {
            anyhow::bail!("analyzer_jar cannot be empty");
        }

        if self.java.as_os_str().is_empty() {
            anyhow::bail!("java cannot be empty");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.job_timeout.is_zero() {
            anyhow::bail!("job_timeout must be greater than 0");
        }

        if self.capture_limit == 0 {
            anyhow::bail!("capture_limit must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(PathBuf::from("data"))
    }
}

/// Picks the Java executable from the explicit override or a JDK home
fn resolve_java(
    explicit: Option<String>,
    jdk11_home: Option<String>,
    java_home: Option<String>,
) -> PathBuf {
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    if let Some(java) = non_empty(explicit) {
        return PathBuf::from(java);
    }

    non_empty(jdk11_home)
        .or_else(|| non_empty(java_home))
        .map(|home| PathBuf::from(home).join("bin").join("java"))
        .unwrap_or_else(|| PathBuf::from("java"))
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|s| s.parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.job_timeout, Duration::from_secs(300));
        assert_eq!(config.capture_limit, 64 * 1024);
        assert_eq!(config.analyzer_jar, PathBuf::from(DEFAULT_ANALYZER_JAR));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        config.poll_interval = Duration::from_secs(1);
        config.capture_limit = 0;
        assert!(config.validate().is_err());

        config.capture_limit = 1024;
        config.analyzer_jar = PathBuf::new();
        assert!(config.validate().is_err());

        config.analyzer_jar = PathBuf::from("analyzer.jar");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolve_java() {
        assert_eq!(
            resolve_java(Some("/opt/java".into()), Some("/jdk11".into()), None),
            PathBuf::from("/opt/java")
        );
        assert_eq!(
            resolve_java(None, Some("/jdk11".into()), Some("/jdk17".into())),
            PathBuf::from("/jdk11/bin/java")
        );
        assert_eq!(
            resolve_java(Some(" ".into()), None, Some("/jdk17".into())),
            PathBuf::from("/jdk17/bin/java")
        );
        assert_eq!(resolve_java(None, None, None), PathBuf::from("java"));
    }
}
