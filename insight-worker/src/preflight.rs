//! Startup checks
//!
//! The worker cannot do anything useful without the analyzer jar and a
//! working Java runtime, so both are checked before the poller starts.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

use crate::config::Config;

/// Runs every startup check
pub async fn check(config: &Config) -> Result<()> {
    check_analyzer_jar(&config.analyzer_jar).await?;
    check_java_available(&config.java).await?;
    Ok(())
}

/// Checks that the analyzer jar exists
pub async fn check_analyzer_jar(path: &Path) -> Result<()> {
    let metadata = tokio::fs::metadata(path).await.with_context(|| {
        format!(
            "Analyzer JAR not found at {}. Build the java-analyzer project first (mvn clean package)",
            path.display()
        )
    })?;

    if !metadata.is_file() {
        anyhow::bail!("Analyzer JAR path {} is not a file", path.display());
    }

    info!("Using analyzer JAR: {}", path.display());
    Ok(())
}

/// Checks that the Java runtime starts
pub async fn check_java_available(java: &Path) -> Result<()> {
    let output = Command::new(java)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .await
        .with_context(|| {
            format!(
                "Failed to execute '{} -version'. Is Java installed?",
                java.display()
            )
        })?;

    if !output.status.success() {
        anyhow::bail!("Java runtime {} is not working correctly", java.display());
    }

    // `java -version` reports on stderr
    let report = if output.stderr.is_empty() {
        &output.stdout
    } else {
        &output.stderr
    };
    let version = String::from_utf8_lossy(report);
    info!(
        "Using Java executable {}: {}",
        java.display(),
        version.lines().next().unwrap_or("").trim()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_jar_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = check_analyzer_jar(&dir.path().join("missing.jar"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Analyzer JAR not found"));
    }

    #[tokio::test]
    async fn test_directory_is_not_a_jar() {
        let dir = TempDir::new().unwrap();
        assert!(check_analyzer_jar(dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_existing_jar_passes() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("analyzer.jar");
        std::fs::write(&jar, b"PK\x03\x04").unwrap();
        assert!(check_analyzer_jar(&jar).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_runtime_is_fatal() {
        let err = check_java_available(Path::new("/nonexistent/bin/java"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Is Java installed?"));
    }
}
