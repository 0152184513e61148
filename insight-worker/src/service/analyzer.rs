//! Analyzer service
//!
//! Runs the external analyzer for one job:
//! `<program> <leading args...> <archivePath> <outputPath>`.
//!
//! stdout and stderr are read concurrently into bounded buffers and echoed
//! to the log at debug level. The run is killed once the job timeout passes.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;

/// How long to wait for the output readers after the process is gone
///
/// A grandchild that inherited the pipes can keep them open indefinitely.
const CAPTURE_GRACE: Duration = Duration::from_secs(2);

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Failed to start analyzer process '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for analyzer process: {0}")]
    Wait(#[source] std::io::Error),
}

/// Text kept from one output stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub text: String,
    /// Output past the capture limit was discarded
    pub truncated: bool,
}

/// How an analyzer run ended
#[derive(Debug, Clone)]
pub struct AnalyzerOutcome {
    /// Exit code, when the process exited normally
    pub exit_code: Option<i32>,
    pub success: bool,
    /// Killed after exceeding the timeout
    pub timed_out: bool,
    pub elapsed: Duration,
    pub stdout: CapturedOutput,
    pub stderr: CapturedOutput,
}

impl AnalyzerOutcome {
    fn from_status(
        status: Option<ExitStatus>,
        elapsed: Duration,
        stdout: CapturedOutput,
        stderr: CapturedOutput,
    ) -> Self {
        Self {
            exit_code: status.and_then(|s| s.code()),
            success: status.is_some_and(|s| s.success()),
            timed_out: status.is_none(),
            elapsed,
            stdout,
            stderr,
        }
    }
}

/// Service trait for running the analyzer on one archive
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyzes `archive`, expecting the result JSON at `output`
    ///
    /// Only a failure to start the process is an error; every way the
    /// process itself can end is reported through [`AnalyzerOutcome`].
    async fn analyze(
        &self,
        job_id: Uuid,
        archive: &Path,
        output: &Path,
    ) -> Result<AnalyzerOutcome, AnalyzerError>;
}

/// Runs the analyzer as a child process
#[derive(Debug, Clone)]
pub struct ProcessAnalyzer {
    program: PathBuf,
    leading_args: Vec<OsString>,
    timeout: Duration,
    capture_limit: usize,
}

impl ProcessAnalyzer {
    pub fn new(
        program: impl Into<PathBuf>,
        leading_args: Vec<OsString>,
        timeout: Duration,
        capture_limit: usize,
    ) -> Self {
        Self {
            program: program.into(),
            leading_args,
            timeout,
            capture_limit,
        }
    }

    /// `java -jar <analyzer jar>` as configured
    pub fn java(config: &Config) -> Self {
        Self::new(
            config.java.clone(),
            vec!["-jar".into(), config.analyzer_jar.clone().into_os_string()],
            config.job_timeout,
            config.capture_limit,
        )
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Analyzer for ProcessAnalyzer {
    async fn analyze(
        &self,
        job_id: Uuid,
        archive: &Path,
        output: &Path,
    ) -> Result<AnalyzerOutcome, AnalyzerError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .arg(archive)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            job_id = %job_id,
            "Spawning {} {:?} {} {}",
            self.program.display(),
            self.leading_args,
            archive.display(),
            output.display()
        );

        let started = tokio::time::Instant::now();
        let mut child = command.spawn().map_err(|source| AnalyzerError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        let stdout = child
            .stdout
            .take()
            .map(|s| StreamCapture::spawn(s, job_id, "stdout", self.capture_limit));
        let stderr = child
            .stderr
            .take()
            .map(|s| StreamCapture::spawn(s, job_id, "stderr", self.capture_limit));

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(result) => Some(result.map_err(AnalyzerError::Wait)?),
            Err(_) => {
                warn!(
                    job_id = %job_id,
                    "Analyzer exceeded timeout of {:?}, killing it",
                    self.timeout
                );
                if let Err(e) = child.kill().await {
                    warn!(job_id = %job_id, "Failed to kill analyzer process: {}", e);
                }
                None
            }
        };
        let elapsed = started.elapsed();

        let stdout = StreamCapture::finish(stdout).await;
        let stderr = StreamCapture::finish(stderr).await;

        if let Some(status) = status {
            info!(job_id = %job_id, "Analyzer exited with {} after {:?}", status, elapsed);
        }

        Ok(AnalyzerOutcome::from_status(status, elapsed, stdout, stderr))
    }
}

/// Bounded buffer shared with a reader task
#[derive(Debug, Default)]
struct CaptureBuffer {
    bytes: Vec<u8>,
    truncated: bool,
}

impl CaptureBuffer {
    fn push(&mut self, chunk: &[u8], limit: usize) {
        let room = limit.saturating_sub(self.bytes.len());
        if chunk.len() > room {
            self.truncated = true;
        }
        self.bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    fn to_output(&self) -> CapturedOutput {
        CapturedOutput {
            text: String::from_utf8_lossy(&self.bytes).into_owned(),
            truncated: self.truncated,
        }
    }
}

struct StreamCapture {
    buffer: Arc<Mutex<CaptureBuffer>>,
    handle: JoinHandle<()>,
}

impl StreamCapture {
    fn spawn<R>(mut reader: R, job_id: Uuid, stream: &'static str, limit: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(CaptureBuffer::default()));
        let shared = Arc::clone(&buffer);

        let handle = tokio::spawn(async move {
            let mut chunk = vec![0u8; READ_CHUNK];
            loop {
                match reader.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => {
                        debug!(
                            job_id = %job_id,
                            stream,
                            "{}",
                            String::from_utf8_lossy(&chunk[..n]).trim_end()
                        );
                        shared
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner())
                            .push(&chunk[..n], limit);
                    }
                    Err(e) => {
                        warn!(job_id = %job_id, stream, "Failed to read analyzer output: {}", e);
                        break;
                    }
                }
            }
        });

        Self { buffer, handle }
    }

    /// Waits briefly for the reader to drain, then takes what was captured
    async fn finish(capture: Option<Self>) -> CapturedOutput {
        let Some(StreamCapture { buffer, mut handle }) = capture else {
            return CapturedOutput::default();
        };

        if tokio::time::timeout(CAPTURE_GRACE, &mut handle).await.is_err() {
            debug!("Output reader still busy after process exit, abandoning it");
            handle.abort();
        }

        buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .to_output()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_buffer_is_bounded() {
        let mut buffer = CaptureBuffer::default();
        buffer.push(b"hello ", 8);
        assert!(!buffer.truncated);

        buffer.push(b"world", 8);
        let output = buffer.to_output();
        assert_eq!(output.text, "hello wo");
        assert!(output.truncated);

        buffer.push(b"more", 8);
        assert_eq!(buffer.to_output().text, "hello wo");
    }

    #[test]
    fn test_java_command_line() {
        let mut config = Config::default();
        config.java = PathBuf::from("/jdk/bin/java");
        config.analyzer_jar = PathBuf::from("/opt/analyzer.jar");

        let analyzer = ProcessAnalyzer::java(&config);
        assert_eq!(analyzer.program(), Path::new("/jdk/bin/java"));
        assert_eq!(
            analyzer.leading_args,
            vec![OsString::from("-jar"), OsString::from("/opt/analyzer.jar")]
        );
        assert_eq!(analyzer.timeout(), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_an_error() {
        let analyzer = ProcessAnalyzer::new(
            "/nonexistent/analyzer",
            Vec::new(),
            Duration::from_secs(5),
            1024,
        );

        let err = analyzer
            .analyze(Uuid::now_v7(), Path::new("in.zip"), Path::new("out.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::Spawn { .. }));
    }

    #[cfg(unix)]
    fn sh(script: &str) -> ProcessAnalyzer {
        // `sh -c <script> <$0> <$1> <$2>`: archive lands in $1, output in $2
        ProcessAnalyzer::new(
            "sh",
            vec!["-c".into(), script.into(), "analyzer".into()],
            Duration::from_secs(5),
            1024,
        )
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_code_and_streams_are_captured() {
        let analyzer = sh("echo started; echo boom >&2; exit 3");

        let outcome = analyzer
            .analyze(Uuid::now_v7(), Path::new("in.zip"), Path::new("out.json"))
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(!outcome.timed_out);
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.stdout.text.trim(), "started");
        assert_eq!(outcome.stderr.text.trim(), "boom");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_arguments_are_passed_through() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("out.json");
        let analyzer = sh(r#"printf '{"archive":"%s"}' "$1" > "$2""#);

        let outcome = analyzer
            .analyze(Uuid::now_v7(), Path::new("/data/in.zip"), &output)
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            r#"{"archive":"/data/in.zip"}"#
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_the_process() {
        let mut analyzer = sh("sleep 30");
        analyzer.timeout = Duration::from_millis(200);

        let outcome = analyzer
            .analyze(Uuid::now_v7(), Path::new("in.zip"), Path::new("out.json"))
            .await
            .unwrap();

        assert!(outcome.timed_out);
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, None);
        assert!(outcome.elapsed < Duration::from_secs(10));
    }
}
