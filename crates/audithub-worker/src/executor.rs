//! Audit executor: one isolated child process per audit.
//!
//! The parent writes a single `RUN_AUDIT` line to the child's stdin and
//! reads stdout until the first `AUDIT_RESULT` line. The first result wins;
//! whatever the child does afterwards is ignored and the child is killed.
//! A hard timeout runs from launch.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tracing::{debug, trace, warn};

use audithub_core::config::executor::ExecutorConfig;
use audithub_core::error::{AppError, ErrorKind};
use audithub_entity::audit::{AuditOptions, AuditOutcome, RunnerMessage, RunnerRequest};

/// Upper bound on reaping a killed child.
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Reasons an audit produced no successful outcome.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The child process could not be started.
    #[error("failed to start audit process '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// No outcome arrived before the deadline.
    #[error("audit timed out after {0:?}")]
    Timeout(Duration),

    /// The child exited without reporting an outcome.
    #[error("audit process exited prematurely with code {}", .code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    PrematureExit { code: Option<i32> },

    /// The exchange with the child broke down.
    #[error("audit protocol error: {0}")]
    Protocol(String),

    /// The child reported a failed audit.
    #[error("{0}")]
    AuditFailed(String),

    /// Pipe I/O failed.
    #[error("I/O error talking to audit process: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ExecutionError> for AppError {
    fn from(err: ExecutionError) -> Self {
        let message = err.to_string();
        AppError::with_source(ErrorKind::Execution, message, err)
    }
}

/// Runs a single audit and returns its outcome.
#[async_trait]
pub trait AuditExecutor: Send + Sync + std::fmt::Debug {
    /// Audit `url`. Reported failures come back as [`ExecutionError::AuditFailed`].
    async fn execute(&self, url: &str, options: &AuditOptions) -> Result<AuditOutcome, ExecutionError>;
}

/// Executor that launches a fresh child process for every audit.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    timeout: Duration,
}

impl ProcessExecutor {
    /// Executor for `command` with the default 120 s timeout.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            env: config.env.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send the request and wait for the first result line.
    async fn converse(child: &mut Child, request: &str) -> Result<AuditOutcome, ExecutionError> {
        if let Some(mut stdin) = child.stdin.take() {
            // A child that dies before reading is reported through its exit code.
            if let Err(e) = stdin.write_all(request.as_bytes()).await {
                debug!(error = %e, "Could not write audit request to child");
            }
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutionError::Protocol("child stdout is not captured".into()))?;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            match RunnerMessage::parse_line(&line) {
                Some(RunnerMessage::AuditResult { result }) => return Ok(result),
                None => trace!(line = %line, "Ignoring non-protocol output"),
            }
        }

        let status = child.wait().await?;
        Err(ExecutionError::PrematureExit {
            code: status.code(),
        })
    }
}

#[async_trait]
impl AuditExecutor for ProcessExecutor {
    async fn execute(&self, url: &str, options: &AuditOptions) -> Result<AuditOutcome, ExecutionError> {
        let request = RunnerRequest::RunAudit {
            url: url.to_string(),
            options: options.clone(),
        }
        .to_line()
        .map_err(|e| ExecutionError::Protocol(e.to_string()))?;

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|source| ExecutionError::Spawn {
            command: self.command.clone(),
            source,
        })?;
        let pid = child.id();
        debug!(pid, url, "Audit process started");

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(stderr, pid));
        }

        let outcome = match tokio::time::timeout(self.timeout, Self::converse(&mut child, &request)).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => Err(ExecutionError::Timeout(self.timeout)),
        };
        terminate(&mut child, pid).await;

        let outcome = outcome?;
        debug!(
            pid,
            url,
            success = outcome.success,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Audit process reported"
        );
        if outcome.success {
            Ok(outcome)
        } else {
            if let Some(stack) = &outcome.stack {
                debug!(pid, url, stack = %stack, "Audit failure stack");
            }
            Err(ExecutionError::AuditFailed(outcome.error_message().to_string()))
        }
    }
}

/// Kill the child if it is still running and reap it.
async fn terminate(child: &mut Child, pid: Option<u32>) {
    if let Err(e) = child.start_kill() {
        trace!(pid, error = %e, "Audit process already exited");
    }
    match tokio::time::timeout(REAP_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => trace!(pid, ?status, "Audit process reaped"),
        Ok(Err(e)) => warn!(pid, error = %e, "Failed to reap audit process"),
        Err(_) => warn!(pid, "Audit process did not exit after kill"),
    }
}

/// Forward the child's stderr to the log.
async fn drain_stderr(stderr: ChildStderr, pid: Option<u32>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(pid, "runner: {line}");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    const SUCCESS_LINE: &str = r#"{"type":"AUDIT_RESULT","result":{"success":true,"url":"https://example.com","scores":{"performance":0.9},"metrics":{"lcp":1500.0},"durationMs":10,"timestamp":"2026-01-01T00:00:00Z"}}"#;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn executor(script: &Path, extra: &[&str], timeout: Duration) -> ProcessExecutor {
        let mut args = vec![script.display().to_string()];
        args.extend(extra.iter().map(|s| s.to_string()));
        ProcessExecutor::new("sh", args).with_timeout(timeout)
    }

    fn options() -> AuditOptions {
        AuditOptions {
            categories: vec!["performance".into()],
            locale: Some("en".into()),
        }
    }

    #[tokio::test]
    async fn test_first_result_wins_and_child_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!(
            "read line\necho 'starting chrome'\necho '{SUCCESS_LINE}'\necho '{}'\nexec sleep 30\n",
            r#"{"type":"AUDIT_RESULT","result":{"success":false,"url":"x","error":"late","timestamp":"2026-01-01T00:00:00Z"}}"#
        );
        let path = script(dir.path(), "ok.sh", &body);

        let started = Instant::now();
        let outcome = executor(&path, &[], Duration::from_secs(20))
            .execute("https://example.com", &options())
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.scores["performance"], Some(0.9));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_request_reaches_child() {
        let dir = tempfile::tempdir().unwrap();
        let captured = dir.path().join("request.json");
        let body = format!("read line\nprintf '%s' \"$line\" > \"$1\"\necho '{SUCCESS_LINE}'\n");
        let path = script(dir.path(), "echo.sh", &body);

        executor(&path, &[captured.to_str().unwrap()], Duration::from_secs(20))
            .execute("https://example.com", &options())
            .await
            .unwrap();

        let request: RunnerRequest =
            serde_json::from_str(&std::fs::read_to_string(&captured).unwrap()).unwrap();
        let RunnerRequest::RunAudit { url, options: sent } = request;
        assert_eq!(url, "https://example.com");
        assert_eq!(sent, options());
    }

    #[tokio::test]
    async fn test_reported_failure() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"read line
echo '{"type":"AUDIT_RESULT","result":{"success":false,"url":"https://example.com","error":"Chrome crashed","stack":"at launch","timestamp":"2026-01-01T00:00:00Z"}}'
"#;
        let path = script(dir.path(), "fail.sh", body);

        let err = executor(&path, &[], Duration::from_secs(20))
            .execute("https://example.com", &options())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::AuditFailed(ref m) if m == "Chrome crashed"));
    }

    #[tokio::test]
    async fn test_premature_exit_reports_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(dir.path(), "crash.sh", "read line\necho 'segfault' >&2\nexit 3\n");

        let err = executor(&path, &[], Duration::from_secs(20))
            .execute("https://example.com", &options())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::PrematureExit { code: Some(3) }));
        assert!(err.to_string().contains("code 3"));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let path = script(dir.path(), "hang.sh", "echo $$ > \"$1\"\nexec sleep 30\n");

        let err = executor(&path, &[pid_file.to_str().unwrap()], Duration::from_millis(500))
            .execute("https://example.com", &options())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Timeout(_)));

        let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
        if Path::new("/proc").exists() {
            assert!(!Path::new(&format!("/proc/{pid}")).exists(), "child {pid} still running");
        }
    }

    #[tokio::test]
    async fn test_missing_command() {
        let err = ProcessExecutor::new("/nonexistent/audithub-runner", vec![])
            .execute("https://example.com", &options())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Spawn { .. }));
        assert_eq!(AppError::from(err).kind, ErrorKind::Execution);
    }
}
