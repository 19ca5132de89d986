//! Invocation of the Lighthouse CLI.

use std::process::Stdio;
use std::time::Instant;

use thiserror::Error;
use tokio::process::Command;

use audithub_entity::audit::{AuditOptions, AuditOutcome, DEFAULT_CATEGORY};

use crate::report::LighthouseReport;

/// Chrome flags for a sandboxless headless browser in a container.
pub const CHROME_FLAGS: [&str; 7] = [
    "--headless",
    "--disable-gpu",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-setuid-sandbox",
    "--disable-web-security",
    "--disable-features=site-per-process",
];

/// Mobile emulation and simulated throttling.
const EMULATION_FLAGS: [&str; 8] = [
    "--form-factor=mobile",
    "--throttling.rttMs=150",
    "--throttling.throughputKbps=1638.4",
    "--throttling.cpuSlowdownMultiplier=4",
    "--screenEmulation.mobile",
    "--screenEmulation.width=375",
    "--screenEmulation.height=667",
    "--screenEmulation.deviceScaleFactor=2",
];

const STDERR_TAIL: usize = 2000;

#[derive(Debug, Error)]
pub enum LighthouseError {
    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("lighthouse exited with code {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },

    #[error("unreadable lighthouse report: {0}")]
    Report(#[from] serde_json::Error),

    #[error("{code}: {message}")]
    Runtime { code: String, message: String },
}

/// Runs one audit through the `lighthouse` command.
#[derive(Debug, Clone)]
pub struct Lighthouse {
    command: String,
    chrome_path: Option<String>,
}

impl Lighthouse {
    pub fn new(command: impl Into<String>, chrome_path: Option<String>) -> Self {
        Self {
            command: command.into(),
            chrome_path,
        }
    }

    /// Read `LIGHTHOUSE_PATH` and `CHROME_PATH`.
    pub fn from_env() -> Self {
        let command = std::env::var("LIGHTHOUSE_PATH").unwrap_or_else(|_| "lighthouse".to_string());
        let chrome_path = std::env::var("CHROME_PATH").ok().filter(|p| !p.is_empty());
        Self::new(command, chrome_path)
    }

    /// Command-line arguments for auditing `url`.
    pub fn args(url: &str, options: &AuditOptions) -> Vec<String> {
        let categories = if options.categories.is_empty() {
            DEFAULT_CATEGORY.to_string()
        } else {
            options.categories.join(",")
        };
        let locale = options.locale.as_deref().unwrap_or("en");

        let mut args = vec![
            url.to_string(),
            "--output=json".to_string(),
            "--output-path=stdout".to_string(),
            "--quiet".to_string(),
            format!("--only-categories={categories}"),
            format!("--locale={locale}"),
        ];
        args.extend(EMULATION_FLAGS.iter().map(|f| f.to_string()));
        args.push(format!("--chrome-flags={}", CHROME_FLAGS.join(" ")));
        args
    }

    /// Audit `url`. Failures are returned as a failed outcome rather than
    /// an error so they can be reported to the parent.
    pub async fn audit(&self, url: &str, options: &AuditOptions) -> AuditOutcome {
        let started = Instant::now();
        match self.run(url, options).await {
            Ok(report) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                tracing::info!(url, duration_ms, "Lighthouse audit finished");
                AuditOutcome::success(url, report.scores(&options.categories), report.metrics(), duration_ms)
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "Lighthouse audit failed");
                AuditOutcome::failure(url, e.to_string(), None)
            }
        }
    }

    async fn run(&self, url: &str, options: &AuditOptions) -> Result<LighthouseReport, LighthouseError> {
        let mut cmd = Command::new(&self.command);
        cmd.args(Self::args(url, options))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(chrome_path) = &self.chrome_path {
            cmd.env("CHROME_PATH", chrome_path);
        }

        tracing::debug!(command = %self.command, url, "Starting lighthouse");
        let output = cmd.output().await.map_err(|source| LighthouseError::Spawn {
            command: self.command.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(LighthouseError::Exit {
                code: output.status.code(),
                stderr: tail(&String::from_utf8_lossy(&output.stderr)),
            });
        }

        let report = LighthouseReport::parse(&String::from_utf8_lossy(&output.stdout))?;
        if let Some(error) = report.runtime_error() {
            return Err(LighthouseError::Runtime {
                code: error.code.clone(),
                message: error.message.clone(),
            });
        }
        Ok(report)
    }
}

/// Last `STDERR_TAIL` bytes of `text`, trimmed, on a char boundary.
fn tail(text: &str) -> String {
    let text = text.trim();
    let mut start = text.len().saturating_sub(STDERR_TAIL);
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_with_defaults() {
        let options = AuditOptions {
            categories: vec![],
            locale: None,
        };
        let args = Lighthouse::args("https://example.com", &options);
        assert_eq!(args[0], "https://example.com");
        assert!(args.contains(&"--only-categories=performance".to_string()));
        assert!(args.contains(&"--locale=en".to_string()));
        assert!(args.contains(&"--form-factor=mobile".to_string()));
        let chrome = args.iter().find(|a| a.starts_with("--chrome-flags=")).unwrap();
        assert!(chrome.contains("--headless --disable-gpu"));
    }

    #[test]
    fn test_args_join_categories() {
        let options = AuditOptions {
            categories: vec!["performance".into(), "seo".into()],
            locale: Some("fr".into()),
        };
        let args = Lighthouse::args("https://example.com", &options);
        assert!(args.contains(&"--only-categories=performance,seo".to_string()));
        assert!(args.contains(&"--locale=fr".to_string()));
    }

    #[test]
    fn test_tail_keeps_end() {
        let long = "x".repeat(STDERR_TAIL + 10) + "end";
        let tailed = tail(&long);
        assert_eq!(tailed.len(), STDERR_TAIL);
        assert!(tailed.ends_with("end"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_binary_reports_failure() {
        let lighthouse = Lighthouse::new("/nonexistent/lighthouse", None);
        let options = AuditOptions {
            categories: vec!["performance".into()],
            locale: None,
        };
        let outcome = lighthouse.audit("https://example.com", &options).await;
        assert!(!outcome.success);
        assert!(outcome.error_message().contains("/nonexistent/lighthouse"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_report_from_fake_binary() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-lighthouse.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\necho '{\"categories\":{\"performance\":{\"score\":0.5}},\"audits\":{\"interactive\":{\"numericValue\":3000}}}'\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let lighthouse = Lighthouse::new(script.display().to_string(), None);
        let options = AuditOptions {
            categories: vec!["performance".into()],
            locale: None,
        };
        let outcome = lighthouse.audit("https://example.com", &options).await;

        assert!(outcome.success);
        assert_eq!(outcome.scores["performance"], Some(0.5));
        assert_eq!(outcome.metrics["tti"], 3000.0);
    }
}
