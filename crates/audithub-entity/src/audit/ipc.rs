//! Newline-delimited JSON messages exchanged with the audit child process.
//!
//! The parent writes exactly one [`RunnerRequest`] line to the child's stdin;
//! the child answers with one [`RunnerMessage`] line on stdout.

use serde::{Deserialize, Serialize};

use super::outcome::AuditOutcome;

/// Options forwarded with an audit request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditOptions {
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

/// Parent → child message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunnerRequest {
    RunAudit { url: String, options: AuditOptions },
}

/// Child → parent message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunnerMessage {
    AuditResult { result: AuditOutcome },
}

impl RunnerRequest {
    /// Encode as one protocol line, newline included.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

impl RunnerMessage {
    /// Decode a stdout line. Returns `None` for anything that is not a
    /// protocol message.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with('{') {
            return None;
        }
        serde_json::from_str(line).ok()
    }

    /// Encode as one protocol line, newline included.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
