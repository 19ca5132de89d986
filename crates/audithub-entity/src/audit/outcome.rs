//! Result of one audit invocation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome reported by the audit child process.
///
/// Successful outcomes carry `scores` (0–1, `null` when the category could
/// not be scored), `metrics` and `duration_ms`. Failed outcomes carry
/// `error` and optionally `stack`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditOutcome {
    pub success: bool,
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scores: BTreeMap<String, Option<f64>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditOutcome {
    /// Build a successful outcome.
    pub fn success(
        url: impl Into<String>,
        scores: BTreeMap<String, Option<f64>>,
        metrics: BTreeMap<String, f64>,
        duration_ms: u64,
    ) -> Self {
        Self {
            success: true,
            url: url.into(),
            scores,
            metrics,
            duration_ms: Some(duration_ms),
            error: None,
            stack: None,
            timestamp: Utc::now(),
        }
    }

    /// Build a failed outcome.
    pub fn failure(url: impl Into<String>, error: impl Into<String>, stack: Option<String>) -> Self {
        Self {
            success: false,
            url: url.into(),
            scores: BTreeMap::new(),
            metrics: BTreeMap::new(),
            duration_ms: None,
            error: Some(error.into()),
            stack,
            timestamp: Utc::now(),
        }
    }

    /// Error message of a failed outcome.
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("audit failed without an error message")
    }
}
