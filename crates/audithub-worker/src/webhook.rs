//! Best-effort webhook delivery for finished jobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, warn};

use audithub_core::config::webhook::WebhookConfig;
use audithub_core::error::AppError;
use audithub_core::result::AppResult;
use audithub_core::types::id::JobId;
use audithub_entity::audit::STANDARD_CATEGORIES;
use audithub_entity::job::{Job, JobState};

/// Why a delivery did not succeed.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("webhook endpoint returned HTTP {0}")]
    HttpStatus(u16),
}

/// Body posted to the caller's endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub job_id: JobId,
    pub state: JobState,
    pub result: Value,
}

impl WebhookPayload {
    /// Payload for a completed job, with scores rescaled to 0–100.
    pub fn completed(job_id: JobId, result: &Value) -> Self {
        Self {
            job_id,
            state: JobState::Completed,
            result: rescale_scores(result),
        }
    }

    /// Payload for a job that failed for good.
    pub fn failed(job_id: JobId, reason: &str) -> Self {
        Self {
            job_id,
            state: JobState::Failed,
            result: json!({ "error": reason }),
        }
    }
}

/// Convert `scores.*` from 0–1 to 0–100. Values are not rounded.
///
/// The standard categories are always present; missing or null scores
/// become 0.
pub fn rescale_scores(result: &Value) -> Value {
    let mut result = result.clone();
    if let Some(scores) = result.get_mut("scores").and_then(Value::as_object_mut) {
        for category in STANDARD_CATEGORIES {
            scores.entry(category).or_insert(Value::Null);
        }
        for score in scores.values_mut() {
            *score = json!(score.as_f64().unwrap_or(0.0) * 100.0);
        }
    }
    result
}

/// Posts job outcomes to caller-supplied endpoints.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(config: &WebhookConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build webhook client: {e}")))?;
        Ok(Self { client })
    }

    /// POST `payload` to `url`, with a bearer token when one is given.
    pub async fn deliver(
        &self,
        url: &str,
        token: Option<&str>,
        payload: &WebhookPayload,
    ) -> Result<(), WebhookError> {
        let mut request = self.client.post(url).json(payload);
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WebhookError::HttpStatus(status.as_u16()));
        }
        Ok(())
    }

    /// Deliver to the job's webhook, if it has one. Failures are logged
    /// and dropped.
    pub async fn notify(&self, job: &Job, payload: WebhookPayload) {
        let Some(url) = job.data.webhook_url.as_deref() else {
            return;
        };
        match self.deliver(url, job.data.webhook_token.as_deref(), &payload).await {
            Ok(()) => info!(job_id = %job.id, url = %url, state = %payload.state, "Webhook delivered"),
            Err(e) => warn!(job_id = %job.id, url = %url, error = %e, "Webhook delivery failed"),
        }
    }
}
