//! Job entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use audithub_core::types::id::{BatchId, JobId};

use super::options::JobOptions;
use super::state::JobState;

/// Audit parameters carried by a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditJobData {
    /// Page to audit.
    pub url: String,
    /// Audit dimensions to run.
    pub categories: Vec<String>,
    /// Report locale (e.g. `"en"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Endpoint notified when the job finishes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    /// Bearer token sent with the webhook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_token: Option<String>,
    /// Batch the job belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<BatchId>,
}

impl AuditJobData {
    /// Create job data for a single URL.
    pub fn new(url: impl Into<String>, categories: Vec<String>) -> Self {
        Self {
            url: url.into(),
            categories,
            locale: None,
            webhook_url: None,
            webhook_token: None,
            batch_id: None,
        }
    }

    /// Copy of the data without the webhook secret.
    pub fn redacted(&self) -> Self {
        Self {
            webhook_token: None,
            ..self.clone()
        }
    }
}

/// Lock held by the worker that claimed an active job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobLock {
    /// Token the owner must present to finish the job.
    pub token: String,
    /// When the lease lapses and the job becomes recoverable.
    pub expires_at: DateTime<Utc>,
}

/// One audit request tracked by the work queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// Audit parameters.
    pub data: AuditJobData,
    /// Current lifecycle state.
    pub state: JobState,
    /// Progress percentage.
    pub progress: u8,
    /// Attempts started so far.
    pub attempts_made: u32,
    /// Retry options.
    pub options: JobOptions,
    /// Executor payload on success.
    pub result: Option<serde_json::Value>,
    /// Reason of the last failed attempt.
    pub failed_reason: Option<String>,
    /// When the job was enqueued.
    pub created_at: DateTime<Utc>,
    /// When the latest attempt started.
    pub processed_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// When a delayed job becomes claimable again.
    pub delayed_until: Option<DateTime<Utc>>,
    /// Active lock, present only while the job is claimed.
    pub lock: Option<JobLock>,
}

impl Job {
    /// Build a new waiting job.
    pub fn new(id: JobId, data: AuditJobData, options: JobOptions) -> Self {
        Self {
            id,
            data,
            state: JobState::Waiting,
            progress: 0,
            attempts_made: 0,
            options,
            result: None,
            failed_reason: None,
            created_at: Utc::now(),
            processed_at: None,
            finished_at: None,
            delayed_until: None,
            lock: None,
        }
    }

    /// Check if another attempt is allowed after the current one fails.
    pub fn can_retry(&self) -> bool {
        self.attempts_made < self.options.attempts
    }

    /// Wall time of the latest attempt, for finished jobs.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.processed_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }

    /// Check whether `token` owns the job's current lock.
    pub fn is_locked_by(&self, token: &str) -> bool {
        self.state == JobState::Active && self.lock.as_ref().is_some_and(|l| l.token == token)
    }

    /// Check whether the lease on an active job has lapsed.
    pub fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Active && self.lock.as_ref().is_some_and(|l| l.expires_at <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn job() -> Job {
        Job::new(
            JobId::new(),
            AuditJobData::new("https://example.com", vec!["performance".into()]),
            JobOptions::default(),
        )
    }

    #[test]
    fn test_new_job_is_waiting() {
        let job = job();
        assert_eq!(job.state, JobState::Waiting);
        assert_eq!(job.progress, 0);
        assert!(job.can_retry());
        assert!(job.duration_ms().is_none());
    }

    #[test]
    fn test_retry_exhausted() {
        let mut job = job();
        job.attempts_made = 3;
        assert!(!job.can_retry());
    }

    #[test]
    fn test_lock_ownership() {
        let mut job = job();
        job.state = JobState::Active;
        job.lock = Some(JobLock {
            token: "abc".into(),
            expires_at: Utc::now() + Duration::seconds(150),
        });
        assert!(job.is_locked_by("abc"));
        assert!(!job.is_locked_by("other"));
        assert!(!job.lease_expired(Utc::now()));
        assert!(job.lease_expired(Utc::now() + Duration::seconds(151)));
    }

    #[test]
    fn test_redacted_drops_token() {
        let mut data = AuditJobData::new("https://example.com", vec![]);
        data.webhook_token = Some("secret".into());
        data.webhook_url = Some("https://hooks.example.com".into());
        let redacted = data.redacted();
        assert!(redacted.webhook_token.is_none());
        assert_eq!(redacted.webhook_url, data.webhook_url);
    }

    #[test]
    fn test_data_serializes_camel_case() {
        let mut data = AuditJobData::new("https://example.com", vec!["seo".into()]);
        data.webhook_url = Some("https://hooks.example.com".into());
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["webhookUrl"], "https://hooks.example.com");
        assert!(value.get("locale").is_none());
    }
}
