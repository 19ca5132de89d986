//! Caller-facing job representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use audithub_core::types::id::JobId;

use super::model::{AuditJobData, Job};
use super::state::JobState;

/// Job status as returned to callers. The webhook token is never exposed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub job_id: JobId,
    pub status: JobState,
    pub progress: u8,
    pub data: AuditJobData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_reason: Option<String>,
    pub attempts_made: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.state,
            progress: job.progress,
            data: job.data.redacted(),
            result: job.result.clone(),
            failed_reason: job.failed_reason.clone(),
            attempts_made: job.attempts_made,
            created_at: job.created_at,
            processed_at: job.processed_at,
            finished_at: job.finished_at,
        }
    }
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        Self::from(&job)
    }
}
