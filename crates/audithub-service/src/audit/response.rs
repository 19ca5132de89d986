//! Submission responses.

use serde::{Deserialize, Serialize};

use audithub_core::types::id::{BatchId, JobId};

/// Status reported for freshly accepted work.
pub const QUEUED: &str = "queued";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAuditResponse {
    pub job_id: JobId,
    pub url: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBatchResponse {
    pub batch_id: BatchId,
    pub job_ids: Vec<JobId>,
    pub total: usize,
    pub status: String,
}
