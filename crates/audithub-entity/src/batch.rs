//! Batch entities and derived status views.
//!
//! A batch owns no job state. Every view is recomputed from the member
//! jobs currently present in the work queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use audithub_core::types::id::{BatchId, JobId};

use crate::job::{Job, JobState, JobView};

/// Number of urls shown in batch listings.
pub const LISTING_URL_LIMIT: usize = 3;

/// A group of jobs submitted together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRecord {
    pub id: BatchId,
    /// Member jobs in submission order.
    pub job_ids: Vec<JobId>,
    /// Submitted urls, aligned with `job_ids`.
    pub urls: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate status of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Processing,
    Waiting,
    Completed,
    Partial,
    Unknown,
}

impl BatchStatus {
    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Waiting => "waiting",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-state counts over the member jobs still present in the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounts {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub active: usize,
    /// Includes delayed jobs awaiting a retry.
    pub waiting: usize,
}

impl BatchCounts {
    /// Count the given states. Swept members are simply absent.
    pub fn from_states<I>(states: I) -> Self
    where
        I: IntoIterator<Item = JobState>,
    {
        let mut counts = Self::default();
        for state in states {
            counts.total += 1;
            match state {
                JobState::Completed => counts.completed += 1,
                JobState::Failed => counts.failed += 1,
                JobState::Active => counts.active += 1,
                JobState::Waiting | JobState::Delayed => counts.waiting += 1,
            }
        }
        counts
    }

    /// Derive the batch status. The first matching rule wins.
    pub fn status(&self) -> BatchStatus {
        if self.active > 0 {
            BatchStatus::Processing
        } else if self.waiting > 0 {
            BatchStatus::Waiting
        } else if self.total > 0 && self.completed == self.total {
            BatchStatus::Completed
        } else if self.failed > 0 {
            BatchStatus::Partial
        } else {
            BatchStatus::Unknown
        }
    }
}

/// Average `finished_at - processed_at` over completed jobs, rounded to ms.
pub fn average_duration_ms(jobs: &[Job]) -> u64 {
    let durations: Vec<i64> = jobs
        .iter()
        .filter(|job| job.state == JobState::Completed)
        .filter_map(Job::duration_ms)
        .collect();
    if durations.is_empty() {
        return 0;
    }
    let sum: i64 = durations.iter().sum();
    (sum as f64 / durations.len() as f64).round().max(0.0) as u64
}

/// Entry of the batch listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub batch_id: BatchId,
    #[serde(flatten)]
    pub counts: BatchCounts,
    pub status: BatchStatus,
    /// First few submitted urls.
    pub urls: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Full view of one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDetail {
    pub batch_id: BatchId,
    #[serde(flatten)]
    pub counts: BatchCounts,
    pub status: BatchStatus,
    /// Mean duration of completed members in milliseconds.
    pub avg_duration: u64,
    pub jobs: Vec<JobView>,
    pub urls: Vec<String>,
    pub created_at: DateTime<Utc>,
}
