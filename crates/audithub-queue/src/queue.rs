//! Queue facade applying retry policy and lock tokens over a [`JobStore`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use audithub_core::config::queue::QueueConfig;
use audithub_core::error::AppError;
use audithub_core::result::AppResult;
use audithub_core::types::id::JobId;
use audithub_entity::job::{AuditJobData, Backoff, BackoffKind, Job, JobOptions, JobState};
use audithub_entity::stats::QueueStats;

use crate::provider::connect_store;
use crate::store::JobStore;

/// A job claimed by a worker together with the token that owns it.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub job: Job,
    pub token: String,
}

impl ClaimedJob {
    pub fn id(&self) -> JobId {
        self.job.id
    }
}

/// The work queue as seen by producers and workers.
#[derive(Debug, Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    options: JobOptions,
    lease: Duration,
}

impl JobQueue {
    /// Wrap a store using the retry and lease settings from configuration.
    pub fn new(store: Arc<dyn JobStore>, config: &QueueConfig) -> AppResult<Self> {
        let kind = match config.backoff_kind.as_str() {
            "exponential" => BackoffKind::Exponential,
            "fixed" => BackoffKind::Fixed,
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown backoff kind: '{other}'. Supported: exponential, fixed"
                )));
            }
        };
        let options = JobOptions {
            attempts: config.attempts.max(1),
            backoff: Backoff {
                kind,
                delay_ms: config.backoff_delay_ms,
            },
        };
        Ok(Self::with_options(
            store,
            options,
            Duration::from_secs(config.lock_duration_seconds),
        ))
    }

    /// Wrap a store with explicit options.
    pub fn with_options(store: Arc<dyn JobStore>, options: JobOptions, lease: Duration) -> Self {
        Self {
            store,
            options,
            lease,
        }
    }

    /// Connect the configured backend and wrap it.
    pub async fn from_config(config: &QueueConfig) -> AppResult<Self> {
        let store = connect_store(config).await?;
        Self::new(store, config)
    }

    /// Enqueue a new job with a fresh id.
    pub async fn add(&self, data: AuditJobData) -> AppResult<Job> {
        let job = Job::new(JobId::new(), data, self.options);
        self.store.enqueue(job.clone()).await?;
        debug!(job_id = %job.id, url = %job.data.url, "Job added");
        Ok(job)
    }

    pub async fn get(&self, id: JobId) -> AppResult<Option<Job>> {
        self.store.get(id).await
    }

    /// Current job counts per state.
    pub async fn stats(&self) -> AppResult<QueueStats> {
        let mut counts = Vec::with_capacity(JobState::ALL.len());
        for state in JobState::ALL {
            counts.push((state, self.store.count_by_state(state).await?));
        }
        Ok(QueueStats::from_counts(counts))
    }

    /// Claim the next runnable job under a fresh lock token.
    pub async fn claim(&self) -> AppResult<Option<ClaimedJob>> {
        let token = Uuid::new_v4().to_string();
        let claimed = self.store.claim_next(&token, self.lease).await?;
        Ok(claimed.map(|job| ClaimedJob { job, token }))
    }

    /// Record success. Returns `false` if the lock was lost meanwhile.
    pub async fn complete(&self, claimed: &ClaimedJob, result: serde_json::Value) -> AppResult<bool> {
        let updated = self.store.complete(claimed.id(), &claimed.token, result).await?;
        if !updated {
            warn!(job_id = %claimed.id(), "Lock lost before completion; result discarded");
        }
        Ok(updated)
    }

    /// Record a failed attempt, scheduling a retry while attempts remain.
    ///
    /// Returns the job's new state, or `None` if the lock was lost meanwhile.
    pub async fn fail(&self, claimed: &ClaimedJob, reason: &str) -> AppResult<Option<JobState>> {
        let job = &claimed.job;
        let retry_at = if job.can_retry() {
            let delay = job.options.backoff.delay_for(job.attempts_made);
            let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
            Some(Utc::now().checked_add_signed(delay).unwrap_or(chrono::DateTime::<Utc>::MAX_UTC))
        } else {
            None
        };

        let state = self.store.fail(job.id, &claimed.token, reason, retry_at).await?;
        match state {
            Some(JobState::Delayed) => info!(
                job_id = %job.id,
                attempt = job.attempts_made,
                max_attempts = job.options.attempts,
                retry_at = ?retry_at,
                "Job attempt failed; retry scheduled"
            ),
            Some(_) => warn!(
                job_id = %job.id,
                attempts = job.attempts_made,
                reason = %reason,
                "Job failed after exhausting attempts"
            ),
            None => warn!(job_id = %job.id, "Lock lost before failure was recorded"),
        }
        Ok(state)
    }

    /// Remove terminal jobs in `state` older than `older_than`.
    pub async fn clean(
        &self,
        older_than: Duration,
        limit: usize,
        state: JobState,
    ) -> AppResult<Vec<JobId>> {
        self.store.sweep(older_than, limit, state).await
    }

    /// Release jobs whose worker stopped renewing the lease.
    pub async fn recover_stalled(&self) -> AppResult<Vec<JobId>> {
        let recovered = self.store.recover_stalled(Utc::now()).await?;
        if !recovered.is_empty() {
            warn!(count = recovered.len(), "Recovered stalled jobs");
        }
        Ok(recovered)
    }

    pub async fn health_check(&self) -> AppResult<()> {
        self.store.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryJobStore;
    use std::collections::HashSet;

    fn queue(attempts: u32) -> JobQueue {
        JobQueue::with_options(
            Arc::new(MemoryJobStore::new()),
            JobOptions {
                attempts,
                backoff: Backoff {
                    kind: BackoffKind::Fixed,
                    delay_ms: 0,
                },
            },
            Duration::from_secs(150),
        )
    }

    fn data(url: &str) -> AuditJobData {
        AuditJobData::new(url, vec!["performance".into()])
    }

    #[tokio::test]
    async fn test_concurrent_claims_are_exclusive() {
        let queue = queue(3);
        for i in 0..20 {
            queue.add(data(&format!("https://{i}.example.com"))).await.unwrap();
        }

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    let mut ids = Vec::new();
                    while let Some(claimed) = queue.claim().await.unwrap() {
                        ids.push(claimed.id());
                    }
                    ids
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for ids in futures::future::join_all(handles).await {
            for id in ids.unwrap() {
                assert!(seen.insert(id), "job {id} claimed twice");
            }
        }
        assert_eq!(seen.len(), 20);
        assert_eq!(queue.stats().await.unwrap().active, 20);
    }

    #[tokio::test]
    async fn test_retry_then_exhaust() {
        let queue = queue(2);
        let job = queue.add(data("https://example.com")).await.unwrap();

        let first = queue.claim().await.unwrap().unwrap();
        assert_eq!(queue.fail(&first, "timeout").await.unwrap(), Some(JobState::Delayed));

        let second = queue.claim().await.unwrap().unwrap();
        assert_eq!(second.id(), job.id);
        assert_eq!(second.job.attempts_made, 2);
        assert_ne!(second.token, first.token);
        assert_eq!(queue.fail(&second, "crashed").await.unwrap(), Some(JobState::Failed));

        let stored = queue.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Failed);
        assert_eq!(stored.failed_reason.as_deref(), Some("crashed"));
        assert!(queue.claim().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stats_total() {
        let queue = queue(1);
        queue.add(data("https://a.example.com")).await.unwrap();
        queue.add(data("https://b.example.com")).await.unwrap();
        let claimed = queue.claim().await.unwrap().unwrap();
        queue.complete(&claimed, serde_json::json!({})).await.unwrap();

        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.waiting, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.total, 2);
    }

    #[test]
    fn test_unknown_backoff_rejected() {
        let config = QueueConfig {
            backoff_kind: "linear".into(),
            ..QueueConfig::default()
        };
        assert!(JobQueue::new(Arc::new(MemoryJobStore::new()), &config).is_err());
    }
}
