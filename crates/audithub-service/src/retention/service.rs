//! Retention sweeper.
//!
//! Evicts terminal jobs from the work queue and drops batch records that no
//! longer point at anything. Sweeps are idempotent and may run concurrently
//! with each other and with workers.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use audithub_core::config::retention::{RetentionConfig, RetentionPolicy};
use audithub_core::result::AppResult;
use audithub_entity::job::JobState;
use audithub_entity::stats::CleanupSummary;
use audithub_queue::JobQueue;

use crate::batch::BatchTracker;

const HOUR: u64 = 3600;

/// Removes old finished jobs and stale batch records.
#[derive(Debug, Clone)]
pub struct RetentionService {
    queue: JobQueue,
    batches: Arc<BatchTracker>,
    config: RetentionConfig,
}

impl RetentionService {
    pub fn new(queue: JobQueue, batches: Arc<BatchTracker>, config: RetentionConfig) -> Self {
        Self {
            queue,
            batches,
            config,
        }
    }

    /// Scheduled sweep following the configured policy.
    ///
    /// With `age`, only jobs past their retention window are removed and
    /// only orphaned batches are dropped. With `all`, this is
    /// [`cleanup_all`](Self::cleanup_all).
    pub async fn run_scheduled(&self) -> AppResult<CleanupSummary> {
        match self.config.policy {
            RetentionPolicy::All => self.cleanup_all().await,
            RetentionPolicy::Age => {
                let completed = Duration::from_secs(self.config.completed_age_hours * HOUR);
                let failed = Duration::from_secs(self.config.failed_age_hours * HOUR);
                let mut summary = self.sweep(completed, failed, self.config.sweep_limit).await?;
                summary.batches_cleared = self.batches.prune_orphans().await?;
                summary.stats = self.queue.stats().await?;
                log_summary("age", &summary);
                Ok(summary)
            }
        }
    }

    /// Remove every terminal job and forget every batch.
    ///
    /// The sweep limit does not apply here.
    pub async fn cleanup_all(&self) -> AppResult<CleanupSummary> {
        let mut summary = self.sweep(Duration::ZERO, Duration::ZERO, 0).await?;
        summary.batches_cleared = self.batches.clear().await;
        summary.stats = self.queue.stats().await?;
        log_summary("all", &summary);
        Ok(summary)
    }

    async fn sweep(
        &self,
        completed_age: Duration,
        failed_age: Duration,
        limit: usize,
    ) -> AppResult<CleanupSummary> {
        let completed = self.queue.clean(completed_age, limit, JobState::Completed).await?;
        let failed = self.queue.clean(failed_age, limit, JobState::Failed).await?;

        if limit > 0 && (completed.len() == limit || failed.len() == limit) {
            warn!(limit, "Sweep limit reached; remaining jobs are left for the next run");
        }

        Ok(CleanupSummary {
            cleaned: completed.len() + failed.len(),
            completed_cleaned: completed.len(),
            failed_cleaned: failed.len(),
            ..CleanupSummary::default()
        })
    }
}

fn log_summary(policy: &str, summary: &CleanupSummary) {
    info!(
        policy,
        cleaned = summary.cleaned,
        completed = summary.completed_cleaned,
        failed = summary.failed_cleaned,
        batches_cleared = summary.batches_cleared,
        "Retention sweep finished"
    );
}
