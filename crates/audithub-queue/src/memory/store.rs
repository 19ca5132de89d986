//! In-memory job store backed by a mutex-guarded map and FIFO list.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use audithub_core::error::AppError;
use audithub_core::result::AppResult;
use audithub_core::types::id::JobId;
use audithub_entity::job::{Job, JobLock, JobState};

use crate::store::{JobStore, STALLED_REASON, cutoff, ensure_sweepable, lease_expiry};

#[derive(Debug, Default)]
struct Inner {
    jobs: HashMap<JobId, Job>,
    /// Waiting job ids, oldest at the front.
    waiting: VecDeque<JobId>,
}

impl Inner {
    fn promote_due(&mut self, now: DateTime<Utc>) {
        let mut due: Vec<(DateTime<Utc>, JobId)> = self
            .jobs
            .values()
            .filter(|job| job.state == JobState::Delayed)
            .filter_map(|job| match job.delayed_until {
                Some(at) if at <= now => Some((at, job.id)),
                None => Some((now, job.id)),
                _ => None,
            })
            .collect();
        due.sort();

        for (_, id) in due {
            if let Some(job) = self.jobs.get_mut(&id) {
                job.state = JobState::Waiting;
                job.delayed_until = None;
                self.waiting.push_back(id);
            }
        }
    }
}

/// Single-process [`JobStore`].
///
/// Not shared across processes; intended for development and tests.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

impl MemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn enqueue(&self, job: Job) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.jobs.contains_key(&job.id) {
            return Err(AppError::conflict(format!("Job {} already exists", job.id)));
        }
        let id = job.id;
        inner.jobs.insert(id, job);
        inner.waiting.push_back(id);
        Ok(())
    }

    async fn get(&self, id: JobId) -> AppResult<Option<Job>> {
        Ok(self.inner.lock().await.jobs.get(&id).cloned())
    }

    async fn count_by_state(&self, state: JobState) -> AppResult<u64> {
        let inner = self.inner.lock().await;
        Ok(inner.jobs.values().filter(|j| j.state == state).count() as u64)
    }

    async fn sweep(
        &self,
        older_than: Duration,
        limit: usize,
        state: JobState,
    ) -> AppResult<Vec<JobId>> {
        ensure_sweepable(state)?;
        let cutoff = cutoff(older_than);
        let mut inner = self.inner.lock().await;

        let mut candidates: Vec<(DateTime<Utc>, JobId)> = inner
            .jobs
            .values()
            .filter(|job| job.state == state)
            .filter_map(|job| job.finished_at.map(|at| (at, job.id)))
            .filter(|(at, _)| *at <= cutoff)
            .collect();
        candidates.sort();
        if limit > 0 {
            candidates.truncate(limit);
        }

        let removed: Vec<JobId> = candidates.into_iter().map(|(_, id)| id).collect();
        for id in &removed {
            inner.jobs.remove(id);
        }
        Ok(removed)
    }

    async fn claim_next(&self, lock_token: &str, lease: Duration) -> AppResult<Option<Job>> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        inner.promote_due(now);

        while let Some(id) = inner.waiting.pop_front() {
            let Some(job) = inner.jobs.get_mut(&id) else {
                continue;
            };
            if job.state != JobState::Waiting {
                continue;
            }
            job.state = JobState::Active;
            job.attempts_made += 1;
            job.progress = 0;
            job.processed_at = Some(now);
            job.lock = Some(JobLock {
                token: lock_token.to_string(),
                expires_at: lease_expiry(now, lease),
            });
            return Ok(Some(job.clone()));
        }
        Ok(None)
    }

    async fn complete(
        &self,
        id: JobId,
        lock_token: &str,
        result: serde_json::Value,
    ) -> AppResult<bool> {
        let mut inner = self.inner.lock().await;
        let Some(job) = inner.jobs.get_mut(&id) else {
            return Ok(false);
        };
        if !job.is_locked_by(lock_token) {
            return Ok(false);
        }
        job.state = JobState::Completed;
        job.progress = 100;
        job.result = Some(result);
        job.failed_reason = None;
        job.finished_at = Some(Utc::now());
        job.lock = None;
        Ok(true)
    }

    async fn fail(
        &self,
        id: JobId,
        lock_token: &str,
        reason: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> AppResult<Option<JobState>> {
        let mut inner = self.inner.lock().await;
        let Some(job) = inner.jobs.get_mut(&id) else {
            return Ok(None);
        };
        if !job.is_locked_by(lock_token) {
            return Ok(None);
        }
        job.lock = None;
        job.failed_reason = Some(reason.to_string());
        match retry_at {
            Some(at) => {
                job.state = JobState::Delayed;
                job.delayed_until = Some(at);
            }
            None => {
                job.state = JobState::Failed;
                job.progress = 100;
                job.finished_at = Some(Utc::now());
            }
        }
        Ok(Some(job.state))
    }

    async fn recover_stalled(&self, now: DateTime<Utc>) -> AppResult<Vec<JobId>> {
        let mut inner = self.inner.lock().await;
        let Inner { jobs, waiting } = &mut *inner;

        let mut recovered = Vec::new();
        for job in jobs.values_mut().filter(|job| job.lease_expired(now)) {
            job.lock = None;
            if job.can_retry() {
                job.state = JobState::Waiting;
                waiting.push_front(job.id);
            } else {
                job.state = JobState::Failed;
                job.progress = 100;
                job.failed_reason = Some(STALLED_REASON.to_string());
                job.finished_at = Some(now);
            }
            recovered.push(job.id);
        }
        Ok(recovered)
    }

    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audithub_entity::job::{AuditJobData, JobOptions};

    const LEASE: Duration = Duration::from_secs(150);

    fn new_job(url: &str) -> Job {
        Job::new(
            JobId::new(),
            AuditJobData::new(url, vec!["performance".into()]),
            JobOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_claim_is_fifo() {
        let store = MemoryJobStore::new();
        let first = new_job("https://a.example.com");
        let second = new_job("https://b.example.com");
        store.enqueue(first.clone()).await.unwrap();
        store.enqueue(second.clone()).await.unwrap();

        let claimed = store.claim_next("t1", LEASE).await.unwrap().unwrap();
        assert_eq!(claimed.id, first.id);
        assert_eq!(claimed.state, JobState::Active);
        assert_eq!(claimed.attempts_made, 1);
        assert!(claimed.processed_at.is_some());

        let claimed = store.claim_next("t2", LEASE).await.unwrap().unwrap();
        assert_eq!(claimed.id, second.id);
        assert!(store.claim_next("t3", LEASE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_enqueue_conflicts() {
        let store = MemoryJobStore::new();
        let job = new_job("https://example.com");
        store.enqueue(job.clone()).await.unwrap();
        let err = store.enqueue(job).await.unwrap_err();
        assert_eq!(err.kind, audithub_core::error::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_stale_token_cannot_finish() {
        let store = MemoryJobStore::new();
        let job = new_job("https://example.com");
        store.enqueue(job.clone()).await.unwrap();
        store.claim_next("owner", LEASE).await.unwrap();

        assert!(!store.complete(job.id, "intruder", serde_json::json!({})).await.unwrap());
        assert!(store.fail(job.id, "intruder", "boom", None).await.unwrap().is_none());
        assert!(store.complete(job.id, "owner", serde_json::json!({"ok": true})).await.unwrap());

        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Completed);
        assert_eq!(stored.progress, 100);
        assert!(stored.lock.is_none());
        // Already finished: the owner cannot finish it twice.
        assert!(!store.complete(job.id, "owner", serde_json::json!({})).await.unwrap());
    }

    #[tokio::test]
    async fn test_delayed_job_promoted_when_due() {
        let store = MemoryJobStore::new();
        let job = new_job("https://example.com");
        store.enqueue(job.clone()).await.unwrap();
        store.claim_next("t1", LEASE).await.unwrap();

        let later = Utc::now() + chrono::Duration::hours(1);
        let state = store.fail(job.id, "t1", "timeout", Some(later)).await.unwrap();
        assert_eq!(state, Some(JobState::Delayed));
        assert!(store.claim_next("t2", LEASE).await.unwrap().is_none());
        assert_eq!(store.count_by_state(JobState::Delayed).await.unwrap(), 1);

        let past = Utc::now() - chrono::Duration::seconds(1);
        store.inner.lock().await.jobs.get_mut(&job.id).unwrap().delayed_until = Some(past);
        let reclaimed = store.claim_next("t2", LEASE).await.unwrap().unwrap();
        assert_eq!(reclaimed.id, job.id);
        assert_eq!(reclaimed.attempts_made, 2);
        assert_eq!(reclaimed.failed_reason.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_sweep_respects_age_and_limit() {
        let store = MemoryJobStore::new();
        let mut ids = Vec::new();
        for i in 0..3 {
            let job = new_job(&format!("https://{i}.example.com"));
            ids.push(job.id);
            store.enqueue(job).await.unwrap();
            let claimed = store.claim_next("t", LEASE).await.unwrap().unwrap();
            store.complete(claimed.id, "t", serde_json::json!({})).await.unwrap();
        }

        let swept = store
            .sweep(Duration::from_secs(3600), 0, JobState::Completed)
            .await
            .unwrap();
        assert!(swept.is_empty());

        let swept = store.sweep(Duration::ZERO, 2, JobState::Completed).await.unwrap();
        assert_eq!(swept.len(), 2);
        assert_eq!(store.count_by_state(JobState::Completed).await.unwrap(), 1);
        for id in swept {
            assert!(store.get(id).await.unwrap().is_none());
        }

        assert!(store.sweep(Duration::ZERO, 0, JobState::Active).await.is_err());
    }

    #[tokio::test]
    async fn test_recover_stalled() {
        let store = MemoryJobStore::new();
        let retryable = new_job("https://a.example.com");
        let mut exhausted = new_job("https://b.example.com");
        exhausted.options.attempts = 1;
        store.enqueue(retryable.clone()).await.unwrap();
        store.enqueue(exhausted.clone()).await.unwrap();
        store.claim_next("t1", Duration::from_secs(1)).await.unwrap();
        store.claim_next("t2", Duration::from_secs(1)).await.unwrap();

        assert!(store.recover_stalled(Utc::now()).await.unwrap().is_empty());

        let later = Utc::now() + chrono::Duration::seconds(5);
        let mut recovered = store.recover_stalled(later).await.unwrap();
        recovered.sort();
        let mut expected = vec![retryable.id, exhausted.id];
        expected.sort();
        assert_eq!(recovered, expected);

        let job = store.get(retryable.id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Waiting);
        let job = store.get(exhausted.id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.failed_reason.as_deref(), Some(STALLED_REASON));

        // The stale owner of the recovered job can no longer finish it.
        assert!(!store.complete(retryable.id, "t1", serde_json::json!({})).await.unwrap());
        let reclaimed = store.claim_next("t3", LEASE).await.unwrap().unwrap();
        assert_eq!(reclaimed.id, retryable.id);
    }
}
