//! Storage contract shared by the queue backends.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use audithub_core::result::AppResult;
use audithub_core::types::id::JobId;
use audithub_entity::job::{Job, JobState};

/// Reason recorded on jobs that exhausted their attempts while stalled.
pub const STALLED_REASON: &str = "job stalled: lock lease expired too many times";

/// Durable store of job records.
///
/// Every method is a single atomic transition. Finishing a job requires the
/// lock token handed out by [`JobStore::claim_next`], so a worker whose lease
/// was recovered cannot overwrite the new owner's outcome.
#[async_trait]
pub trait JobStore: Send + Sync + Debug + 'static {
    /// Insert a new waiting job. Fails with a conflict if the id exists.
    async fn enqueue(&self, job: Job) -> AppResult<()>;

    /// Fetch a job by id.
    async fn get(&self, id: JobId) -> AppResult<Option<Job>>;

    /// Number of jobs currently in `state`.
    async fn count_by_state(&self, state: JobState) -> AppResult<u64>;

    /// Remove up to `limit` terminal jobs in `state` that finished more than
    /// `older_than` ago, oldest first. A `limit` of 0 removes every match.
    async fn sweep(
        &self,
        older_than: Duration,
        limit: usize,
        state: JobState,
    ) -> AppResult<Vec<JobId>>;

    /// Promote due delayed jobs, then take the oldest waiting job and mark it
    /// active under `lock_token` for `lease`.
    async fn claim_next(&self, lock_token: &str, lease: Duration) -> AppResult<Option<Job>>;

    /// Mark an active job completed. Returns `false` when the token does not
    /// own the job.
    async fn complete(
        &self,
        id: JobId,
        lock_token: &str,
        result: serde_json::Value,
    ) -> AppResult<bool>;

    /// Record a failed attempt. With `retry_at` the job becomes delayed until
    /// then; without it the job is failed for good. Returns the new state, or
    /// `None` when the token does not own the job.
    async fn fail(
        &self,
        id: JobId,
        lock_token: &str,
        reason: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> AppResult<Option<JobState>>;

    /// Release active jobs whose lease expired before `now`. Jobs with
    /// attempts left return to waiting; the rest fail with [`STALLED_REASON`].
    async fn recover_stalled(&self, now: DateTime<Utc>) -> AppResult<Vec<JobId>>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> AppResult<()>;
}

/// Reject sweeps of states that still have work pending.
pub(crate) fn ensure_sweepable(state: JobState) -> AppResult<()> {
    if state.is_terminal() {
        Ok(())
    } else {
        Err(audithub_core::AppError::validation(format!(
            "Only terminal jobs can be swept, got '{state}'"
        )))
    }
}

/// Convert a relative age into an absolute cutoff.
pub(crate) fn cutoff(older_than: Duration) -> DateTime<Utc> {
    let age = chrono::Duration::from_std(older_than).unwrap_or(chrono::Duration::MAX);
    Utc::now()
        .checked_sub_signed(age)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Convert a lease into an absolute expiry.
pub(crate) fn lease_expiry(now: DateTime<Utc>, lease: Duration) -> DateTime<Utc> {
    let lease = chrono::Duration::from_std(lease).unwrap_or(chrono::Duration::MAX);
    now.checked_add_signed(lease).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
