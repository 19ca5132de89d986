//! Redis-backed [`JobStore`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Script};
use tracing::debug;

use audithub_core::error::{AppError, ErrorKind};
use audithub_core::result::AppResult;
use audithub_core::types::id::JobId;
use audithub_entity::job::{Backoff, BackoffKind, Job, JobLock, JobOptions, JobState};

use super::client::RedisClient;
use super::keys::QueueKeys;
use super::scripts;
use crate::store::{JobStore, STALLED_REASON, cutoff, ensure_sweepable, lease_expiry};

/// Shared, durable job store. Every state transition runs as one Lua script.
#[derive(Debug, Clone)]
pub struct RedisJobStore {
    client: RedisClient,
    keys: QueueKeys,
    scripts: Scripts,
}

#[derive(Debug, Clone)]
struct Scripts {
    enqueue: Script,
    claim: Script,
    complete: Script,
    fail: Script,
    recover_stalled: Script,
    sweep: Script,
}

impl Scripts {
    fn load() -> Self {
        Self {
            enqueue: Script::new(scripts::ENQUEUE),
            claim: Script::new(scripts::CLAIM),
            complete: Script::new(scripts::COMPLETE),
            fail: Script::new(scripts::FAIL),
            recover_stalled: Script::new(scripts::RECOVER_STALLED),
            sweep: Script::new(scripts::SWEEP),
        }
    }
}

impl RedisJobStore {
    /// Create a store for the named queue.
    pub fn new(client: RedisClient, key_prefix: &str, queue_name: &str) -> Self {
        Self {
            client,
            keys: QueueKeys::new(key_prefix, queue_name),
            scripts: Scripts::load(),
        }
    }

    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Queue, format!("Redis error: {e}"), e)
    }

    async fn load_job(&self, id: JobId) -> AppResult<Option<Job>> {
        let mut conn = self.client.conn();
        let fields: HashMap<String, String> = conn
            .hgetall(self.keys.job(id))
            .await
            .map_err(Self::map_err)?;
        if fields.is_empty() {
            return Ok(None);
        }
        decode_job(id, &fields).map(Some)
    }

    fn parse_ids(raw: Vec<String>) -> Vec<JobId> {
        raw.iter().filter_map(|s| JobId::parse(s)).collect()
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn enqueue(&self, job: Job) -> AppResult<()> {
        let fields = encode_job(&job)?;
        let mut invocation = self.scripts.enqueue.prepare_invoke();
        invocation
            .key(self.keys.job(job.id))
            .key(self.keys.wait())
            .arg(job.id.to_string());
        for (name, value) in &fields {
            invocation.arg(*name).arg(value);
        }

        let mut conn = self.client.conn();
        let inserted: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        if inserted == 0 {
            return Err(AppError::conflict(format!("Job {} already exists", job.id)));
        }
        debug!(job_id = %job.id, "Job enqueued in Redis");
        Ok(())
    }

    async fn get(&self, id: JobId) -> AppResult<Option<Job>> {
        self.load_job(id).await
    }

    async fn count_by_state(&self, state: JobState) -> AppResult<u64> {
        let mut conn = self.client.conn();
        let key = self.keys.index(state);
        let count: redis::RedisResult<u64> = match state {
            JobState::Waiting => conn.llen(key).await,
            _ => conn.zcard(key).await,
        };
        count.map_err(Self::map_err)
    }

    async fn sweep(
        &self,
        older_than: Duration,
        limit: usize,
        state: JobState,
    ) -> AppResult<Vec<JobId>> {
        ensure_sweepable(state)?;
        let mut conn = self.client.conn();
        let removed: Vec<String> = self
            .scripts
            .sweep
            .key(self.keys.index(state))
            .arg(cutoff(older_than).timestamp_millis())
            .arg(limit)
            .arg(self.keys.job_prefix())
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(Self::parse_ids(removed))
    }

    async fn claim_next(&self, lock_token: &str, lease: Duration) -> AppResult<Option<Job>> {
        let now = Utc::now();
        let mut conn = self.client.conn();
        let claimed: Option<String> = self
            .scripts
            .claim
            .key(self.keys.wait())
            .key(self.keys.delayed())
            .key(self.keys.active())
            .arg(now.timestamp_millis())
            .arg(lock_token)
            .arg(lease_expiry(now, lease).timestamp_millis())
            .arg(self.keys.job_prefix())
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        let Some(id) = claimed.as_deref().and_then(JobId::parse) else {
            return Ok(None);
        };
        self.load_job(id).await
    }

    async fn complete(
        &self,
        id: JobId,
        lock_token: &str,
        result: serde_json::Value,
    ) -> AppResult<bool> {
        let mut conn = self.client.conn();
        let updated: i64 = self
            .scripts
            .complete
            .key(self.keys.job(id))
            .key(self.keys.active())
            .key(self.keys.completed())
            .arg(lock_token)
            .arg(Utc::now().timestamp_millis())
            .arg(serde_json::to_string(&result)?)
            .arg(id.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(updated == 1)
    }

    async fn fail(
        &self,
        id: JobId,
        lock_token: &str,
        reason: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> AppResult<Option<JobState>> {
        let mut conn = self.client.conn();
        let state: Option<String> = self
            .scripts
            .fail
            .key(self.keys.job(id))
            .key(self.keys.active())
            .key(self.keys.delayed())
            .key(self.keys.failed())
            .arg(lock_token)
            .arg(Utc::now().timestamp_millis())
            .arg(reason)
            .arg(retry_at.map(|at| at.timestamp_millis().max(0)).unwrap_or(-1))
            .arg(id.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        state
            .map(|s| s.parse::<JobState>().map_err(AppError::queue))
            .transpose()
    }

    async fn recover_stalled(&self, now: DateTime<Utc>) -> AppResult<Vec<JobId>> {
        let mut conn = self.client.conn();
        let recovered: Vec<String> = self
            .scripts
            .recover_stalled
            .key(self.keys.active())
            .key(self.keys.wait())
            .key(self.keys.failed())
            .arg(now.timestamp_millis())
            .arg(self.keys.job_prefix())
            .arg(STALLED_REASON)
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(Self::parse_ids(recovered))
    }

    async fn health_check(&self) -> AppResult<()> {
        let mut conn = self.client.conn();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }
}

/// Flatten a job into hash fields. Absent optionals are omitted.
fn encode_job(job: &Job) -> AppResult<Vec<(&'static str, String)>> {
    let mut fields = vec![
        ("data", serde_json::to_string(&job.data)?),
        ("state", job.state.as_str().to_string()),
        ("progress", job.progress.to_string()),
        ("attempts_made", job.attempts_made.to_string()),
        ("max_attempts", job.options.attempts.to_string()),
        ("backoff_kind", backoff_kind_str(job.options.backoff.kind).to_string()),
        ("backoff_delay_ms", job.options.backoff.delay_ms.to_string()),
        ("created_at", job.created_at.timestamp_millis().to_string()),
    ];
    if let Some(result) = &job.result {
        fields.push(("result", serde_json::to_string(result)?));
    }
    if let Some(reason) = &job.failed_reason {
        fields.push(("failed_reason", reason.clone()));
    }
    for (name, at) in [
        ("processed_at", job.processed_at),
        ("finished_at", job.finished_at),
        ("delayed_until", job.delayed_until),
    ] {
        if let Some(at) = at {
            fields.push((name, at.timestamp_millis().to_string()));
        }
    }
    if let Some(lock) = &job.lock {
        fields.push(("lock_token", lock.token.clone()));
        fields.push(("lock_expires_at", lock.expires_at.timestamp_millis().to_string()));
    }
    Ok(fields)
}

/// Rebuild a job from its hash fields.
fn decode_job(id: JobId, fields: &HashMap<String, String>) -> AppResult<Job> {
    let field = |name: &str| fields.get(name).map(String::as_str);
    let required = |name: &str| {
        field(name).ok_or_else(|| AppError::queue(format!("Job {id} is missing field '{name}'")))
    };
    let number = |name: &str| -> AppResult<u64> {
        field(name)
            .unwrap_or("0")
            .parse()
            .map_err(|_| AppError::queue(format!("Job {id} has a malformed '{name}'")))
    };
    let timestamp = |name: &str| {
        field(name)
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    };

    let state = required("state")?
        .parse::<JobState>()
        .map_err(AppError::queue)?;
    let backoff_kind = match field("backoff_kind") {
        Some("fixed") => BackoffKind::Fixed,
        _ => BackoffKind::Exponential,
    };
    let lock = match (field("lock_token"), timestamp("lock_expires_at")) {
        (Some(token), Some(expires_at)) => Some(JobLock {
            token: token.to_string(),
            expires_at,
        }),
        _ => None,
    };

    Ok(Job {
        id,
        data: serde_json::from_str(required("data")?)?,
        state,
        progress: number("progress")?.min(100) as u8,
        attempts_made: number("attempts_made")? as u32,
        options: JobOptions {
            attempts: number("max_attempts")? as u32,
            backoff: Backoff {
                kind: backoff_kind,
                delay_ms: number("backoff_delay_ms")?,
            },
        },
        result: field("result").map(serde_json::from_str).transpose()?,
        failed_reason: field("failed_reason").map(str::to_string),
        created_at: timestamp("created_at").unwrap_or_else(Utc::now),
        processed_at: timestamp("processed_at"),
        finished_at: timestamp("finished_at"),
        delayed_until: timestamp("delayed_until"),
        lock,
    })
}

fn backoff_kind_str(kind: BackoffKind) -> &'static str {
    match kind {
        BackoffKind::Exponential => "exponential",
        BackoffKind::Fixed => "fixed",
    }
}
