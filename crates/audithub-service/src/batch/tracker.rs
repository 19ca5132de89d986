//! Batch tracker.
//!
//! Holds only batch membership. Counts and status are recomputed from the
//! work queue on every query, so there is nothing to keep in sync when jobs
//! change state. Records live for the lifetime of the process.

use std::collections::HashMap;

use chrono::Utc;
use futures::future::try_join_all;
use tokio::sync::RwLock;
use tracing::{debug, info};

use audithub_core::error::AppError;
use audithub_core::result::AppResult;
use audithub_core::types::id::{BatchId, JobId};
use audithub_entity::batch::{
    BatchCounts, BatchDetail, BatchRecord, BatchSummary, LISTING_URL_LIMIT, average_duration_ms,
};
use audithub_entity::job::{Job, JobView};
use audithub_queue::JobQueue;

#[derive(Debug, Default)]
struct BatchMap {
    records: HashMap<BatchId, BatchRecord>,
    /// Insertion order, oldest first.
    order: Vec<BatchId>,
}

impl BatchMap {
    fn remove(&mut self, id: BatchId) -> bool {
        let removed = self.records.remove(&id).is_some();
        if removed {
            self.order.retain(|b| *b != id);
        }
        removed
    }
}

/// Tracks which jobs belong to which batch.
#[derive(Debug)]
pub struct BatchTracker {
    queue: JobQueue,
    inner: RwLock<BatchMap>,
}

impl BatchTracker {
    pub fn new(queue: JobQueue) -> Self {
        Self {
            queue,
            inner: RwLock::new(BatchMap::default()),
        }
    }

    /// Start tracking a batch of already enqueued jobs.
    pub async fn register(&self, batch_id: BatchId, job_ids: Vec<JobId>, urls: Vec<String>) -> BatchRecord {
        let record = BatchRecord {
            id: batch_id,
            job_ids,
            urls,
            created_at: Utc::now(),
        };
        let mut inner = self.inner.write().await;
        if inner.records.insert(batch_id, record.clone()).is_none() {
            inner.order.push(batch_id);
        }
        debug!(batch_id = %batch_id, jobs = record.job_ids.len(), "Batch registered");
        record
    }

    /// Tracked record, if any.
    pub async fn get(&self, batch_id: BatchId) -> Option<BatchRecord> {
        self.inner.read().await.records.get(&batch_id).cloned()
    }

    /// Full status of one batch.
    pub async fn batch_status(&self, batch_id: BatchId) -> AppResult<BatchDetail> {
        let record = self
            .get(batch_id)
            .await
            .ok_or_else(|| AppError::not_found(format!("Batch {batch_id} not found")))?;

        let jobs = self.member_jobs(&record).await?;
        let counts = BatchCounts::from_states(jobs.iter().map(|job| job.state));

        Ok(BatchDetail {
            batch_id,
            counts,
            status: counts.status(),
            avg_duration: average_duration_ms(&jobs),
            jobs: jobs.iter().map(JobView::from).collect(),
            urls: record.urls,
            created_at: record.created_at,
        })
    }

    /// Summaries of every tracked batch, most recent first.
    ///
    /// Batches whose members have all been swept are dropped.
    pub async fn list_batches(&self) -> AppResult<Vec<BatchSummary>> {
        let records: Vec<BatchRecord> = {
            let inner = self.inner.read().await;
            inner
                .order
                .iter()
                .rev()
                .filter_map(|id| inner.records.get(id).cloned())
                .collect()
        };

        let mut summaries = Vec::with_capacity(records.len());
        let mut orphaned = Vec::new();
        for record in records {
            let jobs = self.member_jobs(&record).await?;
            let counts = BatchCounts::from_states(jobs.iter().map(|job| job.state));
            if counts.total == 0 {
                orphaned.push(record.id);
                continue;
            }
            summaries.push(BatchSummary {
                batch_id: record.id,
                counts,
                status: counts.status(),
                urls: record.urls.into_iter().take(LISTING_URL_LIMIT).collect(),
                created_at: record.created_at,
            });
        }

        if !orphaned.is_empty() {
            self.forget(&orphaned).await;
        }
        Ok(summaries)
    }

    /// Drop batches none of whose members remain in the queue.
    pub async fn prune_orphans(&self) -> AppResult<usize> {
        let records: Vec<BatchRecord> = self.inner.read().await.records.values().cloned().collect();

        let mut orphaned = Vec::new();
        for record in records {
            if self.member_jobs(&record).await?.is_empty() {
                orphaned.push(record.id);
            }
        }
        Ok(self.forget(&orphaned).await)
    }

    /// Drop every tracked batch. Returns how many were removed.
    pub async fn clear(&self) -> usize {
        let mut inner = self.inner.write().await;
        let cleared = inner.records.len();
        inner.records.clear();
        inner.order.clear();
        if cleared > 0 {
            info!(cleared, "Cleared batch records");
        }
        cleared
    }

    async fn forget(&self, ids: &[BatchId]) -> usize {
        let mut inner = self.inner.write().await;
        let removed = ids.iter().filter(|id| inner.remove(**id)).count();
        if removed > 0 {
            debug!(removed, "Pruned orphaned batches");
        }
        removed
    }

    /// Member jobs still present in the queue, in submission order.
    async fn member_jobs(&self, record: &BatchRecord) -> AppResult<Vec<Job>> {
        let fetched = try_join_all(record.job_ids.iter().map(|id| self.queue.get(*id))).await?;
        Ok(fetched.into_iter().flatten().collect())
    }
}
