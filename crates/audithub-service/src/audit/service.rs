//! Job submission facade.

use std::sync::Arc;

use tracing::{info, warn};
use validator::Validate;

use audithub_core::error::AppError;
use audithub_core::result::AppResult;
use audithub_core::types::id::{BatchId, JobId};
use audithub_entity::batch::{BatchDetail, BatchSummary};
use audithub_entity::job::{AuditJobData, JobView};
use audithub_entity::stats::{CleanupSummary, QueueStats};
use audithub_queue::JobQueue;

use super::request::{SubmitAuditRequest, SubmitBatchRequest, into_app_error, resolve_categories};
use super::response::{QUEUED, SubmitAuditResponse, SubmitBatchResponse};
use crate::batch::BatchTracker;
use crate::retention::RetentionService;

/// Entry point for submitting audits and querying their progress.
#[derive(Debug, Clone)]
pub struct AuditService {
    queue: JobQueue,
    batches: Arc<BatchTracker>,
    retention: Arc<RetentionService>,
}

impl AuditService {
    pub fn new(queue: JobQueue, batches: Arc<BatchTracker>, retention: Arc<RetentionService>) -> Self {
        Self {
            queue,
            batches,
            retention,
        }
    }

    /// Validate and enqueue a single audit.
    pub async fn submit_audit(&self, req: SubmitAuditRequest) -> AppResult<SubmitAuditResponse> {
        req.validate().map_err(into_app_error)?;

        let data = AuditJobData {
            url: req.url.trim().to_string(),
            categories: resolve_categories(req.categories.as_deref()),
            locale: req.locale,
            webhook_url: req.webhook_url,
            webhook_token: req.webhook_token,
            batch_id: None,
        };
        let job = self.queue.add(data).await?;

        info!(job_id = %job.id, url = %job.data.url, "Audit queued");
        Ok(SubmitAuditResponse {
            job_id: job.id,
            url: job.data.url,
            status: QUEUED.to_string(),
        })
    }

    /// Validate and enqueue one job per url, grouped under a new batch.
    ///
    /// Nothing is enqueued when validation fails.
    pub async fn submit_batch(&self, req: SubmitBatchRequest) -> AppResult<SubmitBatchResponse> {
        req.validate().map_err(into_app_error)?;

        let batch_id = BatchId::new();
        let categories = resolve_categories(req.categories.as_deref());
        let urls: Vec<String> = req.urls.iter().map(|u| u.trim().to_string()).collect();

        let mut job_ids = Vec::with_capacity(urls.len());
        for url in &urls {
            let data = AuditJobData {
                url: url.clone(),
                categories: categories.clone(),
                locale: req.locale.clone(),
                webhook_url: req.webhook_url.clone(),
                webhook_token: req.webhook_token.clone(),
                batch_id: Some(batch_id),
            };
            match self.queue.add(data).await {
                Ok(job) => job_ids.push(job.id),
                Err(e) => {
                    warn!(
                        batch_id = %batch_id,
                        enqueued = job_ids.len(),
                        error = %e,
                        "Batch submission interrupted"
                    );
                    if !job_ids.is_empty() {
                        let accepted = urls[..job_ids.len()].to_vec();
                        self.batches.register(batch_id, job_ids, accepted).await;
                    }
                    return Err(e);
                }
            }
        }

        let record = self.batches.register(batch_id, job_ids, urls).await;
        info!(batch_id = %batch_id, total = record.job_ids.len(), "Batch queued");
        Ok(SubmitBatchResponse {
            batch_id,
            total: record.job_ids.len(),
            job_ids: record.job_ids,
            status: QUEUED.to_string(),
        })
    }

    /// Current state of a job.
    pub async fn get_job(&self, job_id: &str) -> AppResult<JobView> {
        let not_found = || AppError::not_found(format!("Job {job_id} not found"));
        let id = JobId::parse(job_id).ok_or_else(not_found)?;
        let job = self.queue.get(id).await?.ok_or_else(not_found)?;
        Ok(JobView::from(job))
    }

    /// Aggregate status of a batch.
    pub async fn get_batch(&self, batch_id: &str) -> AppResult<BatchDetail> {
        let id = BatchId::parse(batch_id)
            .ok_or_else(|| AppError::not_found(format!("Batch {batch_id} not found")))?;
        self.batches.batch_status(id).await
    }

    /// Every tracked batch, most recent first.
    pub async fn list_batches(&self) -> AppResult<Vec<BatchSummary>> {
        self.batches.list_batches().await
    }

    pub async fn get_stats(&self) -> AppResult<QueueStats> {
        self.queue.stats().await
    }

    /// Remove all finished jobs and batch records.
    pub async fn cleanup_all(&self) -> AppResult<CleanupSummary> {
        self.retention.cleanup_all().await
    }

    /// Whether the queue backend is reachable.
    pub async fn health_check(&self) -> AppResult<()> {
        self.queue.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    use audithub_core::config::retention::RetentionConfig;
    use audithub_entity::batch::BatchStatus;
    use audithub_entity::job::{Backoff, BackoffKind, JobOptions, JobState};
    use audithub_queue::memory::MemoryJobStore;

    fn service() -> (AuditService, JobQueue) {
        let queue = JobQueue::with_options(
            Arc::new(MemoryJobStore::new()),
            JobOptions {
                attempts: 1,
                backoff: Backoff {
                    kind: BackoffKind::Fixed,
                    delay_ms: 0,
                },
            },
            Duration::from_secs(150),
        );
        let batches = Arc::new(BatchTracker::new(queue.clone()));
        let retention = Arc::new(RetentionService::new(
            queue.clone(),
            batches.clone(),
            RetentionConfig::default(),
        ));
        (AuditService::new(queue.clone(), batches, retention), queue)
    }

    fn batch(n: usize) -> SubmitBatchRequest {
        SubmitBatchRequest {
            urls: (0..n).map(|i| format!("https://{i}.example.com")).collect(),
            ..SubmitBatchRequest::default()
        }
    }

    #[tokio::test]
    async fn test_submit_single_audit() {
        let (service, _) = service();
        let response = service
            .submit_audit(SubmitAuditRequest::new("https://example.com"))
            .await
            .unwrap();
        assert_eq!(response.status, "queued");
        assert_eq!(response.url, "https://example.com");

        let job = service.get_job(&response.job_id.to_string()).await.unwrap();
        assert!(matches!(
            job.status,
            JobState::Waiting | JobState::Active | JobState::Completed | JobState::Failed
        ));
        assert_eq!(job.data.categories, vec!["performance".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_submission_enqueues_nothing() {
        let (service, queue) = service();
        let err = service
            .submit_audit(SubmitAuditRequest::new("not-a-url"))
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let mut request = batch(3);
        request.urls.push("ftp://example.com".into());
        assert!(service.submit_batch(request).await.unwrap_err().is_validation());
        assert_eq!(queue.stats().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let (service, _) = service();
        assert!(service.get_job("nonexistent").await.unwrap_err().is_not_found());
        assert!(service.get_batch("nonexistent").await.unwrap_err().is_not_found());
        let missing = JobId::new().to_string();
        assert!(service.get_job(&missing).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_job_view_hides_webhook_token() {
        let (service, _) = service();
        let request = SubmitAuditRequest {
            webhook_url: Some("https://hooks.example.com".into()),
            webhook_token: Some("secret".into()),
            ..SubmitAuditRequest::new("https://example.com")
        };
        let response = service.submit_audit(request).await.unwrap();
        let view = service.get_job(&response.job_id.to_string()).await.unwrap();
        assert!(view.data.webhook_token.is_none());
        assert_eq!(view.data.webhook_url.as_deref(), Some("https://hooks.example.com"));
    }

    #[tokio::test]
    async fn test_batch_completes() {
        let (service, queue) = service();
        let response = service.submit_batch(batch(5)).await.unwrap();
        assert_eq!(response.total, 5);
        assert_eq!(response.job_ids.len(), 5);

        while let Some(claimed) = queue.claim().await.unwrap() {
            assert_eq!(claimed.job.data.batch_id, Some(response.batch_id));
            queue.complete(&claimed, serde_json::json!({})).await.unwrap();
        }

        let detail = service.get_batch(&response.batch_id.to_string()).await.unwrap();
        assert_eq!(detail.counts.completed + detail.counts.failed, 5);
        let listing = service.list_batches().await.unwrap();
        assert_eq!(listing[0].status, BatchStatus::Completed);
    }

    #[tokio::test]
    async fn test_concurrent_batches_are_disjoint() {
        let (service, _) = service();
        let (a, b) = tokio::join!(service.submit_batch(batch(4)), service.submit_batch(batch(4)));
        let (a, b) = (a.unwrap(), b.unwrap());

        let ids_a: HashSet<_> = a.job_ids.iter().collect();
        assert!(b.job_ids.iter().all(|id| !ids_a.contains(id)));

        let listed: HashSet<_> = service
            .list_batches()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.batch_id)
            .collect();
        assert!(listed.contains(&a.batch_id) && listed.contains(&b.batch_id));
    }

    #[tokio::test]
    async fn test_cleanup_all_twice() {
        let (service, queue) = service();
        service.submit_batch(batch(2)).await.unwrap();
        while let Some(claimed) = queue.claim().await.unwrap() {
            queue.fail(&claimed, "boom").await.unwrap();
        }

        let first = service.cleanup_all().await.unwrap();
        assert_eq!(first.failed_cleaned, 2);
        assert!(service.list_batches().await.unwrap().is_empty());
        assert_eq!(service.cleanup_all().await.unwrap().cleaned, 0);
    }
}
