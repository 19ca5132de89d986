//! Cron scheduler for periodic maintenance tasks.

use std::sync::Arc;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

use audithub_core::error::AppError;
use audithub_queue::JobQueue;
use audithub_service::RetentionService;

/// Cron-based scheduler for retention sweeps and stalled-job recovery.
pub struct CronScheduler {
    scheduler: JobScheduler,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler").finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new() -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;

        Ok(Self { scheduler })
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {e}")))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }

    /// Retention sweep on `schedule` (six-field cron, seconds first).
    pub async fn register_retention(
        &self,
        retention: Arc<RetentionService>,
        schedule: &str,
    ) -> Result<(), AppError> {
        let job = CronJob::new_async(schedule, move |_uuid, _lock| {
            let retention = Arc::clone(&retention);
            Box::pin(async move {
                tracing::debug!("Running retention sweep");
                if let Err(e) = retention.run_scheduled().await {
                    tracing::error!("Retention sweep failed: {}", e);
                }
            })
        })
        .map_err(|e| {
            AppError::configuration(format!("Invalid retention schedule '{schedule}': {e}"))
        })?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add retention schedule: {e}")))?;

        tracing::info!(schedule = %schedule, "Registered: retention sweep");
        Ok(())
    }

    /// Stalled-job recovery on `schedule`.
    pub async fn register_stalled_recovery(
        &self,
        queue: JobQueue,
        schedule: &str,
    ) -> Result<(), AppError> {
        let job = CronJob::new_async(schedule, move |_uuid, _lock| {
            let queue = queue.clone();
            Box::pin(async move {
                tracing::trace!("Checking for stalled jobs");
                if let Err(e) = queue.recover_stalled().await {
                    tracing::error!("Stalled job recovery failed: {}", e);
                }
            })
        })
        .map_err(|e| {
            AppError::configuration(format!("Invalid stalled-check schedule '{schedule}': {e}"))
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add stalled recovery schedule: {e}"))
        })?;

        tracing::info!(schedule = %schedule, "Registered: stalled job recovery");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audithub_core::config::queue::QueueConfig;
    use audithub_queue::memory::MemoryJobStore;

    #[tokio::test]
    async fn test_invalid_schedule_rejected() {
        let scheduler = CronScheduler::new().await.unwrap();
        let queue = JobQueue::new(Arc::new(MemoryJobStore::new()), &QueueConfig::default()).unwrap();
        let err = scheduler
            .register_stalled_recovery(queue, "not a cron")
            .await
            .unwrap_err();
        assert!(err.message.contains("not a cron"));
    }

    #[tokio::test]
    async fn test_register_start_shutdown() {
        let mut scheduler = CronScheduler::new().await.unwrap();
        let queue = JobQueue::new(Arc::new(MemoryJobStore::new()), &QueueConfig::default()).unwrap();
        scheduler
            .register_stalled_recovery(queue, "*/30 * * * * *")
            .await
            .unwrap();
        scheduler.start().await.unwrap();
        scheduler.shutdown().await.unwrap();
    }
}
