//! Job lifecycle events emitted by the worker pool.

use std::time::Duration;

use tracing::{error, info, warn};

use audithub_core::types::id::JobId;

/// A transition observed while processing a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// An attempt started.
    Active {
        job_id: JobId,
        url: String,
        attempt: u32,
    },
    /// The job finished successfully.
    Completed {
        job_id: JobId,
        url: String,
        duration: Duration,
    },
    /// An attempt failed. `terminal` is set once no retries remain.
    Failed {
        job_id: JobId,
        url: String,
        reason: String,
        attempt: u32,
        terminal: bool,
        duration: Duration,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            Self::Active { job_id, .. } | Self::Completed { job_id, .. } | Self::Failed { job_id, .. } => {
                *job_id
            }
        }
    }
}

/// Receives job events synchronously from the worker pool.
///
/// Implementations must not block; they run on the job's task.
pub trait JobObserver: Send + Sync + std::fmt::Debug {
    fn on_event(&self, event: &JobEvent);
}

/// Observer that writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl JobObserver for LoggingObserver {
    fn on_event(&self, event: &JobEvent) {
        match event {
            JobEvent::Active { job_id, url, attempt } => {
                info!(job_id = %job_id, url = %url, attempt, "Job is now active");
            }
            JobEvent::Completed { job_id, url, duration } => {
                info!(
                    job_id = %job_id,
                    url = %url,
                    duration_ms = duration.as_millis() as u64,
                    "Job completed successfully"
                );
            }
            JobEvent::Failed {
                job_id,
                url,
                reason,
                attempt,
                terminal: true,
                ..
            } => {
                error!(job_id = %job_id, url = %url, attempt, reason = %reason, "Job failed");
            }
            JobEvent::Failed {
                job_id,
                url,
                reason,
                attempt,
                ..
            } => {
                warn!(job_id = %job_id, url = %url, attempt, reason = %reason, "Job attempt failed, will retry");
            }
        }
    }
}
