//! Worker pool: claims queued jobs and drives them through the executor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tokio::time;
use tracing::{error, info, trace, warn};

use audithub_core::config::worker::WorkerConfig;
use audithub_entity::audit::AuditOptions;
use audithub_entity::job::JobState;
use audithub_queue::{ClaimedJob, JobQueue};

use crate::events::{JobEvent, JobObserver};
use crate::executor::AuditExecutor;
use crate::webhook::{WebhookNotifier, WebhookPayload};

/// Outcome of shutting the pool down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Jobs still running when the grace period ran out. Their leases
    /// lapse and stalled-job recovery hands them to another worker.
    pub abandoned: usize,
}

/// Everything a single job needs, shared by all job tasks.
#[derive(Debug)]
struct JobProcessor {
    queue: JobQueue,
    executor: Arc<dyn AuditExecutor>,
    notifier: Arc<WebhookNotifier>,
    observers: Vec<Arc<dyn JobObserver>>,
}

impl JobProcessor {
    fn emit(&self, event: JobEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }

    async fn process(&self, claimed: ClaimedJob) {
        let job = &claimed.job;
        let url = job.data.url.clone();
        self.emit(JobEvent::Active {
            job_id: job.id,
            url: url.clone(),
            attempt: job.attempts_made,
        });

        let options = AuditOptions {
            categories: job.data.categories.clone(),
            locale: job.data.locale.clone(),
        };
        let started = Instant::now();
        let outcome = self.executor.execute(&url, &options).await;
        let duration = started.elapsed();

        let failure = match outcome {
            Ok(outcome) => match serde_json::to_value(&outcome) {
                Ok(result) => {
                    self.record_success(&claimed, result, duration).await;
                    return;
                }
                Err(e) => format!("failed to encode audit result: {e}"),
            },
            Err(e) => e.to_string(),
        };
        self.record_failure(&claimed, failure, duration).await;
    }

    async fn record_success(&self, claimed: &ClaimedJob, result: serde_json::Value, duration: Duration) {
        let job = &claimed.job;
        match self.queue.complete(claimed, result.clone()).await {
            Ok(true) => {
                self.emit(JobEvent::Completed {
                    job_id: job.id,
                    url: job.data.url.clone(),
                    duration,
                });
                self.notifier
                    .notify(job, WebhookPayload::completed(job.id, &result))
                    .await;
            }
            Ok(false) => {}
            Err(e) => error!(job_id = %job.id, error = %e, "Failed to mark job as completed"),
        }
    }

    async fn record_failure(&self, claimed: &ClaimedJob, reason: String, duration: Duration) {
        let job = &claimed.job;
        match self.queue.fail(claimed, &reason).await {
            Ok(Some(state)) => {
                let terminal = state == JobState::Failed;
                self.emit(JobEvent::Failed {
                    job_id: job.id,
                    url: job.data.url.clone(),
                    reason: reason.clone(),
                    attempt: job.attempts_made,
                    terminal,
                    duration,
                });
                if terminal {
                    self.notifier
                        .notify(job, WebhookPayload::failed(job.id, &reason))
                        .await;
                }
            }
            Ok(None) => {}
            Err(e) => error!(job_id = %job.id, error = %e, "Failed to record job failure"),
        }
    }
}

/// Pool of audit workers bounded by `worker.concurrency`.
#[derive(Debug)]
pub struct WorkerPool {
    processor: Arc<JobProcessor>,
    semaphore: Arc<Semaphore>,
    config: WorkerConfig,
    worker_id: String,
}

impl WorkerPool {
    pub fn new(
        queue: JobQueue,
        executor: Arc<dyn AuditExecutor>,
        notifier: Arc<WebhookNotifier>,
        config: WorkerConfig,
        worker_id: impl Into<String>,
    ) -> Self {
        let concurrency = config.concurrency.max(1);
        Self {
            processor: Arc::new(JobProcessor {
                queue,
                executor,
                notifier,
                observers: Vec::new(),
            }),
            semaphore: Arc::new(Semaphore::new(concurrency)),
            config,
            worker_id: worker_id.into(),
        }
    }

    /// Register an observer. Must be called before [`run`](Self::run).
    pub fn with_observer(mut self, observer: Arc<dyn JobObserver>) -> Self {
        if let Some(processor) = Arc::get_mut(&mut self.processor) {
            processor.observers.push(observer);
        } else {
            warn!(worker_id = %self.worker_id, "Observer registered after the pool started; ignored");
        }
        self
    }

    /// Jobs currently being processed.
    pub fn active_jobs(&self) -> usize {
        self.config.concurrency.max(1) - self.semaphore.available_permits()
    }

    /// Claim and process jobs until `cancel` turns `true`, then drain.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) -> DrainReport {
        info!(
            worker_id = %self.worker_id,
            concurrency = self.config.concurrency,
            poll_interval_ms = self.config.poll_interval_ms,
            "Worker pool started"
        );

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let mut tasks = JoinSet::new();

        loop {
            while let Some(finished) = tasks.try_join_next() {
                if let Err(e) = finished {
                    error!(worker_id = %self.worker_id, error = %e, "Job task panicked");
                }
            }

            let permit = tokio::select! {
                _ = cancelled(&mut cancel) => break,
                permit = self.semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            match self.processor.queue.claim().await {
                Ok(Some(claimed)) => {
                    trace!(job_id = %claimed.id(), "Job claimed");
                    let processor = Arc::clone(&self.processor);
                    tasks.spawn(async move {
                        let _permit = permit;
                        processor.process(claimed).await;
                    });
                    continue;
                }
                Ok(None) => {
                    drop(permit);
                    trace!("No jobs waiting");
                }
                Err(e) => {
                    drop(permit);
                    error!(worker_id = %self.worker_id, error = %e, "Failed to claim job");
                }
            }

            tokio::select! {
                _ = cancelled(&mut cancel) => break,
                _ = time::sleep(poll_interval) => {}
            }
        }

        self.drain(tasks).await
    }

    /// Wait for in-flight jobs up to the grace period, then abandon the rest.
    async fn drain(&self, mut tasks: JoinSet<()>) -> DrainReport {
        let in_flight = tasks.len();
        info!(worker_id = %self.worker_id, in_flight, "Worker pool draining");

        let grace = Duration::from_secs(self.config.shutdown_grace_seconds);
        let finished = time::timeout(grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        let abandoned = match finished {
            Ok(()) => 0,
            Err(_) => {
                let abandoned = tasks.len();
                tasks.abort_all();
                while tasks.join_next().await.is_some() {}
                abandoned
            }
        };

        if abandoned > 0 {
            warn!(worker_id = %self.worker_id, abandoned, "Shutdown grace period expired; jobs abandoned");
        } else {
            info!(worker_id = %self.worker_id, "Worker pool shut down cleanly");
        }
        DrainReport { abandoned }
    }
}

/// Resolves once shutdown is requested or the sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            return;
        }
    }
}
