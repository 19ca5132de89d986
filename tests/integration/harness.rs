//! Shared test harness for integration tests.
//!
//! Wires the real queue, facade, worker pool and process executor together
//! with an in-memory store and a small `sh` script standing in for the
//! Lighthouse runner.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use audithub_core::config::retention::RetentionConfig;
use audithub_core::config::webhook::WebhookConfig;
use audithub_core::config::worker::WorkerConfig;
use audithub_entity::job::{Backoff, BackoffKind, JobOptions};
use audithub_entity::stats::QueueStats;
use audithub_queue::JobQueue;
use audithub_queue::memory::MemoryJobStore;
use audithub_service::{AuditService, BatchTracker, RetentionService};
use audithub_worker::{DrainReport, ProcessExecutor, WebhookNotifier, WorkerMetrics, WorkerPool};

/// Answers with a failure for urls containing "fail", a success otherwise.
const FAKE_RUNNER: &str = r#"read -r line
url=$(printf '%s' "$line" | sed -n 's/.*"url":"\([^"]*\)".*/\1/p')
case "$url" in
  *fail*)
    printf '{"type":"AUDIT_RESULT","result":{"success":false,"url":"%s","error":"net::ERR_NAME_NOT_RESOLVED","timestamp":"2026-01-01T00:00:00Z"}}\n' "$url"
    ;;
  *)
    printf '{"type":"AUDIT_RESULT","result":{"success":true,"url":"%s","scores":{"performance":0.91,"seo":0.8},"metrics":{"lcp":1800.0},"durationMs":42,"timestamp":"2026-01-01T00:00:00Z"}}\n' "$url"
    ;;
esac
"#;

/// A running AuditHub stack.
pub struct TestHarness {
    pub service: AuditService,
    pub queue: JobQueue,
    pub metrics: Arc<WorkerMetrics>,
    shutdown: watch::Sender<bool>,
    worker: JoinHandle<DrainReport>,
    _dir: TempDir,
}

impl TestHarness {
    /// Start a stack whose jobs get `attempts` tries with no backoff delay.
    pub async fn start(concurrency: usize, attempts: u32) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let script = write_runner(&dir);

        let queue = JobQueue::with_options(
            Arc::new(MemoryJobStore::new()),
            JobOptions {
                attempts,
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
            Arc::clone(&batches),
            RetentionConfig::default(),
        ));
        let service = AuditService::new(queue.clone(), batches, retention);

        let executor = ProcessExecutor::new("sh", vec![script.display().to_string()])
            .with_timeout(Duration::from_secs(10));
        let notifier = WebhookNotifier::new(&WebhookConfig::default()).expect("Failed to build notifier");
        let metrics = Arc::new(WorkerMetrics::new());
        let config = WorkerConfig {
            concurrency,
            poll_interval_ms: 10,
            shutdown_grace_seconds: 10,
            ..WorkerConfig::default()
        };
        let pool = WorkerPool::new(
            queue.clone(),
            Arc::new(executor),
            Arc::new(notifier),
            config,
            "integration",
        )
        .with_observer(metrics.clone());

        let (shutdown, rx) = watch::channel(false);
        let worker = tokio::spawn(async move { pool.run(rx).await });

        Self {
            service,
            queue,
            metrics,
            shutdown,
            worker,
            _dir: dir,
        }
    }

    /// Poll until `finished` jobs are completed or failed.
    pub async fn wait_for_finished(&self, finished: u64) -> QueueStats {
        for _ in 0..1000 {
            let stats = self.service.get_stats().await.expect("stats");
            if stats.completed + stats.failed >= finished {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("jobs did not finish in time");
    }

    /// Stop the worker pool and wait for it to drain.
    pub async fn stop(self) -> DrainReport {
        let _ = self.shutdown.send(true);
        self.worker.await.expect("worker pool panicked")
    }
}

fn write_runner(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("fake-runner.sh");
    std::fs::write(&path, FAKE_RUNNER).expect("Failed to write fake runner");
    path
}
