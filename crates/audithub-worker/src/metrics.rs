//! In-process worker metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::events::{JobEvent, JobObserver};

/// Counters fed by job events.
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    active: AtomicU64,
    completed_duration_ms: AtomicU64,
}

/// Point-in-time copy of [`WorkerMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub started: u64,
    pub completed: u64,
    /// Jobs that failed for good.
    pub failed: u64,
    /// Failed attempts that were rescheduled.
    pub retried: u64,
    pub active: u64,
    pub avg_duration_ms: u64,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let completed = self.completed.load(Ordering::Relaxed);
        let total_ms = self.completed_duration_ms.load(Ordering::Relaxed);
        MetricsSnapshot {
            started: self.started.load(Ordering::Relaxed),
            completed,
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed),
            avg_duration_ms: if completed == 0 { 0 } else { total_ms / completed },
        }
    }

    fn finish_attempt(&self) {
        let _ = self
            .active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_sub(1)));
    }
}

impl JobObserver for WorkerMetrics {
    fn on_event(&self, event: &JobEvent) {
        match event {
            JobEvent::Active { .. } => {
                self.started.fetch_add(1, Ordering::Relaxed);
                self.active.fetch_add(1, Ordering::Relaxed);
            }
            JobEvent::Completed { duration, .. } => {
                self.finish_attempt();
                self.completed.fetch_add(1, Ordering::Relaxed);
                self.completed_duration_ms
                    .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
            }
            JobEvent::Failed { terminal, .. } => {
                self.finish_attempt();
                if *terminal {
                    self.failed.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.retried.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}
