//! Audit execution and background processing for AuditHub.
//!
//! This crate provides:
//! - An executor that runs each audit in its own child process
//! - A worker pool that claims queued jobs up to a concurrency limit
//! - A webhook notifier for finished jobs
//! - Job observers, including in-process metrics
//! - A cron scheduler for retention sweeps and stalled-job recovery

pub mod events;
pub mod executor;
pub mod metrics;
pub mod runner;
pub mod scheduler;
pub mod webhook;

pub use events::{JobEvent, JobObserver, LoggingObserver};
pub use executor::{AuditExecutor, ExecutionError, ProcessExecutor};
pub use metrics::WorkerMetrics;
pub use runner::{DrainReport, WorkerPool};
pub use scheduler::CronScheduler;
pub use webhook::WebhookNotifier;
