//! # audithub-entity
//!
//! Domain entities for AuditHub: jobs and their lifecycle states, batch
//! views, queue statistics, and the messages exchanged with the audit
//! child process.

pub mod audit;
pub mod batch;
pub mod job;
pub mod stats;

pub use batch::{BatchCounts, BatchDetail, BatchRecord, BatchStatus, BatchSummary};
pub use job::{AuditJobData, Job, JobOptions, JobState, JobView};
pub use stats::{CleanupSummary, QueueStats};
