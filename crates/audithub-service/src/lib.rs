//! # audithub-service
//!
//! Application services for AuditHub: the submission facade used by
//! callers, the in-memory batch tracker, and the retention sweeper.
//!
//! Services follow constructor injection; dependencies are provided at
//! construction time via `Arc` references.

pub mod audit;
pub mod batch;
pub mod retention;

pub use audit::{AuditService, SubmitAuditRequest, SubmitBatchRequest};
pub use batch::BatchTracker;
pub use retention::RetentionService;
