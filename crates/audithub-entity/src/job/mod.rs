//! Audit job entities.

pub mod model;
pub mod options;
pub mod state;
pub mod view;

pub use model::{AuditJobData, Job, JobLock};
pub use options::{Backoff, BackoffKind, JobOptions};
pub use state::JobState;
pub use view::JobView;
