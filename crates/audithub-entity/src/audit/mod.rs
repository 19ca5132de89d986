//! Audit categories, results, and the executor wire protocol.

pub mod category;
pub mod ipc;
pub mod outcome;

pub use category::{DEFAULT_CATEGORY, KNOWN_CATEGORIES, STANDARD_CATEGORIES};
pub use ipc::{AuditOptions, RunnerMessage, RunnerRequest};
pub use outcome::AuditOutcome;
