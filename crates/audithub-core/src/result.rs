//! Convenience result type alias for AuditHub.

use crate::error::AppError;

/// A specialized `Result` type for AuditHub operations.
pub type AppResult<T> = Result<T, AppError>;
