//! Audit submission and status queries.

pub mod request;
pub mod response;
pub mod service;

pub use request::{SubmitAuditRequest, SubmitBatchRequest};
pub use response::{SubmitAuditResponse, SubmitBatchResponse};
pub use service::AuditService;
