//! Retention of finished job records.

pub mod service;

pub use service::RetentionService;
