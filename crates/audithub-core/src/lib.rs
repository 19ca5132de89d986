//! # audithub-core
//!
//! Core crate for AuditHub. Contains the configuration schema, typed
//! identifiers, and the unified error system.
//!
//! This crate has **no** internal dependencies on other AuditHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
