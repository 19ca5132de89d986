//! # audithub-queue
//!
//! Work queue for audit jobs. Two backends implement [`JobStore`]:
//!
//! - **memory**: single-process store for development and tests
//! - **redis**: shared, durable store; every transition is a Lua script
//!
//! The backend is selected at runtime from `queue.provider`. [`JobQueue`]
//! layers the retry policy and lock tokens on top of the store.

#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
pub mod queue;
#[cfg(feature = "redis-backend")]
pub mod redis;
pub mod store;

pub use provider::connect_store;
pub use queue::{ClaimedJob, JobQueue};
pub use store::JobStore;
