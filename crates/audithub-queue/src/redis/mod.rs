//! Redis job store.

pub mod client;
pub mod keys;
pub mod scripts;
pub mod store;

pub use client::RedisClient;
pub use store::RedisJobStore;
