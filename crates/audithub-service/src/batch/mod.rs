//! In-memory batch aggregation.

pub mod tracker;

pub use tracker::BatchTracker;
