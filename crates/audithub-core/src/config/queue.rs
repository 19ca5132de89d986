//! Work queue configuration.

use serde::{Deserialize, Serialize};

/// Work queue backend and retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue backend: `"memory"` or `"redis"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Logical queue name, used to namespace backend keys.
    #[serde(default = "default_name")]
    pub name: String,
    /// Redis backend configuration.
    #[serde(default)]
    pub redis: RedisQueueConfig,
    /// Total attempts per job, including the first one.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Backoff strategy between attempts: `"exponential"` or `"fixed"`.
    #[serde(default = "default_backoff_kind")]
    pub backoff_kind: String,
    /// Base backoff delay in milliseconds.
    #[serde(default = "default_backoff_delay")]
    pub backoff_delay_ms: u64,
    /// Lock lease granted to a worker that claims a job, in seconds.
    ///
    /// Must exceed `executor.timeout_seconds`.
    #[serde(default = "default_lock_duration")]
    pub lock_duration_seconds: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            name: default_name(),
            redis: RedisQueueConfig::default(),
            attempts: default_attempts(),
            backoff_kind: default_backoff_kind(),
            backoff_delay_ms: default_backoff_delay(),
            lock_duration_seconds: default_lock_duration(),
        }
    }
}

/// Redis queue backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisQueueConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Key prefix for all AuditHub queue keys.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for RedisQueueConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_name() -> String {
    "lighthouse-audits".to_string()
}

fn default_attempts() -> u32 {
    3
}

fn default_backoff_kind() -> String {
    "exponential".to_string()
}

fn default_backoff_delay() -> u64 {
    5000
}

fn default_lock_duration() -> u64 {
    150
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_key_prefix() -> String {
    "audithub:".to_string()
}
