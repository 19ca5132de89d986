//! Worker pool configuration.

use serde::{Deserialize, Serialize};

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether this process runs a worker pool at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum number of audits running at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Delay between queue polls when no job is available, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// How long a drain waits for in-flight jobs, in seconds.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
    /// Cron expression for recovering jobs whose lease expired.
    #[serde(default = "default_stalled_schedule")]
    pub stalled_check_schedule: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval(),
            shutdown_grace_seconds: default_shutdown_grace(),
            stalled_check_schedule: default_stalled_schedule(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    10
}

fn default_poll_interval() -> u64 {
    500
}

fn default_shutdown_grace() -> u64 {
    120
}

fn default_stalled_schedule() -> String {
    "*/30 * * * * *".to_string()
}
