//! Retention sweep configuration.

use serde::{Deserialize, Serialize};

/// Which terminal jobs a sweep removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    /// Remove completed/failed jobs older than their configured age.
    Age,
    /// Remove every terminal job regardless of age.
    All,
}

/// Retention sweeper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Whether the scheduled sweep is registered.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cron expression (with seconds) for the scheduled sweep.
    #[serde(default = "default_schedule")]
    pub schedule: String,
    /// Sweep policy.
    #[serde(default = "default_policy")]
    pub policy: RetentionPolicy,
    /// Minimum age of completed jobs before removal (policy `age`).
    #[serde(default = "default_completed_age")]
    pub completed_age_hours: u64,
    /// Minimum age of failed jobs before removal (policy `age`).
    #[serde(default = "default_failed_age")]
    pub failed_age_hours: u64,
    /// Maximum jobs removed per state in one sweep.
    #[serde(default = "default_sweep_limit")]
    pub sweep_limit: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            schedule: default_schedule(),
            policy: default_policy(),
            completed_age_hours: default_completed_age(),
            failed_age_hours: default_failed_age(),
            sweep_limit: default_sweep_limit(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_schedule() -> String {
    "0 0 * * * *".to_string()
}

fn default_policy() -> RetentionPolicy {
    RetentionPolicy::Age
}

fn default_completed_age() -> u64 {
    24
}

fn default_failed_age() -> u64 {
    48
}

fn default_sweep_limit() -> usize {
    1000
}
