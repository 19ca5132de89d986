//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section. The root [`AppConfig`] is resolved once at startup and handed
//! to each component's constructor.

pub mod executor;
pub mod logging;
pub mod queue;
pub mod retention;
pub mod webhook;
pub mod worker;

use serde::{Deserialize, Serialize};

use self::executor::ExecutorConfig;
use self::logging::LoggingConfig;
use self::queue::QueueConfig;
use self::retention::RetentionConfig;
use self::webhook::WebhookConfig;
use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Work queue backend and retry settings.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Worker pool settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Audit child-process settings.
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Webhook delivery settings.
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// Retention sweep settings.
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the file at `path` with an environment-specific overlay
    /// (`config/<env>.toml`) and environment variables prefixed with
    /// `AUDITHUB_` (sections separated by `__`). Missing files are allowed.
    pub fn load(path: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("AUDITHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-section constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.worker.concurrency == 0 {
            return Err(AppError::configuration(
                "worker.concurrency must be at least 1",
            ));
        }
        if self.queue.attempts == 0 {
            return Err(AppError::configuration("queue.attempts must be at least 1"));
        }
        if self.queue.lock_duration_seconds <= self.executor.timeout_seconds {
            return Err(AppError::configuration(format!(
                "queue.lock_duration_seconds ({}) must exceed executor.timeout_seconds ({})",
                self.queue.lock_duration_seconds, self.executor.timeout_seconds
            )));
        }
        Ok(())
    }
}
