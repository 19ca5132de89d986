//! Backend selection.

use std::sync::Arc;

use tracing::info;

use audithub_core::config::queue::QueueConfig;
use audithub_core::error::AppError;
use audithub_core::result::AppResult;

use crate::store::JobStore;

/// Build the job store named by `queue.provider`.
pub async fn connect_store(config: &QueueConfig) -> AppResult<Arc<dyn JobStore>> {
    let store: Arc<dyn JobStore> = match config.provider.as_str() {
        #[cfg(feature = "redis-backend")]
        "redis" => {
            info!(queue = %config.name, "Initializing Redis job store");
            let client = crate::redis::RedisClient::connect(&config.redis).await?;
            Arc::new(crate::redis::RedisJobStore::new(
                client,
                &config.redis.key_prefix,
                &config.name,
            ))
        }
        #[cfg(feature = "memory")]
        "memory" => {
            info!(queue = %config.name, "Initializing in-memory job store");
            Arc::new(crate::memory::MemoryJobStore::new())
        }
        other => {
            return Err(AppError::configuration(format!(
                "Unknown queue provider: '{other}'. Supported: memory, redis"
            )));
        }
    };
    Ok(store)
}
