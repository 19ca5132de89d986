//! Redis connection management.

use redis::Client;
use redis::aio::ConnectionManager;
use tracing::info;

use audithub_core::config::queue::RedisQueueConfig;
use audithub_core::error::{AppError, ErrorKind};
use audithub_core::result::AppResult;

/// Redis client wrapper holding a reconnecting connection manager.
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClient").finish_non_exhaustive()
    }
}

impl RedisClient {
    /// Connect using the queue's Redis settings.
    pub async fn connect(config: &RedisQueueConfig) -> AppResult<Self> {
        info!(url = %mask_redis_url(&config.url), "Connecting to Redis");

        let client = Client::open(config.url.as_str()).map_err(|e| {
            AppError::with_source(ErrorKind::Queue, "Failed to create Redis client", e)
        })?;

        let conn = ConnectionManager::new(client).await.map_err(|e| {
            AppError::with_source(ErrorKind::Queue, "Failed to connect to Redis", e)
        })?;

        info!("Connected to Redis");
        Ok(Self { conn })
    }

    /// Clone of the connection manager for issuing commands.
    pub fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

/// Hide the password of a Redis URL before logging it.
pub fn mask_redis_url(url: &str) -> String {
    let Some(at_pos) = url.rfind('@') else {
        return url.to_string();
    };
    let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
    match url[..at_pos].rfind(':') {
        Some(colon_pos) if colon_pos >= scheme_end => {
            format!("{}:****@{}", &url[..colon_pos], &url[at_pos + 1..])
        }
        _ => url.to_string(),
    }
}
