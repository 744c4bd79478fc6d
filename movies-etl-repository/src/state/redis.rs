//! Redis-backed watermark storage.

use async_trait::async_trait;
use bb8_redis::{bb8::Pool, redis, RedisConnectionManager};
use tracing::{debug, info};

use crate::config::RedisConfig;
use crate::errors::StateError;
use crate::interfaces::StateStorage;

/// Stores each watermark as a plain string key.
///
/// Uses a pool of one connection checked with `PING` on checkout, so a dropped
/// connection is replaced lazily before the next command.
pub struct RedisStateStorage {
    pool: Pool<RedisConnectionManager>,
}

impl RedisStateStorage {
    /// Connect to the Redis server described by `config`.
    pub async fn connect(config: &RedisConfig) -> Result<Self, StateError> {
        let manager = RedisConnectionManager::new(config.url())?;
        let pool = Pool::builder()
            .max_size(1)
            .test_on_check_out(true)
            .build(manager)
            .await?;

        // bb8 connects in the background; fail fast if the server is unreachable.
        drop(pool.get().await?);

        info!(host = %config.host, port = config.port, "Connected to Redis");
        Ok(Self { pool })
    }
}

#[async_trait]
impl StateStorage for RedisStateStorage {
    async fn retrieve(&self, key: &str) -> Result<Option<String>, StateError> {
        let mut conn = self.pool.get().await?;
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut *conn)
            .await?;
        debug!(key = %key, found = value.is_some(), "Read state");
        Ok(value)
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), StateError> {
        let mut conn = self.pool.get().await?;
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async::<_, ()>(&mut *conn)
            .await?;
        debug!(key = %key, "Saved state");
        Ok(())
    }
}
