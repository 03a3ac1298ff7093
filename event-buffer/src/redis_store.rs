// Redis list backend
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use tracing::{debug, info};

use crate::error::{BufferError, Result};
use crate::store::BufferStore;

/// Buffer store backed by a Redis list per key.
///
/// - `append` is `RPUSH`, which returns the new length in the same round trip
/// - `drain` is `MULTI; LRANGE key 0 -1; DEL key; EXEC`, so no append can
///   land between the read and the delete
/// - `length` is `LLEN`
///
/// Durability of buffered records across restarts is whatever the Redis
/// server's persistence settings provide.
#[derive(Clone)]
pub struct RedisBufferStore {
    redis: ConnectionManager,
}

impl RedisBufferStore {
    /// Connect using a `redis://` URL and check the server answers.
    ///
    /// # Errors
    ///
    /// Fails if the URL is invalid or the server cannot be reached.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| BufferError::ConnectionError(format!("invalid Redis URL: {}", e)))?;

        let redis = ConnectionManager::new(client)
            .await
            .map_err(|e| BufferError::ConnectionError(e.to_string()))?;

        let store = Self { redis };
        store.ping().await?;
        info!("Connected to Redis buffer store");
        Ok(store)
    }

    /// Round-trip a `PING`.
    ///
    /// # Errors
    ///
    /// Fails if the server does not answer.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.redis.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl BufferStore for RedisBufferStore {
    async fn append(&self, key: &str, record: String) -> Result<usize> {
        let mut conn = self.redis.clone();
        let length: usize = conn.rpush(key, record).await?;
        Ok(length)
    }

    async fn append_many(&self, key: &str, records: Vec<String>) -> Result<usize> {
        if records.is_empty() {
            return self.length(key).await;
        }
        let mut conn = self.redis.clone();
        let length: usize = conn.rpush(key, records).await?;
        Ok(length)
    }

    async fn drain(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.redis.clone();
        let (records,): (Vec<String>,) = redis::pipe()
            .atomic()
            .lrange(key, 0, -1)
            .del(key)
            .ignore()
            .query_async(&mut conn)
            .await?;

        debug!(key, drained = records.len(), "Drained buffer");
        Ok(records)
    }

    async fn length(&self, key: &str) -> Result<usize> {
        let mut conn = self.redis.clone();
        let length: usize = conn.llen(key).await?;
        Ok(length)
    }
}
