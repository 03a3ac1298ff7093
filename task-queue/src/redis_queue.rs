// Redis list broker
use async_trait::async_trait;
use redis::{aio::ConnectionManager, aio::MultiplexedConnection, AsyncCommands};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{QueueError, Result};
use crate::queue::{TaskConsumer, TaskQueue};
use crate::task::TaskEnvelope;

/// Prefix of the list key backing each logical queue.
pub const QUEUE_KEY_PREFIX: &str = "queue:";

/// Broker storing each logical queue as a Redis list.
///
/// Producers `LPUSH` onto `queue:<name>`; consumers `BRPOP` from the other
/// end, so each task is delivered to exactly one worker.
#[derive(Clone)]
pub struct RedisTaskQueue {
    client: redis::Client,
    redis: ConnectionManager,
}

impl RedisTaskQueue {
    /// # Errors
    ///
    /// Fails if the URL is invalid or the server cannot be reached.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| QueueError::ConnectionError(format!("invalid Redis URL: {}", e)))?;
        let redis = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| QueueError::ConnectionError(e.to_string()))?;

        info!("Connected to Redis task broker");
        Ok(Self { client, redis })
    }

    /// Open a dedicated connection for one worker.
    ///
    /// `BRPOP` parks the connection it runs on, so consumers never share the
    /// producer's connection or each other's.
    ///
    /// # Errors
    ///
    /// Fails if a new connection cannot be established.
    pub async fn consumer(&self) -> Result<RedisTaskConsumer> {
        let conn = self
            .client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| QueueError::ConnectionError(e.to_string()))?;
        Ok(RedisTaskConsumer { conn })
    }

    /// Tasks waiting on `queue`.
    ///
    /// # Errors
    ///
    /// Fails if Redis is unreachable.
    pub async fn pending(&self, queue: &str) -> Result<usize> {
        let mut conn = self.redis.clone();
        let length: usize = conn.llen(queue_key(queue)).await?;
        Ok(length)
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn enqueue(&self, task: TaskEnvelope) -> Result<()> {
        let payload = task.to_json()?;
        let mut conn = self.redis.clone();
        conn.lpush::<_, _, ()>(queue_key(&task.queue), payload).await?;
        debug!(task = %task.name, task_id = %task.id, queue = %task.queue, "Task enqueued");
        Ok(())
    }
}

pub struct RedisTaskConsumer {
    conn: MultiplexedConnection,
}

#[async_trait]
impl TaskConsumer for RedisTaskConsumer {
    async fn dequeue(&mut self, queue: &str, timeout: Duration) -> Result<Option<TaskEnvelope>> {
        // BRPOP takes whole seconds here; zero would block forever.
        let seconds = timeout.as_secs().max(1);
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(queue_key(queue))
            .arg(seconds)
            .query_async(&mut self.conn)
            .await?;

        let Some((_, payload)) = popped else {
            return Ok(None);
        };

        match TaskEnvelope::from_json(&payload) {
            Ok(task) => Ok(Some(task)),
            Err(e) => {
                warn!(queue, error = %e, "Discarding undecodable task envelope");
                Ok(None)
            }
        }
    }
}

pub fn queue_key(queue: &str) -> String {
    format!("{}{}", QUEUE_KEY_PREFIX, queue)
}
