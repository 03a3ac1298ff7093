use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::task::TaskEnvelope;

/// Producer side of the broker.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Publish `task` on `task.queue`.
    async fn enqueue(&self, task: TaskEnvelope) -> Result<()>;
}

/// Consumer side of the broker. Each worker owns one consumer.
#[async_trait]
pub trait TaskConsumer: Send {
    /// Wait up to `timeout` for the next task on `queue`.
    async fn dequeue(&mut self, queue: &str, timeout: Duration) -> Result<Option<TaskEnvelope>>;
}
