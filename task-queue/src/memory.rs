// In-process broker
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::Result;
use crate::queue::{TaskConsumer, TaskQueue};
use crate::task::TaskEnvelope;

/// FIFO queues held in memory, for tests and single-binary deployments.
#[derive(Debug, Default)]
pub struct InMemoryTaskQueue {
    queues: DashMap<String, VecDeque<TaskEnvelope>>,
    available: Notify,
}

impl InMemoryTaskQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Consumer handle for one worker.
    pub fn consumer(self: &Arc<Self>) -> InMemoryConsumer {
        InMemoryConsumer {
            queue: Arc::clone(self),
        }
    }

    /// Tasks waiting on `queue`.
    pub fn pending(&self, queue: &str) -> usize {
        self.queues.get(queue).map_or(0, |q| q.len())
    }

    /// Names of the tasks waiting on `queue`, oldest first.
    pub fn pending_names(&self, queue: &str) -> Vec<String> {
        self.queues
            .get(queue)
            .map(|q| q.iter().map(|t| t.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn try_pop(&self, queue: &str) -> Option<TaskEnvelope> {
        self.queues.get_mut(queue).and_then(|mut q| q.pop_front())
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, task: TaskEnvelope) -> Result<()> {
        self.queues.entry(task.queue.clone()).or_default().push_back(task);
        self.available.notify_one();
        Ok(())
    }
}

pub struct InMemoryConsumer {
    queue: Arc<InMemoryTaskQueue>,
}

#[async_trait]
impl TaskConsumer for InMemoryConsumer {
    async fn dequeue(&mut self, queue: &str, timeout: Duration) -> Result<Option<TaskEnvelope>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(task) = self.queue.try_pop(queue) {
                return Ok(Some(task));
            }
            if tokio::time::timeout_at(deadline, self.queue.available.notified())
                .await
                .is_err()
            {
                return Ok(self.queue.try_pop(queue));
            }
        }
    }
}
