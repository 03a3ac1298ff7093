// Worker pool consuming one logical queue
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::queue::TaskConsumer;
use crate::registry::TaskRegistry;
use crate::task::TaskEnvelope;

/// Pause after a broker error before polling again.
const BROKER_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Counters shared by the workers of one pool.
#[derive(Debug, Default)]
pub struct WorkerStats {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl WorkerStats {
    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Runs independent consumer loops against one queue.
///
/// A task runs to completion once dequeued; shutdown is only observed
/// between tasks, after at most one poll timeout.
pub struct WorkerPool {
    queue: String,
    registry: TaskRegistry,
    poll_timeout: Duration,
    stats: Arc<WorkerStats>,
}

impl WorkerPool {
    pub fn new(queue: &str, registry: TaskRegistry) -> Self {
        Self {
            queue: queue.to_string(),
            registry,
            poll_timeout: Duration::from_secs(1),
            stats: Arc::new(WorkerStats::default()),
        }
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Run one worker per consumer until `shutdown` flips to `true` (or its
    /// sender is dropped).
    pub async fn run(self, consumers: Vec<Box<dyn TaskConsumer>>, shutdown: watch::Receiver<bool>) -> Arc<WorkerStats> {
        info!(
            queue = %self.queue,
            concurrency = consumers.len(),
            tasks = ?self.registry.names(),
            "Worker pool starting"
        );

        let mut workers = JoinSet::new();
        for (index, consumer) in consumers.into_iter().enumerate() {
            let worker = Worker {
                index,
                queue: self.queue.clone(),
                registry: self.registry.clone(),
                poll_timeout: self.poll_timeout,
                stats: Arc::clone(&self.stats),
            };
            workers.spawn(worker.run(consumer, shutdown.clone()));
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(queue = %self.queue, error = %e, "Worker exited abnormally");
            }
        }

        info!(
            queue = %self.queue,
            succeeded = self.stats.succeeded(),
            failed = self.stats.failed(),
            "Worker pool stopped"
        );
        self.stats
    }
}

struct Worker {
    index: usize,
    queue: String,
    registry: TaskRegistry,
    poll_timeout: Duration,
    stats: Arc<WorkerStats>,
}

impl Worker {
    async fn run(self, mut consumer: Box<dyn TaskConsumer>, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() || shutdown.has_changed().is_err() {
                break;
            }

            match consumer.dequeue(&self.queue, self.poll_timeout).await {
                Ok(Some(task)) => self.execute(&task).await,
                Ok(None) => {}
                Err(e) => {
                    warn!(worker = self.index, queue = %self.queue, error = %e, "Broker poll failed");
                    tokio::select! {
                        () = tokio::time::sleep(BROKER_ERROR_BACKOFF) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    async fn execute(&self, task: &TaskEnvelope) {
        let started = Instant::now();
        match self.registry.dispatch(task).await {
            Ok(result) => {
                self.stats.succeeded.fetch_add(1, Ordering::Relaxed);
                telemetry::record_task_completed(&task.name, true);
                info!(
                    worker = self.index,
                    task = %task.name,
                    task_id = %task.id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    %result,
                    "Task succeeded"
                );
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                telemetry::record_task_completed(&task.name, false);
                error!(
                    worker = self.index,
                    task = %task.name,
                    task_id = %task.id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "Task failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{QueueError, Result};
    use crate::memory::InMemoryTaskQueue;
    use crate::queue::TaskQueue;
    use crate::registry::TaskHandler;
    use async_trait::async_trait;
    use serde_json::json;

    struct Counting {
        runs: AtomicU64,
        fail: bool,
    }

    #[async_trait]
    impl TaskHandler for Counting {
        async fn run(&self, task: &TaskEnvelope) -> Result<serde_json::Value> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(QueueError::task_failed(&task.name, "boom"));
            }
            Ok(json!({"status": "success"}))
        }
    }

    #[tokio::test]
    async fn pool_drains_queue_and_survives_failures() {
        let broker = InMemoryTaskQueue::new();
        let ok = Arc::new(Counting { runs: AtomicU64::new(0), fail: false });
        let bad = Arc::new(Counting { runs: AtomicU64::new(0), fail: true });
        let registry = TaskRegistry::new()
            .register("analytics.flush", ok.clone())
            .register("analytics.cleanup", bad.clone());

        for _ in 0..5 {
            broker.enqueue(TaskEnvelope::new("analytics.flush", "analytics")).await.unwrap();
        }
        broker.enqueue(TaskEnvelope::new("analytics.cleanup", "analytics")).await.unwrap();
        broker.enqueue(TaskEnvelope::new("analytics.unknown", "analytics")).await.unwrap();

        let (stop, shutdown) = watch::channel(false);
        let pool = WorkerPool::new("analytics", registry).with_poll_timeout(Duration::from_millis(20));
        let consumers: Vec<Box<dyn TaskConsumer>> = (0..3)
            .map(|_| Box::new(broker.consumer()) as Box<dyn TaskConsumer>)
            .collect();
        let running = tokio::spawn(pool.run(consumers, shutdown));

        while broker.pending("analytics") > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.send(true).unwrap();
        let stats = running.await.unwrap();

        assert_eq!(ok.runs.load(Ordering::SeqCst), 5);
        assert_eq!(bad.runs.load(Ordering::SeqCst), 1);
        assert_eq!(stats.succeeded(), 5);
        assert_eq!(stats.failed(), 2);
    }

    #[tokio::test]
    async fn pool_stops_when_shutdown_sender_is_dropped() {
        let broker = InMemoryTaskQueue::new();
        let registry = TaskRegistry::new().register(
            "analytics.flush",
            Arc::new(Counting { runs: AtomicU64::new(0), fail: false }),
        );
        let (stop, shutdown) = watch::channel(false);
        let pool = WorkerPool::new("analytics", registry).with_poll_timeout(Duration::from_millis(20));
        let consumers: Vec<Box<dyn TaskConsumer>> = (0..2)
            .map(|_| Box::new(broker.consumer()) as Box<dyn TaskConsumer>)
            .collect();

        drop(stop);
        let stats = tokio::time::timeout(Duration::from_secs(2), pool.run(consumers, shutdown))
            .await
            .expect("pool kept running after the shutdown sender was dropped");

        assert_eq!(stats.succeeded(), 0);
        assert_eq!(stats.failed(), 0);
    }
}
