// Broker that runs tasks inline
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

use crate::error::Result;
use crate::queue::TaskQueue;
use crate::registry::TaskRegistry;
use crate::task::TaskEnvelope;

/// Executes each task inside `enqueue`, before returning.
///
/// Makes pipelines deterministic under test. A failing task is logged and
/// does not fail the enqueue, matching what a producer sees with a real broker.
pub struct EagerTaskQueue {
    registry: TaskRegistry,
    executed: AtomicUsize,
}

impl EagerTaskQueue {
    pub fn new(registry: TaskRegistry) -> Self {
        Self {
            registry,
            executed: AtomicUsize::new(0),
        }
    }

    /// Tasks run so far, successful or not.
    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskQueue for EagerTaskQueue {
    async fn enqueue(&self, task: TaskEnvelope) -> Result<()> {
        self.executed.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.registry.dispatch(&task).await {
            warn!(task = %task.name, task_id = %task.id, error = %e, "Eager task failed");
        }
        Ok(())
    }
}
