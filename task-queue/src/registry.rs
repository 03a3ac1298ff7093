// Task name -> handler routing
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{QueueError, Result};
use crate::task::TaskEnvelope;

/// Executes one task type. The returned value is the task result, logged by the worker.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self, task: &TaskEnvelope) -> Result<serde_json::Value>;
}

#[derive(Clone, Default)]
pub struct TaskRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: &str, handler: Arc<dyn TaskHandler>) -> Self {
        self.handlers.insert(name.to_string(), handler);
        self
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run the handler registered for `task.name`.
    ///
    /// # Errors
    ///
    /// [`QueueError::UnknownTask`] if nothing is registered, otherwise the
    /// handler's own error.
    pub async fn dispatch(&self, task: &TaskEnvelope) -> Result<serde_json::Value> {
        let handler = self
            .handlers
            .get(&task.name)
            .ok_or_else(|| QueueError::UnknownTask(task.name.clone()))?;
        handler.run(task).await
    }
}
