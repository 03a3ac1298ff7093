use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Task broker connection failed: {0}")]
    ConnectionError(String),

    #[error("Task broker command failed: {0}")]
    CommandError(#[from] redis::RedisError),

    #[error("Task envelope serialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("No handler registered for task: {0}")]
    UnknownTask(String),

    #[error("Task {task} failed: {reason}")]
    TaskFailed { task: String, reason: String },
}

impl QueueError {
    pub fn task_failed(task: &str, reason: impl std::fmt::Display) -> Self {
        Self::TaskFailed {
            task: task.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;
