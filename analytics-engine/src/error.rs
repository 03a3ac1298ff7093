use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Buffer store error: {0}")]
    Buffer(#[from] event_buffer::BufferError),

    #[error("Task queue error: {0}")]
    Queue(#[from] task_queue::QueueError),

    #[error("Persistence sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Configuration error: {0}")]
    Config(#[from] config_engine::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure of one batch write.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Batch write failed: {0}")]
    WriteFailed(String),

    #[error("Database error: {0}")]
    Database(#[from] database_layer::DatabaseError),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
