use thiserror::Error;

#[derive(Error, Debug)]
pub enum BufferError {
    #[error("Buffer store connection failed: {0}")]
    ConnectionError(String),

    #[error("Buffer store command failed: {0}")]
    CommandError(#[from] redis::RedisError),
}

pub type Result<T> = std::result::Result<T, BufferError>;
