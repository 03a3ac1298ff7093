use async_trait::async_trait;

use crate::error::Result;

/// A shared list store with atomic append and atomic read-all-and-clear.
///
/// `drain` is the only operation that removes records and is the single
/// point of mutual exclusion for the pipeline: concurrent drains of the same
/// key partition its contents, each record going to exactly one caller.
/// A record appended after a drain returns is seen by the next drain.
#[async_trait]
pub trait BufferStore: Send + Sync {
    /// Append `record` to the tail of `key`, returning the new length.
    async fn append(&self, key: &str, record: String) -> Result<usize>;

    /// Append several records in order, returning the new length.
    async fn append_many(&self, key: &str, records: Vec<String>) -> Result<usize> {
        let mut length = self.length(key).await?;
        for record in records {
            length = self.append(key, record).await?;
        }
        Ok(length)
    }

    /// Atomically take every record under `key`, oldest first, leaving it empty.
    async fn drain(&self, key: &str) -> Result<Vec<String>>;

    /// Current number of records under `key`.
    async fn length(&self, key: &str) -> Result<usize>;
}
