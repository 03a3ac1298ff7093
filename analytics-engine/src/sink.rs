// Persistence sinks for flushed batches
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use database_layer::{AnalyticsEventRepository, EventRow};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::SinkError;

/// Destination of drained batches.
///
/// A call writes every row or none; a failed call may be retried with the
/// same rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn insert_batch(&self, rows: &[EventRow]) -> Result<(), SinkError>;
}

/// Deletes persisted events past their retention window.
#[async_trait]
pub trait EventRetention: Send + Sync {
    /// Remove events created before `cutoff`, returning how many were removed.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, SinkError>;
}

/// Sink writing into the `analytics_events` table.
#[derive(Clone)]
pub struct PostgresSink {
    repository: AnalyticsEventRepository,
}

impl PostgresSink {
    pub fn new(repository: AnalyticsEventRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl PersistenceSink for PostgresSink {
    async fn insert_batch(&self, rows: &[EventRow]) -> Result<(), SinkError> {
        self.repository.insert_batch(rows).await?;
        Ok(())
    }
}

#[async_trait]
impl EventRetention for PostgresSink {
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, SinkError> {
        Ok(self.repository.delete_older_than(cutoff).await?)
    }
}

/// In-memory sink for tests and dry runs.
///
/// [`MemorySink::with_failures`] makes the first `n` writes fail, which is
/// how retry behaviour is exercised without a database.
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: Mutex<Vec<EventRow>>,
    batches: Mutex<Vec<usize>>,
    attempts: AtomicUsize,
    failures_left: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failures(failures: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
            ..Self::default()
        }
    }

    /// Every persisted row, in write order.
    pub fn rows(&self) -> Vec<EventRow> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    /// Sizes of the successfully written batches.
    pub fn batches(&self) -> Vec<usize> {
        self.batches.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Calls to `insert_batch`, failed ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn persisted(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or_default()
    }
}

#[async_trait]
impl PersistenceSink for MemorySink {
    async fn insert_batch(&self, rows: &[EventRow]) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SinkError::WriteFailed("simulated sink outage".to_string()));
        }

        let mut stored = self
            .rows
            .lock()
            .map_err(|e| SinkError::WriteFailed(e.to_string()))?;
        stored.extend_from_slice(rows);
        drop(stored);

        if let Ok(mut batches) = self.batches.lock() {
            batches.push(rows.len());
        }
        Ok(())
    }
}

#[async_trait]
impl EventRetention for MemorySink {
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, SinkError> {
        let mut stored = self
            .rows
            .lock()
            .map_err(|e| SinkError::WriteFailed(e.to_string()))?;
        let before = stored.len();
        stored.retain(|row| row.created_at >= cutoff);
        Ok((before - stored.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{decode_record, Event};
    use chrono::Duration;

    fn row_created(at: DateTime<Utc>) -> EventRow {
        let mut event = Event::new("prompt_viewed", "prompt");
        event.created_at = at;
        decode_record(&event.to_record().unwrap()).unwrap().row
    }

    #[tokio::test]
    async fn memory_sink_fails_then_recovers() {
        let sink = MemorySink::with_failures(2);
        let rows = vec![row_created(Utc::now())];

        assert!(sink.insert_batch(&rows).await.is_err());
        assert!(sink.insert_batch(&rows).await.is_err());
        sink.insert_batch(&rows).await.unwrap();

        assert_eq!(sink.attempts(), 3);
        assert_eq!(sink.batches(), vec![1]);
        assert_eq!(sink.persisted(), 1);
    }

    #[tokio::test]
    async fn memory_sink_retention_removes_old_rows() {
        let sink = MemorySink::new();
        let now = Utc::now();
        let rows = vec![
            row_created(now - Duration::days(120)),
            row_created(now - Duration::days(5)),
            row_created(now),
        ];
        sink.insert_batch(&rows).await.unwrap();

        let deleted = sink.delete_older_than(now - Duration::days(90)).await.unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(sink.persisted(), 2);
    }
}
