// Flush worker: drain, decode, write with retry
use database_layer::EventRow;
use event_buffer::BufferStore;
use logger_redacted::PiiRedactor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::error::{Result, SinkError};
use crate::event::decode_record;
use crate::sink::PersistenceSink;

/// Longest raw-record excerpt attached to a log line.
const RECORD_EXCERPT_CHARS: usize = 200;

/// Backoff policy for batch writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &config_engine::RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: settings.initial_backoff(),
            max_backoff: settings.max_backoff(),
        }
    }

    /// Delay before attempt `attempt` (1-based); zero for the first.
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let doublings = (attempt - 2).min(16);
        self.initial_backoff
            .saturating_mul(1 << doublings)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushStatus {
    /// Nothing was buffered.
    Empty,
    /// Every decodable record was written.
    Persisted,
    /// The write failed on every attempt and the batch was discarded.
    Dropped,
}

impl FlushStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushStatus::Empty => "empty",
            FlushStatus::Persisted => "persisted",
            FlushStatus::Dropped => "dropped",
        }
    }
}

/// Outcome of one flush. Always `drained == persisted + dropped + malformed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    pub status: FlushStatus,
    pub drained: usize,
    pub persisted: usize,
    pub dropped: usize,
    pub malformed: usize,
    pub metadata_defaulted: usize,
    pub attempts: u32,
}

impl FlushReport {
    fn empty() -> Self {
        Self {
            status: FlushStatus::Empty,
            drained: 0,
            persisted: 0,
            dropped: 0,
            malformed: 0,
            metadata_defaulted: 0,
            attempts: 0,
        }
    }
}

/// Claims the whole buffer and writes it to the sink.
///
/// Each flush works on its own drained batch; any number may run at once.
/// A batch that cannot be written is held in memory across retries and never
/// returned to the buffer.
pub struct FlushWorker {
    buffer: Arc<dyn BufferStore>,
    sink: Arc<dyn PersistenceSink>,
    key: String,
    retry: RetryPolicy,
    dead_letter_key: Option<String>,
    redactor: PiiRedactor,
}

impl FlushWorker {
    pub fn new(buffer: Arc<dyn BufferStore>, sink: Arc<dyn PersistenceSink>, key: &str) -> Self {
        Self {
            buffer,
            sink,
            key: key.to_string(),
            retry: RetryPolicy::default(),
            dead_letter_key: None,
            redactor: PiiRedactor::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_dead_letter_key(mut self, key: Option<String>) -> Self {
        self.dead_letter_key = key;
        self
    }

    pub fn with_redactor(mut self, redactor: PiiRedactor) -> Self {
        self.redactor = redactor;
        self
    }

    /// Drain the buffer and persist what was claimed.
    ///
    /// A batch dropped after exhausted retries is reported, not returned as
    /// an error.
    ///
    /// # Errors
    ///
    /// Only when the drain itself fails, in which case nothing was claimed.
    pub async fn flush(&self) -> Result<FlushReport> {
        let started = Instant::now();
        let records = self.buffer.drain(&self.key).await?;

        if records.is_empty() {
            debug!(key = %self.key, "Analytics buffer empty, nothing to flush");
            telemetry::record_flush(FlushStatus::Empty.as_str(), 0, started.elapsed());
            return Ok(FlushReport::empty());
        }

        let drained = records.len();
        let mut rows = Vec::with_capacity(drained);
        let mut raw_rows = Vec::with_capacity(drained);
        let mut malformed = 0;
        let mut metadata_defaulted = 0;

        for raw in records {
            match decode_record(&raw) {
                Ok(decoded) => {
                    if decoded.metadata_defaulted {
                        metadata_defaulted += 1;
                    }
                    rows.push(decoded.row);
                    raw_rows.push(raw);
                }
                Err(e) => {
                    malformed += 1;
                    warn!(
                        error = %e,
                        record = %self.redactor.excerpt(&raw, RECORD_EXCERPT_CHARS),
                        "Discarding undecodable analytics record"
                    );
                }
            }
        }

        telemetry::record_malformed(malformed);
        telemetry::record_metadata_defaulted(metadata_defaulted);
        if metadata_defaulted > 0 {
            debug!(count = metadata_defaulted, "Substituted empty metadata for unparseable values");
        }

        let mut report = FlushReport {
            status: FlushStatus::Persisted,
            drained,
            persisted: 0,
            dropped: 0,
            malformed,
            metadata_defaulted,
            attempts: 0,
        };

        if rows.is_empty() {
            telemetry::record_flush(report.status.as_str(), drained, started.elapsed());
            return Ok(report);
        }

        let batch_size = rows.len();
        match self.write_with_retry(&rows).await {
            Ok(attempts) => {
                report.attempts = attempts;
                report.persisted = batch_size;
                telemetry::record_events_persisted(batch_size);
                info!(
                    batch_size,
                    attempts,
                    malformed,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Flushed analytics events"
                );
            }
            Err((attempts, last_error)) => {
                report.status = FlushStatus::Dropped;
                report.attempts = attempts;
                report.dropped = batch_size;
                telemetry::record_events_dropped(batch_size);
                error!(
                    batch_size,
                    attempts,
                    error = %self.redactor.redact(&last_error.to_string()),
                    "Dropping analytics batch after exhausted retries"
                );
                self.dead_letter(raw_rows).await;
            }
        }

        telemetry::record_flush(report.status.as_str(), drained, started.elapsed());
        Ok(report)
    }

    /// Returns the number of attempts made, with the last error on failure.
    async fn write_with_retry(&self, rows: &[EventRow]) -> std::result::Result<u32, (u32, SinkError)> {
        let mut attempt = 1;
        loop {
            match self.sink.insert_batch(rows).await {
                Ok(()) => return Ok(attempt),
                Err(e) if attempt >= self.retry.max_attempts => return Err((attempt, e)),
                Err(e) => {
                    let delay = self.retry.backoff_before(attempt + 1);
                    warn!(
                        batch_size = rows.len(),
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %self.redactor.redact(&e.to_string()),
                        "Analytics batch write failed, retrying"
                    );
                    telemetry::record_sink_retry();
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn dead_letter(&self, raw_rows: Vec<String>) {
        let Some(key) = self.dead_letter_key.as_deref() else {
            return;
        };
        let count = raw_rows.len();
        match self.buffer.append_many(key, raw_rows).await {
            Ok(length) => warn!(dead_letter_key = key, count, length, "Dropped batch moved to dead-letter list"),
            Err(e) => error!(dead_letter_key = key, count, error = %e, "Failed to dead-letter dropped batch"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::sink::MockPersistenceSink;
    use event_buffer::InMemoryBufferStore;
    use mockall::Sequence;

    const KEY: &str = "analytics:events:batch";

    async fn buffer_with(count: usize) -> Arc<InMemoryBufferStore> {
        let buffer = Arc::new(InMemoryBufferStore::new());
        for i in 0..count {
            let event = Event::new("prompt_viewed", "prompt").with_entity_id(i.to_string());
            buffer.append(KEY, event.to_record().unwrap()).await.unwrap();
        }
        buffer
    }

    fn outage() -> SinkError {
        SinkError::WriteFailed("connection refused".to_string())
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 6,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(10),
        };
        assert_eq!(policy.backoff_before(1), Duration::ZERO);
        assert_eq!(policy.backoff_before(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_before(3), Duration::from_secs(4));
        assert_eq!(policy.backoff_before(4), Duration::from_secs(8));
        assert_eq!(policy.backoff_before(5), Duration::from_secs(10));
        assert_eq!(policy.backoff_before(60), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn empty_buffer_never_touches_sink() {
        let mut sink = MockPersistenceSink::new();
        sink.expect_insert_batch().never();

        let worker = FlushWorker::new(buffer_with(0).await, Arc::new(sink), KEY);
        let report = worker.flush().await.unwrap();

        assert_eq!(report.status, FlushStatus::Empty);
        assert_eq!(report.attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_with_the_same_rows() {
        let mut seq = Sequence::new();
        let mut sink = MockPersistenceSink::new();
        sink.expect_insert_batch()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Err(outage()));
        sink.expect_insert_batch()
            .withf(|rows| rows.len() == 5)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let buffer = buffer_with(5).await;
        let worker = FlushWorker::new(buffer.clone(), Arc::new(sink), KEY);
        let started = tokio::time::Instant::now();
        let report = worker.flush().await.unwrap();

        assert_eq!(report.status, FlushStatus::Persisted);
        assert_eq!(report.persisted, 5);
        assert_eq!(report.attempts, 3);
        // 2s then 4s of backoff
        assert!(started.elapsed() >= Duration::from_secs(6));
        assert_eq!(buffer.length(KEY).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_drop_without_requeue() {
        let mut sink = MockPersistenceSink::new();
        sink.expect_insert_batch().times(3).returning(|_| Err(outage()));

        let buffer = buffer_with(4).await;
        let worker = FlushWorker::new(buffer.clone(), Arc::new(sink), KEY);
        let report = worker.flush().await.unwrap();

        assert_eq!(report.status, FlushStatus::Dropped);
        assert_eq!(report.dropped, 4);
        assert_eq!(report.persisted, 0);
        assert_eq!(report.attempts, 3);
        assert_eq!(buffer.length(KEY).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_batch_goes_to_dead_letter_when_configured() {
        let mut sink = MockPersistenceSink::new();
        sink.expect_insert_batch().returning(|_| Err(outage()));

        let buffer = buffer_with(3).await;
        let worker = FlushWorker::new(buffer.clone(), Arc::new(sink), KEY)
            .with_retry(RetryPolicy {
                max_attempts: 2,
                ..RetryPolicy::default()
            })
            .with_dead_letter_key(Some("analytics:events:dead".to_string()));

        let report = worker.flush().await.unwrap();

        assert_eq!(report.status, FlushStatus::Dropped);
        assert_eq!(report.attempts, 2);
        assert_eq!(buffer.length(KEY).await.unwrap(), 0);
        assert_eq!(buffer.length("analytics:events:dead").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn malformed_records_are_skipped_and_counted() {
        let buffer = buffer_with(2).await;
        buffer.append(KEY, "{\"event_type\":".to_string()).await.unwrap();

        let mut sink = MockPersistenceSink::new();
        sink.expect_insert_batch()
            .withf(|rows| rows.len() == 2)
            .times(1)
            .returning(|_| Ok(()));

        let report = FlushWorker::new(buffer, Arc::new(sink), KEY).flush().await.unwrap();

        assert_eq!(report.drained, 3);
        assert_eq!(report.persisted, 2);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.status, FlushStatus::Persisted);
    }

    #[test]
    fn report_serializes_for_the_worker_log() {
        let value = serde_json::to_value(FlushReport::empty()).unwrap();
        assert_eq!(value["status"], "empty");
        assert_eq!(value["drained"], 0);
    }
}
