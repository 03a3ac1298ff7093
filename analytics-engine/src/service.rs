// Service object owning the pipeline clients
use config_engine::AnalyticsSettings;
use database_layer::{AnalyticsEventRepository, DatabasePool, PoolOptions};
use event_buffer::{BufferStore, RedisBufferStore};
use logger_redacted::PiiRedactor;
use std::sync::Arc;
use std::time::Duration;
use task_queue::{RedisTaskQueue, TaskQueue};
use tracing::info;

use crate::error::{AnalyticsError, Result};
use crate::event::Event;
use crate::flush::{FlushReport, FlushWorker, RetryPolicy};
use crate::sink::{PersistenceSink, PostgresSink};
use crate::tasks;
use crate::tracker::{EventTracker, PendingEvent, TrackerConfig};

/// Entry point used by request handlers.
///
/// Built once at startup and shared behind an `Arc`. Holds no global state;
/// every process (web, worker, beat) constructs its own.
pub struct AnalyticsService {
    tracker: EventTracker,
    flusher: Arc<FlushWorker>,
}

impl AnalyticsService {
    /// Wire a service from already-built parts.
    ///
    /// `flusher` is shared with the flush task handler, so a manual flush and
    /// a queued one run the same code against the same buffer key.
    pub fn new(buffer: Arc<dyn BufferStore>, queue: Arc<dyn TaskQueue>, flusher: Arc<FlushWorker>, config: TrackerConfig) -> Self {
        Self {
            tracker: EventTracker::new(buffer, queue, config),
            flusher,
        }
    }

    pub fn flusher(&self) -> Arc<FlushWorker> {
        Arc::clone(&self.flusher)
    }

    /// Buffer one event. Never fails and never waits for a flush.
    pub async fn track_event(&self, event: Event) {
        self.tracker.track_event(event).await;
    }

    pub fn track(&self, event_type: impl Into<String>, entity_type: impl Into<String>) -> PendingEvent<'_> {
        self.tracker.track(event_type, entity_type)
    }

    /// Buffered events not yet flushed; 0 if the buffer is unreachable.
    pub async fn get_queue_size(&self) -> usize {
        self.tracker.get_queue_size().await
    }

    /// Flush in the calling task instead of through the queue.
    ///
    /// # Errors
    ///
    /// Only if draining the buffer fails.
    pub async fn flush_events_now(&self) -> Result<FlushReport> {
        telemetry::record_flush_trigger(tasks::TRIGGER_MANUAL);
        self.flusher.flush().await
    }

    /// Final flush before the process exits.
    ///
    /// # Errors
    ///
    /// Only if draining the buffer fails.
    pub async fn shutdown(&self) -> Result<FlushReport> {
        let report = self.flush_events_now().await?;
        info!(
            status = report.status.as_str(),
            persisted = report.persisted,
            dropped = report.dropped,
            "Analytics service shut down"
        );
        Ok(report)
    }
}

/// Production clients built from settings.
pub struct Backends {
    pub buffer: Arc<RedisBufferStore>,
    pub queue: Arc<RedisTaskQueue>,
    pub sink: Arc<PostgresSink>,
    database: DatabasePool,
}

impl Backends {
    /// Connect Redis (buffer and broker) and Postgres.
    ///
    /// The Postgres pool is lazy so tracking-only processes start without a
    /// database; the first flush opens it.
    ///
    /// # Errors
    ///
    /// Fails if Redis cannot be reached or the database URL is invalid.
    pub async fn connect(settings: &AnalyticsSettings) -> Result<Self> {
        let redis_url = settings.redis.url();
        let buffer = RedisBufferStore::connect(&redis_url).await?;
        let queue = RedisTaskQueue::connect(&redis_url).await?;

        let options = PoolOptions {
            max_connections: settings.database.max_connections,
            acquire_timeout: Duration::from_secs(settings.database.acquire_timeout_secs),
        };
        let pool = DatabasePool::connect_lazy(&settings.database.url, &options)
            .map_err(|e| AnalyticsError::Sink(e.into()))?;

        Ok(Self {
            buffer: Arc::new(buffer),
            queue: Arc::new(queue),
            sink: Arc::new(PostgresSink::new(AnalyticsEventRepository::new(pool.clone()))),
            database: pool,
        })
    }

    /// Release the database pool; call after the last flush.
    pub async fn close(&self) {
        self.database.close().await;
    }

    /// Flush worker configured from `settings`.
    pub fn flusher(&self, settings: &AnalyticsSettings, redactor: PiiRedactor) -> Arc<FlushWorker> {
        flusher(settings, self.buffer.clone(), self.sink.clone(), redactor)
    }

    pub fn service(&self, settings: &AnalyticsSettings, flusher: Arc<FlushWorker>) -> AnalyticsService {
        AnalyticsService::new(
            self.buffer.clone(),
            self.queue.clone(),
            flusher,
            TrackerConfig::from_settings(settings),
        )
    }
}

/// Flush worker for any buffer and sink, configured from `settings`.
pub fn flusher(
    settings: &AnalyticsSettings,
    buffer: Arc<dyn BufferStore>,
    sink: Arc<dyn PersistenceSink>,
    redactor: PiiRedactor,
) -> Arc<FlushWorker> {
    if let Some(key) = settings.buffer.dead_letter_key.as_deref() {
        info!(dead_letter_key = key, "Dead-lettering enabled for dropped analytics batches");
    }
    Arc::new(
        FlushWorker::new(buffer, sink, &settings.buffer.key)
            .with_retry(RetryPolicy::from_settings(&settings.retry))
            .with_dead_letter_key(settings.buffer.dead_letter_key.clone())
            .with_redactor(redactor),
    )
}
