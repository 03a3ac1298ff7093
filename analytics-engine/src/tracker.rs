// Event tracker: append and threshold trigger
use event_buffer::BufferStore;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use task_queue::TaskQueue;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::event::{Event, RequestContext};
use crate::tasks;

/// Tracker settings shared by every call site.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub key: String,
    pub queue: String,
    pub batch_size: usize,
    pub track_timeout: Duration,
}

impl TrackerConfig {
    pub fn from_settings(settings: &config_engine::AnalyticsSettings) -> Self {
        Self {
            key: settings.buffer.key.clone(),
            queue: settings.worker.queue.clone(),
            batch_size: settings.batch_size,
            track_timeout: settings.buffer.track_timeout(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            key: config_engine::DEFAULT_BUFFER_KEY.to_string(),
            queue: config_engine::DEFAULT_ANALYTICS_QUEUE.to_string(),
            batch_size: 100,
            track_timeout: Duration::from_millis(250),
        }
    }
}

/// Appends events to the buffer and asks for a flush once it is full.
///
/// Tracking never fails from the caller's point of view: every error is
/// logged and counted, and the request carries on.
pub struct EventTracker {
    buffer: Arc<dyn BufferStore>,
    queue: Arc<dyn TaskQueue>,
    config: TrackerConfig,
}

impl EventTracker {
    pub fn new(buffer: Arc<dyn BufferStore>, queue: Arc<dyn TaskQueue>, config: TrackerConfig) -> Self {
        Self { buffer, queue, config }
    }

    /// Start building an event to track.
    pub fn track(&self, event_type: impl Into<String>, entity_type: impl Into<String>) -> PendingEvent<'_> {
        PendingEvent {
            tracker: self,
            event: Event::new(event_type, entity_type),
        }
    }

    pub async fn track_event(&self, event: Event) {
        let record = match event.to_record() {
            Ok(record) => record,
            Err(e) => {
                warn!(event_type = %event.event_type, error = %e, "Failed to serialize analytics event");
                telemetry::record_track_failure("serialize");
                return;
            }
        };

        let appended = tokio::time::timeout(self.config.track_timeout, self.buffer.append(&self.config.key, record)).await;
        let length = match appended {
            Ok(Ok(length)) => length,
            Ok(Err(e)) => {
                warn!(event_type = %event.event_type, error = %e, "Failed to buffer analytics event");
                telemetry::record_track_failure("buffer");
                return;
            }
            Err(_) => {
                warn!(
                    event_type = %event.event_type,
                    timeout_ms = self.config.track_timeout.as_millis() as u64,
                    "Timed out buffering analytics event"
                );
                telemetry::record_track_failure("timeout");
                return;
            }
        };

        telemetry::record_event_tracked(length);
        debug!(event_type = %event.event_type, buffer_length = length, "Analytics event buffered");

        if length >= self.config.batch_size {
            self.request_flush(length).await;
        }
    }

    /// Current buffer length, or 0 when the store cannot be reached.
    pub async fn get_queue_size(&self) -> usize {
        match self.buffer.length(&self.config.key).await {
            Ok(length) => {
                telemetry::record_buffer_length(length);
                length
            }
            Err(e) => {
                warn!(error = %e, "Failed to read analytics buffer length");
                0
            }
        }
    }

    async fn request_flush(&self, length: usize) {
        let task = tasks::flush_task(&self.config.queue, tasks::TRIGGER_THRESHOLD);
        let task_id = task.id;
        match self.queue.enqueue(task).await {
            Ok(()) => debug!(buffer_length = length, %task_id, "Threshold flush enqueued"),
            Err(e) => {
                warn!(buffer_length = length, error = %e, "Failed to enqueue threshold flush");
                telemetry::record_track_failure("enqueue");
            }
        }
    }
}

/// Builder returned by [`EventTracker::track`].
#[must_use = "an event is only tracked once `send` is awaited"]
pub struct PendingEvent<'a> {
    tracker: &'a EventTracker,
    event: Event,
}

impl PendingEvent<'_> {
    pub fn user(mut self, user_id: Option<Uuid>) -> Self {
        self.event.user_id = user_id;
        self
    }

    pub fn entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.event = self.event.with_entity_id(entity_id);
        self
    }

    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.event = self.event.with_metadata(metadata);
        self
    }

    pub fn context(mut self, context: &RequestContext) -> Self {
        self.event = self.event.with_context(context);
        self
    }

    pub async fn send(self) {
        self.tracker.track_event(self.event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use event_buffer::{BufferError, InMemoryBufferStore};
    use task_queue::InMemoryTaskQueue;

    struct UnreachableStore;

    #[async_trait]
    impl BufferStore for UnreachableStore {
        async fn append(&self, _key: &str, _record: String) -> event_buffer::Result<usize> {
            Err(BufferError::ConnectionError("connection refused".to_string()))
        }

        async fn drain(&self, _key: &str) -> event_buffer::Result<Vec<String>> {
            Err(BufferError::ConnectionError("connection refused".to_string()))
        }

        async fn length(&self, _key: &str) -> event_buffer::Result<usize> {
            Err(BufferError::ConnectionError("connection refused".to_string()))
        }
    }

    struct StalledStore;

    #[async_trait]
    impl BufferStore for StalledStore {
        async fn append(&self, _key: &str, _record: String) -> event_buffer::Result<usize> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(1)
        }

        async fn drain(&self, _key: &str) -> event_buffer::Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn length(&self, _key: &str) -> event_buffer::Result<usize> {
            Ok(0)
        }
    }

    fn config(batch_size: usize) -> TrackerConfig {
        TrackerConfig {
            batch_size,
            ..TrackerConfig::default()
        }
    }

    #[tokio::test]
    async fn threshold_enqueues_one_flush_per_crossing_append() {
        let buffer = Arc::new(InMemoryBufferStore::new());
        let queue = InMemoryTaskQueue::new();
        let tracker = EventTracker::new(buffer, queue.clone(), config(3));

        for _ in 0..4 {
            tracker.track("prompt_viewed", "prompt").send().await;
        }

        // Lengths 3 and 4 both reach the threshold; nothing drained in between.
        assert_eq!(queue.pending_names("analytics"), vec!["analytics.flush", "analytics.flush"]);
        assert_eq!(tracker.get_queue_size().await, 4);
    }

    #[tokio::test]
    async fn unreachable_store_is_swallowed() {
        let queue = InMemoryTaskQueue::new();
        let tracker = EventTracker::new(Arc::new(UnreachableStore), queue.clone(), config(1));

        tracker.track_event(Event::new("prompt_clicked", "prompt")).await;

        assert_eq!(tracker.get_queue_size().await, 0);
        assert_eq!(queue.pending("analytics"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_append_times_out() {
        let queue = InMemoryTaskQueue::new();
        let tracker = EventTracker::new(Arc::new(StalledStore), queue.clone(), config(1));

        let started = tokio::time::Instant::now();
        tracker.track_event(Event::new("prompt_clicked", "prompt")).await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(queue.pending("analytics"), 0);
    }
}
