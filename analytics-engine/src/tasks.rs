// Background task handlers and the default beat schedule
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use task_queue::{QueueError, ScheduleEntry, TaskEnvelope, TaskHandler, TaskRegistry};
use tracing::info;

use crate::flush::FlushWorker;
use crate::sink::EventRetention;

pub const FLUSH_TASK: &str = "analytics.flush";
pub const CLEANUP_TASK: &str = "analytics.cleanup";

pub const TRIGGER_THRESHOLD: &str = "threshold";
pub const TRIGGER_SCHEDULE: &str = "schedule";
pub const TRIGGER_MANUAL: &str = "manual";

/// Retention windows beyond a century are clamped.
const MAX_DAYS_TO_KEEP: u64 = 36_500;

/// A flush job. `trigger` only labels metrics and logs.
pub fn flush_task(queue: &str, trigger: &str) -> TaskEnvelope {
    TaskEnvelope::new(FLUSH_TASK, queue).with_args(json!({ "trigger": trigger }))
}

fn trigger_label(task: &TaskEnvelope) -> &'static str {
    match task.args.get("trigger").and_then(Value::as_str) {
        Some(TRIGGER_THRESHOLD) => TRIGGER_THRESHOLD,
        Some(TRIGGER_SCHEDULE) => TRIGGER_SCHEDULE,
        Some(TRIGGER_MANUAL) => TRIGGER_MANUAL,
        _ => "unknown",
    }
}

/// Runs [`FlushWorker::flush`] and returns its report.
pub struct FlushTask {
    flusher: Arc<FlushWorker>,
}

impl FlushTask {
    pub fn new(flusher: Arc<FlushWorker>) -> Self {
        Self { flusher }
    }
}

#[async_trait]
impl TaskHandler for FlushTask {
    async fn run(&self, task: &TaskEnvelope) -> task_queue::Result<Value> {
        telemetry::record_flush_trigger(trigger_label(task));
        let report = self
            .flusher
            .flush()
            .await
            .map_err(|e| QueueError::task_failed(&task.name, e))?;
        Ok(serde_json::to_value(report)?)
    }
}

/// Deletes persisted events older than `days_to_keep` days.
///
/// A `days_to_keep` task argument overrides the configured default.
pub struct CleanupTask {
    retention: Arc<dyn EventRetention>,
    default_days: u32,
}

impl CleanupTask {
    pub fn new(retention: Arc<dyn EventRetention>, default_days: u32) -> Self {
        Self { retention, default_days }
    }
}

#[async_trait]
impl TaskHandler for CleanupTask {
    async fn run(&self, task: &TaskEnvelope) -> task_queue::Result<Value> {
        let days = task
            .args
            .get("days_to_keep")
            .and_then(Value::as_u64)
            .unwrap_or(u64::from(self.default_days))
            .min(MAX_DAYS_TO_KEEP);
        let cutoff = Utc::now() - chrono::Duration::days(i64::try_from(days).unwrap_or(0));

        let deleted = self
            .retention
            .delete_older_than(cutoff)
            .await
            .map_err(|e| QueueError::task_failed(&task.name, e))?;

        info!(deleted, days_to_keep = days, "Analytics retention sweep finished");
        Ok(json!({
            "status": "success",
            "deleted_count": deleted,
            "cutoff": cutoff.to_rfc3339(),
        }))
    }
}

/// Handlers for every analytics task.
pub fn registry(flusher: Arc<FlushWorker>, retention: Arc<dyn EventRetention>, days_to_keep: u32) -> TaskRegistry {
    TaskRegistry::new()
        .register(FLUSH_TASK, Arc::new(FlushTask::new(flusher)))
        .register(CLEANUP_TASK, Arc::new(CleanupTask::new(retention, days_to_keep)))
}

/// Minute flush plus the daily retention sweep.
///
/// The flush runs as soon as beat starts; the sweep waits a full interval so
/// restarts do not trigger extra deletes.
pub fn default_schedule(settings: &config_engine::AnalyticsSettings) -> Vec<ScheduleEntry> {
    let queue = &settings.worker.queue;
    vec![
        ScheduleEntry::new("flush-analytics-events", FLUSH_TASK, queue, settings.flush_interval())
            .with_args(json!({ "trigger": TRIGGER_SCHEDULE })),
        ScheduleEntry::new(
            "clean-old-analytics",
            CLEANUP_TASK,
            queue,
            Duration::from_secs(settings.retention.cleanup_interval_seconds),
        )
        .with_args(json!({ "days_to_keep": settings.retention.days_to_keep }))
        .delayed(),
    ]
}
