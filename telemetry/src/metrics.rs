// Pipeline metrics recorded through the `metrics` facade.
//
// Every function is a no-op until a recorder is installed, so library code
// can call them unconditionally.
#![allow(clippy::cast_precision_loss)]

use ::metrics::{counter, gauge, histogram};
use std::time::Duration;

pub const EVENTS_TRACKED: &str = "analytics_events_tracked_total";
pub const TRACK_FAILURES: &str = "analytics_track_failures_total";
pub const FLUSH_TRIGGERS: &str = "analytics_flush_triggers_total";
pub const FLUSH_BATCH_SIZE: &str = "analytics_flush_batch_size";
pub const FLUSH_DURATION: &str = "analytics_flush_duration_seconds";
pub const FLUSH_OUTCOMES: &str = "analytics_flush_outcomes_total";
pub const SINK_RETRIES: &str = "analytics_sink_retries_total";
pub const EVENTS_PERSISTED: &str = "analytics_events_persisted_total";
pub const EVENTS_DROPPED: &str = "analytics_events_dropped_total";
pub const METADATA_DEFAULTED: &str = "analytics_metadata_defaulted_total";
pub const RECORDS_MALFORMED: &str = "analytics_records_malformed_total";
pub const BUFFER_LENGTH: &str = "analytics_buffer_length";
pub const TASKS_COMPLETED: &str = "analytics_tasks_completed_total";

pub fn record_event_tracked(buffer_length: usize) {
    counter!(EVENTS_TRACKED).increment(1);
    gauge!(BUFFER_LENGTH).set(buffer_length as f64);
}

/// `reason` is one of `serialize`, `buffer`, `timeout`, `enqueue`.
pub fn record_track_failure(reason: &'static str) {
    counter!(TRACK_FAILURES, "reason" => reason).increment(1);
}

/// `trigger` is one of `threshold`, `schedule`, `manual`.
pub fn record_flush_trigger(trigger: &'static str) {
    counter!(FLUSH_TRIGGERS, "trigger" => trigger).increment(1);
}

pub fn record_buffer_length(length: usize) {
    gauge!(BUFFER_LENGTH).set(length as f64);
}

/// One completed flush. `status` is `empty`, `persisted` or `dropped`.
pub fn record_flush(status: &'static str, batch_size: usize, elapsed: Duration) {
    counter!(FLUSH_OUTCOMES, "status" => status).increment(1);
    if batch_size > 0 {
        histogram!(FLUSH_BATCH_SIZE).record(batch_size as f64);
    }
    histogram!(FLUSH_DURATION).record(elapsed.as_secs_f64());
}

pub fn record_sink_retry() {
    counter!(SINK_RETRIES).increment(1);
}

pub fn record_events_persisted(count: usize) {
    counter!(EVENTS_PERSISTED).increment(count as u64);
}

pub fn record_events_dropped(count: usize) {
    counter!(EVENTS_DROPPED).increment(count as u64);
}

pub fn record_metadata_defaulted(count: usize) {
    if count > 0 {
        counter!(METADATA_DEFAULTED).increment(count as u64);
    }
}

pub fn record_malformed(count: usize) {
    if count > 0 {
        counter!(RECORDS_MALFORMED).increment(count as u64);
    }
}

pub fn record_task_completed(task: &str, succeeded: bool) {
    let status = if succeeded { "success" } else { "failure" };
    counter!(TASKS_COMPLETED, "task" => task.to_string(), "status" => status).increment(1);
}
