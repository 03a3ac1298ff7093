// Periodic task publisher
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::queue::TaskQueue;
use crate::task::TaskEnvelope;

/// One periodic job.
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    /// Label used in logs, e.g. `flush-analytics-events`.
    pub name: String,
    pub task: String,
    pub queue: String,
    pub interval: Duration,
    pub args: serde_json::Value,
    /// Publish on the first tick instead of one interval after start.
    pub run_at_start: bool,
}

impl ScheduleEntry {
    pub fn new(name: &str, task: &str, queue: &str, interval: Duration) -> Self {
        Self {
            name: name.to_string(),
            task: task.to_string(),
            queue: queue.to_string(),
            interval,
            args: serde_json::Value::Null,
            run_at_start: true,
        }
    }

    /// Wait one full interval before the first run.
    pub fn delayed(mut self) -> Self {
        self.run_at_start = false;
        self
    }

    pub fn with_args(mut self, args: serde_json::Value) -> Self {
        self.args = args;
        self
    }

    fn envelope(&self) -> TaskEnvelope {
        TaskEnvelope::new(&self.task, &self.queue).with_args(self.args.clone())
    }
}

/// Publishes every entry on its own interval.
///
/// Entries run at start unless built with [`ScheduleEntry::delayed`].
///
/// Ticks missed while the broker is slow are delayed, never bunched, so a
/// stalled scheduler never floods the queue on recovery.
pub struct Scheduler {
    queue: Arc<dyn TaskQueue>,
    entries: Vec<ScheduleEntry>,
}

impl Scheduler {
    pub fn new(queue: Arc<dyn TaskQueue>) -> Self {
        Self {
            queue,
            entries: Vec::new(),
        }
    }

    pub fn add(mut self, entry: ScheduleEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        info!(entries = self.entries.len(), "Scheduler starting");

        let mut tickers = JoinSet::new();
        for entry in self.entries {
            if entry.interval.is_zero() {
                error!(entry = %entry.name, "Ignoring schedule entry with zero interval");
                continue;
            }
            tickers.spawn(tick(Arc::clone(&self.queue), entry, shutdown.clone()));
        }

        while let Some(joined) = tickers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Schedule ticker exited abnormally");
            }
        }

        info!("Scheduler stopped");
    }
}

async fn tick(queue: Arc<dyn TaskQueue>, entry: ScheduleEntry, mut shutdown: watch::Receiver<bool>) {
    let first = if entry.run_at_start {
        Instant::now()
    } else {
        Instant::now() + entry.interval
    };
    let mut ticker = tokio::time::interval_at(first, entry.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let task = entry.envelope();
                let task_id = task.id;
                match queue.enqueue(task).await {
                    Ok(()) => debug!(entry = %entry.name, task = %entry.task, %task_id, "Scheduled task published"),
                    Err(e) => error!(entry = %entry.name, task = %entry.task, error = %e, "Failed to publish scheduled task"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
