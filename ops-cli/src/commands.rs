use analytics_engine::tasks::{self, CleanupTask, CLEANUP_TASK};
use analytics_engine::{AnalyticsService, Backends, Event, FlushReport, FlushStatus, FlushWorker};
use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use config_engine::AnalyticsSettings;
use std::sync::Arc;
use std::time::Duration;
use task_queue::{Scheduler, TaskConsumer, TaskEnvelope, TaskHandler, WorkerPool};
use tokio::sync::watch;
use tracing::{error, info};

use crate::cli::TrackArgs;

/// Everything a subcommand needs.
pub struct App {
    pub settings: AnalyticsSettings,
    pub backends: Backends,
    pub flusher: Arc<FlushWorker>,
    pub service: AnalyticsService,
}

pub async fn worker(app: &App, concurrency: Option<usize>) -> Result<()> {
    let concurrency = concurrency.unwrap_or(app.settings.worker.concurrency).max(1);
    let queue = app.settings.worker.queue.clone();

    let mut consumers: Vec<Box<dyn TaskConsumer>> = Vec::with_capacity(concurrency);
    for _ in 0..concurrency {
        let consumer = app
            .backends
            .queue
            .consumer()
            .await
            .context("Failed to open worker connection")?;
        consumers.push(Box::new(consumer));
    }

    let registry = tasks::registry(
        app.flusher.clone(),
        app.backends.sink.clone(),
        app.settings.retention.days_to_keep,
    );
    let pool = WorkerPool::new(&queue, registry)
        .with_poll_timeout(Duration::from_secs(app.settings.worker.poll_timeout_secs.max(1)));

    println!(
        "{} {} consumers on queue {}",
        "Starting".bright_cyan(),
        concurrency,
        queue.bright_white()
    );

    let shutdown = shutdown_signal();
    let stats = pool.run(consumers, shutdown).await;

    let report = app.service.shutdown().await.context("Final flush failed")?;
    println!(
        "{} {} tasks succeeded, {} failed; final flush {}",
        "Stopped:".bright_green(),
        stats.succeeded(),
        stats.failed(),
        report.status.as_str()
    );
    Ok(())
}

pub async fn beat(app: &App) -> Result<()> {
    let scheduler = tasks::default_schedule(&app.settings)
        .into_iter()
        .fold(Scheduler::new(app.backends.queue.clone()), Scheduler::add);
    for entry in scheduler.entries() {
        println!(
            "{} {} -> {} every {:?}{}",
            "Scheduling".bright_cyan(),
            entry.name.bright_white(),
            entry.task,
            entry.interval,
            if entry.run_at_start { "" } else { " (first run after one interval)" }
        );
    }

    scheduler.run(shutdown_signal()).await;
    println!("{}", "Scheduler stopped".bright_green());
    Ok(())
}

pub async fn flush(app: &App) -> Result<()> {
    let report = app.service.flush_events_now().await.context("Flush failed")?;
    print_report(&report)?;
    if report.status == FlushStatus::Dropped {
        return Err(anyhow!("batch of {} events was dropped", report.dropped));
    }
    Ok(())
}

pub async fn queue_size(app: &App) -> Result<()> {
    let size = app.service.get_queue_size().await;
    println!("{} {}", "Buffered events:".bright_cyan(), size.to_string().bright_white());
    Ok(())
}

pub async fn track(app: &App, args: TrackArgs) -> Result<()> {
    let mut event = Event::new(args.event_type, args.entity_type);
    event.user_id = args.user_id;
    event.session_id = args.session_id;
    event.entity_id = args.entity_id;
    if let Some(raw) = args.metadata {
        let metadata: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&raw).context("--metadata must be a JSON object")?;
        event.metadata = metadata;
    }

    app.service.track_event(event).await;
    let size = app.service.get_queue_size().await;
    println!("{} buffer now holds {} events", "Tracked;".bright_green(), size);
    Ok(())
}

pub async fn cleanup(app: &App, days: Option<u32>) -> Result<()> {
    let days = days.unwrap_or(app.settings.retention.days_to_keep);
    let task = CleanupTask::new(app.backends.sink.clone(), days);
    let result = task
        .run(&TaskEnvelope::new(CLEANUP_TASK, &app.settings.worker.queue))
        .await
        .context("Retention sweep failed")?;

    println!(
        "{} {} events older than {} days",
        "Deleted".bright_green(),
        result["deleted_count"],
        days
    );
    Ok(())
}

fn print_report(report: &FlushReport) -> Result<()> {
    let status = match report.status {
        FlushStatus::Empty => "empty".bright_blue(),
        FlushStatus::Persisted => "persisted".bright_green(),
        FlushStatus::Dropped => "dropped".bright_red(),
    };
    println!("{} {}", "Flush:".bright_cyan(), status);
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Flips to `true` on Ctrl-C.
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C, shutting down"),
        }
        let _ = tx.send(true);
    });
    rx
}
