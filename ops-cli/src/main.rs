mod cli;
mod commands;

use analytics_engine::Backends;
use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use config_engine::AnalyticsSettings;
use logger_redacted::LoggerConfig;
use tracing::{info, warn};

use crate::cli::{Cli, Command};
use crate::commands::App;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Cli::parse();

    let settings = AnalyticsSettings::load(args.config.as_deref()).context("Failed to load analytics settings")?;

    let level = if args.verbose { "debug" } else { settings.logging.level.as_str() };
    let logger = LoggerConfig::new(level)
        .with_json(args.json_logs || settings.logging.json)
        .with_redaction(settings.logging.redaction_enabled);
    let redactor = logger_redacted::init(&logger).context("Failed to initialize logging")?;

    if let Some(addr) = settings.metrics.listen {
        if let Err(e) = telemetry::install_prometheus(addr) {
            warn!(error = %e, "Metrics exporter disabled");
        }
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        redis = %format!("{}:{}/{}", settings.redis.host, settings.redis.port, settings.redis.db),
        buffer_key = %settings.buffer.key,
        batch_size = settings.batch_size,
        "{}",
        "PromptMarket analytics".bright_cyan()
    );

    let backends = Backends::connect(&settings).await.context("Failed to connect backends")?;
    let flusher = backends.flusher(&settings, redactor);
    let service = backends.service(&settings, flusher.clone());
    let app = App {
        settings,
        backends,
        flusher,
        service,
    };

    let outcome = match args.command {
        Command::Worker { concurrency } => commands::worker(&app, concurrency).await,
        Command::Beat => commands::beat(&app).await,
        Command::Flush => commands::flush(&app).await,
        Command::QueueSize => commands::queue_size(&app).await,
        Command::Track(track) => commands::track(&app, track).await,
        Command::Cleanup { days } => commands::cleanup(&app, days).await,
    };

    app.backends.close().await;
    outcome
}
