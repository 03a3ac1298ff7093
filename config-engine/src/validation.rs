// Settings validation
use crate::error::{ConfigError, Result};
use crate::settings::AnalyticsSettings;

/// Reject settings that would stall or spin the pipeline.
pub fn validate(settings: &AnalyticsSettings) -> Result<()> {
    if settings.batch_size == 0 {
        return Err(invalid("batch_size must be at least 1"));
    }

    if settings.flush_interval_seconds == 0 {
        return Err(invalid("flush_interval_seconds must be at least 1"));
    }

    if settings.retry.max_attempts == 0 {
        return Err(invalid("retry.max_attempts must be at least 1"));
    }

    if settings.retry.max_backoff_ms < settings.retry.initial_backoff_ms {
        return Err(invalid(
            "retry.max_backoff_ms must not be smaller than retry.initial_backoff_ms",
        ));
    }

    if settings.worker.concurrency == 0 {
        return Err(invalid("worker.concurrency must be at least 1"));
    }

    if settings.buffer.key.trim().is_empty() {
        return Err(invalid("buffer.key must not be empty"));
    }

    if settings.buffer.track_timeout_ms == 0 {
        return Err(invalid("buffer.track_timeout_ms must be at least 1"));
    }

    if settings.buffer.dead_letter_key.as_deref() == Some(settings.buffer.key.as_str()) {
        return Err(invalid("buffer.dead_letter_key must differ from buffer.key"));
    }

    if settings.retention.days_to_keep == 0 {
        return Err(invalid("retention.days_to_keep must be at least 1"));
    }

    if settings.retention.cleanup_interval_seconds == 0 {
        return Err(invalid("retention.cleanup_interval_seconds must be at least 1"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
