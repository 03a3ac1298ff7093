pub mod config;
pub mod error;
pub mod redactor;

pub use config::*;
pub use error::*;
pub use redactor::*;

use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Structured logging for the analytics pipeline
///
/// Installs a global `tracing` subscriber and hands back the redactor that
/// call sites use for free-form payloads (raw buffered records, sink error
/// messages) before attaching them to a log event. Structured fields such as
/// `batch_size` or `attempt` are never redacted.
///
/// `RUST_LOG` takes precedence over [`LoggerConfig::log_level`].
///
/// # Example
///
/// ```no_run
/// use logger_redacted::{init, LoggerConfig};
///
/// let redactor = init(&LoggerConfig::new("info").with_json(true))?;
/// tracing::warn!(
///     record = %redactor.excerpt(r#"{"ip_address":"10.1.2.3"}"#, 200),
///     "Discarding undecodable analytics record"
/// );
/// # Ok::<(), logger_redacted::LoggerError>(())
/// ```
///
/// # Errors
///
/// Fails when the filter directive is invalid or a global subscriber is
/// already installed.
pub fn init(config: &LoggerConfig) -> Result<PiiRedactor> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|e| LoggerError::InvalidFilter {
            directive: config.log_level.clone(),
            reason: e.to_string(),
        })?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if config.json {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .json(),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_timer(ChronoUtc::rfc_3339()),
            )
            .try_init()
    };

    installed.map_err(|e| LoggerError::AlreadyInitialized(e.to_string()))?;

    Ok(redactor_for(config))
}

/// Redactor matching `config` without touching the global subscriber.
pub fn redactor_for(config: &LoggerConfig) -> PiiRedactor {
    if config.redaction_enabled {
        PiiRedactor::default()
    } else {
        PiiRedactor::disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_filter_is_reported() {
        // Only meaningful when RUST_LOG is not set by the test environment.
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let err = init(&LoggerConfig::new("analytics=loudest")).unwrap_err();
        assert!(matches!(err, LoggerError::InvalidFilter { .. }));
    }

    #[test]
    fn redactor_follows_config() {
        let text = "from 10.0.0.1";
        assert_eq!(redactor_for(&LoggerConfig::default().with_redaction(false)).redact(text), text);
        assert_ne!(redactor_for(&LoggerConfig::default()).redact(text), text);
    }
}
