//! Layered configuration for the PromptMarket analytics pipeline
//!
//! Settings are resolved in this order, later sources winning:
//!
//! - Built-in defaults (`batch_size = 100`, `flush_interval_seconds = 60`,
//!   three sink write attempts, ...)
//! - An optional `analytics.{toml,yaml,json}` file, or an explicit path
//! - Environment variables prefixed with `ANALYTICS__`, using `__` for nesting
//!
//! # Example
//!
//! ```no_run
//! use config_engine::AnalyticsSettings;
//!
//! // ANALYTICS__BATCH_SIZE=250 ANALYTICS__REDIS__HOST=cache.internal
//! let settings = AnalyticsSettings::load(None)?;
//! println!("flushing every {} events", settings.batch_size);
//! # Ok::<(), config_engine::ConfigError>(())
//! ```

pub mod error;
pub mod providers;
pub mod settings;
pub mod validation;

pub use error::*;
pub use settings::*;

use config::builder::DefaultState;
use config::ConfigBuilder;
use std::path::Path;

impl AnalyticsSettings {
    /// Load from the default file location (or `path`) and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or parsed, or if the
    /// resulting settings fail validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::from_builder(providers::layered(path))
    }

    /// Parse a TOML document on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed TOML or invalid settings.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Self::from_builder(providers::from_toml_str(contents))
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings: Self = builder.build()?.try_deserialize()?;
        validation::validate(&settings)?;

        tracing::debug!(
            batch_size = settings.batch_size,
            flush_interval_seconds = settings.flush_interval_seconds,
            redis_host = %settings.redis.host,
            redis_db = settings.redis.db,
            "Analytics settings loaded"
        );

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let settings = AnalyticsSettings::from_toml_str("").unwrap();

        assert_eq!(settings.batch_size, 100);
        assert_eq!(settings.flush_interval_seconds, 60);
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.buffer.key, DEFAULT_BUFFER_KEY);
        assert_eq!(settings.worker.queue, DEFAULT_ANALYTICS_QUEUE);
        assert!(settings.buffer.dead_letter_key.is_none());
    }

    #[test]
    fn nested_sections_override_defaults() {
        let settings = AnalyticsSettings::from_toml_str(
            r#"
            batch_size = 250
            flush_interval_seconds = 15

            [redis]
            host = "cache.internal"
            port = 6380
            password = "s3cr:t"
            db = 2

            [retry]
            max_attempts = 5
            initial_backoff_ms = 100
            "#,
        )
        .unwrap();

        assert_eq!(settings.batch_size, 250);
        assert_eq!(settings.flush_interval_seconds, 15);
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.max_backoff_ms, 30_000);
        assert_eq!(settings.redis.url(), "redis://:s3cr%3At@cache.internal:6380/2");
    }

    #[test]
    fn redis_url_without_password() {
        let redis = RedisSettings::default();
        assert_eq!(redis.url(), "redis://localhost:6379/0");
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = AnalyticsSettings::from_toml_str("batch_size = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn zero_track_timeout_is_rejected() {
        let err = AnalyticsSettings::from_toml_str("[buffer]\ntrack_timeout_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref m) if m.contains("track_timeout_ms")));
    }

    #[test]
    fn zero_cleanup_interval_is_rejected() {
        let err = AnalyticsSettings::from_toml_str("[retention]\ncleanup_interval_seconds = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref m) if m.contains("cleanup_interval_seconds")));
    }

    #[test]
    fn dead_letter_key_must_differ_from_buffer_key() {
        let err = AnalyticsSettings::from_toml_str(
            r#"
            [buffer]
            key = "analytics:events:batch"
            dead_letter_key = "analytics:events:batch"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn settings_round_trip_through_json() {
        let settings = AnalyticsSettings::default();
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["batch_size"], 100);
        assert_eq!(json["retention"]["days_to_keep"], 90);
    }
}
