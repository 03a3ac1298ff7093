use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Buffer key shared by every tracker and flush worker.
pub const DEFAULT_BUFFER_KEY: &str = "analytics:events:batch";

/// Logical task queue the analytics jobs are routed to.
pub const DEFAULT_ANALYTICS_QUEUE: &str = "analytics";

/// Top-level settings for the analytics pipeline
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalyticsSettings {
    #[serde(default)]
    pub redis: RedisSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub buffer: BufferSettings,

    /// Buffer length that triggers an eager flush (default: 100)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Scheduler cadence in seconds (default: 60)
    #[serde(default = "default_flush_interval")]
    pub flush_interval_seconds: u64,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub worker: WorkerSettings,

    #[serde(default)]
    pub retention: RetentionSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    #[serde(default)]
    pub metrics: MetricsSettings,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            redis: RedisSettings::default(),
            database: DatabaseSettings::default(),
            buffer: BufferSettings::default(),
            batch_size: default_batch_size(),
            flush_interval_seconds: default_flush_interval(),
            retry: RetrySettings::default(),
            worker: WorkerSettings::default(),
            retention: RetentionSettings::default(),
            logging: LoggingSettings::default(),
            metrics: MetricsSettings::default(),
        }
    }
}

impl AnalyticsSettings {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_seconds)
    }
}

/// Buffer store connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisSettings {
    #[serde(default = "default_redis_host")]
    pub host: String,

    #[serde(default = "default_redis_port")]
    pub port: u16,

    pub password: Option<String>,

    /// Logical database index
    #[serde(default)]
    pub db: i64,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            host: default_redis_host(),
            port: default_redis_port(),
            password: None,
            db: 0,
        }
    }
}

impl RedisSettings {
    /// Connection URL in the `redis://[:password@]host:port/db` form.
    pub fn url(&self) -> String {
        match self.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                urlencoding::encode(password),
                self.host,
                self.port,
                self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

/// Relational store connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BufferSettings {
    #[serde(default = "default_buffer_key")]
    pub key: String,

    /// Upper bound on a single tracking append, in milliseconds
    #[serde(default = "default_track_timeout")]
    pub track_timeout_ms: u64,

    /// Key receiving the raw records of batches dropped after exhausted retries.
    /// Unset means dropped batches are discarded.
    pub dead_letter_key: Option<String>,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            key: default_buffer_key(),
            track_timeout_ms: default_track_timeout(),
            dead_letter_key: None,
        }
    }
}

impl BufferSettings {
    pub fn track_timeout(&self) -> Duration {
        Duration::from_millis(self.track_timeout_ms)
    }
}

/// Sink write retry policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrySettings {
    /// Total write attempts per batch, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl RetrySettings {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

/// Task queue worker pool
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerSettings {
    #[serde(default = "default_queue")]
    pub queue: String,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Seconds a worker blocks waiting for a job before re-checking shutdown
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            queue: default_queue(),
            concurrency: default_concurrency(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionSettings {
    #[serde(default = "default_days_to_keep")]
    pub days_to_keep: u32,

    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            days_to_keep: default_days_to_keep(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,

    #[serde(default = "default_true")]
    pub redaction_enabled: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            redaction_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetricsSettings {
    /// Prometheus scrape listener, disabled when unset
    pub listen: Option<SocketAddr>,
}

fn default_batch_size() -> usize {
    100
}

fn default_flush_interval() -> u64 {
    60
}

fn default_redis_host() -> String {
    "localhost".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_database_url() -> String {
    "postgres://localhost/promptmarket".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_buffer_key() -> String {
    DEFAULT_BUFFER_KEY.to_string()
}

fn default_track_timeout() -> u64 {
    250
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    2_000
}

fn default_max_backoff() -> u64 {
    30_000
}

fn default_queue() -> String {
    DEFAULT_ANALYTICS_QUEUE.to_string()
}

fn default_concurrency() -> usize {
    4
}

fn default_poll_timeout() -> u64 {
    1
}

fn default_days_to_keep() -> u32 {
    90
}

fn default_cleanup_interval() -> u64 {
    86_400
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
