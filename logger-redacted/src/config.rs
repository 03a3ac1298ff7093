// Logger configuration
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub log_level: String,
    /// JSON lines for log shippers; human-readable otherwise
    pub json: bool,
    pub redaction_enabled: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
            redaction_enabled: true,
        }
    }
}

impl LoggerConfig {
    pub fn new(log_level: impl Into<String>) -> Self {
        Self {
            log_level: log_level.into(),
            ..Self::default()
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn with_redaction(mut self, enabled: bool) -> Self {
        self.redaction_enabled = enabled;
        self
    }
}
