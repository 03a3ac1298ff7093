// Task envelope exchanged between producers and workers
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// A named job routed to a logical queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub id: Uuid,
    pub name: String,
    pub queue: String,
    #[serde(default)]
    pub args: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
}

impl TaskEnvelope {
    pub fn new(name: &str, queue: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            queue: queue.to_string(),
            args: serde_json::Value::Null,
            enqueued_at: Utc::now(),
        }
    }

    pub fn with_args(mut self, args: serde_json::Value) -> Self {
        self.args = args;
        self
    }

    /// Wire form stored on the broker list.
    ///
    /// # Errors
    ///
    /// Fails only if `args` holds a non-serializable value.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// # Errors
    ///
    /// Fails on anything that is not a task envelope.
    pub fn from_json(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_survives_the_wire() {
        let task = TaskEnvelope::new("analytics.cleanup", "analytics").with_args(json!({"days_to_keep": 30}));
        let decoded = TaskEnvelope::from_json(&task.to_json().unwrap()).unwrap();
        assert_eq!(decoded, task);
    }

    #[test]
    fn missing_args_default_to_null() {
        let payload = format!(
            r#"{{"id":"{}","name":"analytics.flush","queue":"analytics","enqueued_at":"2024-05-01T12:00:00Z"}}"#,
            Uuid::new_v4()
        );
        let task = TaskEnvelope::from_json(&payload).unwrap();
        assert_eq!(task.name, "analytics.flush");
        assert!(task.args.is_null());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(TaskEnvelope::from_json("not a task").is_err());
    }
}
