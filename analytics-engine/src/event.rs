// Tracked events and their buffered wire form
use chrono::{DateTime, Utc};
use database_layer::EventRow;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Well-known event names emitted by the marketplace.
///
/// [`Event::event_type`] stays a free string; this enum only spares call
/// sites from spelling the common ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    UserRegistered,
    UserLogin,
    UserUpgraded,
    UserLogout,
    PromptViewed,
    PromptClicked,
    PromptPurchased,
    PromptUsed,
    PromptRated,
    PromptCreated,
    PromptUpdated,
    PromptDeleted,
    SearchPerformed,
    SearchResultClicked,
    CategoryBrowsed,
    PaymentInitiated,
    PaymentCompleted,
    PaymentFailed,
    PaymentRefunded,
}

impl EventType {
    pub const ALL: [EventType; 19] = [
        EventType::UserRegistered,
        EventType::UserLogin,
        EventType::UserUpgraded,
        EventType::UserLogout,
        EventType::PromptViewed,
        EventType::PromptClicked,
        EventType::PromptPurchased,
        EventType::PromptUsed,
        EventType::PromptRated,
        EventType::PromptCreated,
        EventType::PromptUpdated,
        EventType::PromptDeleted,
        EventType::SearchPerformed,
        EventType::SearchResultClicked,
        EventType::CategoryBrowsed,
        EventType::PaymentInitiated,
        EventType::PaymentCompleted,
        EventType::PaymentFailed,
        EventType::PaymentRefunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::UserRegistered => "user_registered",
            EventType::UserLogin => "user_login",
            EventType::UserUpgraded => "user_upgraded",
            EventType::UserLogout => "user_logout",
            EventType::PromptViewed => "prompt_viewed",
            EventType::PromptClicked => "prompt_clicked",
            EventType::PromptPurchased => "prompt_purchased",
            EventType::PromptUsed => "prompt_used",
            EventType::PromptRated => "prompt_rated",
            EventType::PromptCreated => "prompt_created",
            EventType::PromptUpdated => "prompt_updated",
            EventType::PromptDeleted => "prompt_deleted",
            EventType::SearchPerformed => "search_performed",
            EventType::SearchResultClicked => "search_result_clicked",
            EventType::CategoryBrowsed => "category_browsed",
            EventType::PaymentInitiated => "payment_initiated",
            EventType::PaymentCompleted => "payment_completed",
            EventType::PaymentFailed => "payment_failed",
            EventType::PaymentRefunded => "payment_refunded",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown event type: {}", s))
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        event_type.as_str().to_string()
    }
}

/// Request-scoped fields captured by the HTTP layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub session_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

/// One tracked occurrence. `created_at` is fixed when the event is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub user_id: Option<Uuid>,
    pub session_id: Option<String>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub metadata: Map<String, Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            user_id: None,
            session_id: None,
            event_type: event_type.into(),
            entity_type: entity_type.into(),
            entity_id: None,
            metadata: Map::new(),
            ip_address: None,
            user_agent: None,
            referrer: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Fill the request fields; fields already set on the event are kept.
    pub fn with_context(mut self, context: &RequestContext) -> Self {
        self.session_id = self.session_id.or_else(|| context.session_id.clone());
        self.ip_address = self.ip_address.or_else(|| context.ip_address.clone());
        self.user_agent = self.user_agent.or_else(|| context.user_agent.clone());
        self.referrer = self.referrer.or_else(|| context.referrer.clone());
        self
    }

    /// Serialize into the record appended to the buffer.
    ///
    /// # Errors
    ///
    /// Fails only if the metadata holds a value JSON cannot represent.
    pub fn to_record(&self) -> serde_json::Result<String> {
        let record = BufferedRecord {
            user_id: self.user_id,
            session_id: self.session_id.clone(),
            event_type: self.event_type.clone(),
            entity_type: self.entity_type.clone(),
            entity_id: self.entity_id.clone(),
            metadata: Some(serde_json::to_string(&self.metadata)?),
            ip_address: self.ip_address.clone(),
            user_agent: self.user_agent.clone(),
            referrer: self.referrer.clone(),
            created_at: self.created_at,
        };
        serde_json::to_string(&record)
    }
}

/// Buffered wire form: every event field, with `metadata` carried as a JSON
/// string and `created_at` as RFC 3339.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BufferedRecord {
    #[serde(default)]
    user_id: Option<Uuid>,
    #[serde(default)]
    session_id: Option<String>,
    event_type: String,
    entity_type: String,
    #[serde(default)]
    entity_id: Option<String>,
    #[serde(default)]
    metadata: Option<String>,
    #[serde(default)]
    ip_address: Option<String>,
    #[serde(default)]
    user_agent: Option<String>,
    #[serde(default)]
    referrer: Option<String>,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
}

/// A buffered record turned back into a row.
#[derive(Debug, Clone)]
pub struct DecodedRecord {
    pub row: EventRow,
    /// The metadata string did not parse as a JSON object and was replaced
    /// with an empty map.
    pub metadata_defaulted: bool,
}

/// Decode one buffered record into a row with a fresh id.
///
/// Unparseable metadata is not an error: the row gets an empty map. A record
/// without `created_at` is stamped with the decode time.
///
/// # Errors
///
/// Fails when the record itself is not JSON or lacks `event_type` or
/// `entity_type`.
pub fn decode_record(raw: &str) -> serde_json::Result<DecodedRecord> {
    let record: BufferedRecord = serde_json::from_str(raw)?;

    let (metadata, metadata_defaulted) = match record.metadata.as_deref() {
        None => (Map::new(), false),
        Some(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => (map, false),
            _ => (Map::new(), true),
        },
    };

    Ok(DecodedRecord {
        row: EventRow {
            id: Uuid::new_v4(),
            user_id: record.user_id,
            session_id: record.session_id,
            event_type: record.event_type,
            entity_type: record.entity_type,
            entity_id: record.entity_id,
            metadata,
            ip_address: record.ip_address,
            user_agent: record.user_agent,
            referrer: record.referrer,
            created_at: record.created_at,
        },
        metadata_defaulted,
    })
}
