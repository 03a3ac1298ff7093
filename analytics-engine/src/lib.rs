//! Event batching and flush pipeline for PromptMarket analytics
//!
//! Request handlers call [`AnalyticsService::track_event`], which appends the
//! event to a shared buffer and returns. Batches reach Postgres through the
//! `analytics.flush` task, enqueued either when the buffer reaches
//! `batch_size` or by the periodic scheduler; the [`FlushWorker`] drains the
//! buffer atomically and writes the batch with bounded retries.
//!
//! Delivery is best effort: a batch whose write fails on every attempt is
//! logged and dropped, never requeued.
//!
//! # Example
//!
//! ```no_run
//! use analytics_engine::{Backends, EventType, RequestContext};
//! use config_engine::AnalyticsSettings;
//!
//! # async fn run() -> analytics_engine::Result<()> {
//! let settings = AnalyticsSettings::load(None)?;
//! let backends = Backends::connect(&settings).await?;
//! let flusher = backends.flusher(&settings, Default::default());
//! let analytics = backends.service(&settings, flusher);
//!
//! analytics
//!     .track(EventType::PromptViewed, "prompt")
//!     .entity_id("42")
//!     .context(&RequestContext::default())
//!     .send()
//!     .await;
//!
//! analytics.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod event;
pub mod flush;
pub mod service;
pub mod sink;
pub mod tasks;
pub mod tracker;

pub use database_layer::EventRow;
pub use error::*;
pub use event::{decode_record, DecodedRecord, Event, EventType, RequestContext};
pub use flush::{FlushReport, FlushStatus, FlushWorker, RetryPolicy};
pub use service::{flusher, AnalyticsService, Backends};
pub use sink::{EventRetention, MemorySink, PersistenceSink, PostgresSink};
pub use tracker::{EventTracker, PendingEvent, TrackerConfig};
