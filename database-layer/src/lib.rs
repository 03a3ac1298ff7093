//! Relational persistence for analytics events
//!
//! Wraps a shared Postgres pool and the `analytics_events` table: all-or-nothing
//! bulk inserts for flushed batches and the retention delete.
//!
//! # Example
//!
//! ```no_run
//! use database_layer::{AnalyticsEventRepository, DatabasePool, PoolOptions};
//!
//! # async fn run() -> database_layer::DatabaseResult<()> {
//! let pool = DatabasePool::connect("postgresql://localhost/promptmarket", &PoolOptions::default()).await?;
//! let repository = AnalyticsEventRepository::new(pool);
//! let cutoff = chrono::Utc::now() - chrono::Duration::days(90);
//! repository.delete_older_than(cutoff).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod models;
pub mod repository;

pub use connection::*;
pub use error::*;
pub use models::*;
pub use repository::*;
