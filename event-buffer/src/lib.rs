//! Atomic buffer store for batched analytics events
//!
//! Producers append serialized events to a single well-known list key; flush
//! workers take the whole list with one atomic read-all-and-clear. All safety
//! comes from the store's own primitives, never from an application lock.
//!
//! Two backends are provided:
//!
//! - [`RedisBufferStore`]: shared across processes and machines
//! - [`InMemoryBufferStore`]: single process, for tests and embedded use
//!
//! # Example
//!
//! ```no_run
//! use event_buffer::{BufferStore, RedisBufferStore};
//!
//! # async fn run() -> event_buffer::Result<()> {
//! let store = RedisBufferStore::connect("redis://localhost:6379/0").await?;
//! store.append("analytics:events:batch", r#"{"event_type":"prompt_viewed"}"#.into()).await?;
//! let batch = store.drain("analytics:events:batch").await?;
//! println!("claimed {} records", batch.len());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use error::*;
pub use memory::InMemoryBufferStore;
pub use redis_store::RedisBufferStore;
pub use store::BufferStore;
