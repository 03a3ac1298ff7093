//! Background jobs for the analytics pipeline
//!
//! Producers publish [`TaskEnvelope`]s to a named logical queue; a
//! [`WorkerPool`] of independent consumers pulls them off and routes each
//! one through a [`TaskRegistry`] to its handler. A [`Scheduler`] publishes
//! periodic entries (the minute flush, the nightly retention sweep).
//!
//! # Transports
//!
//! - [`RedisTaskQueue`]: Redis lists, `LPUSH` to publish and `BRPOP` to consume
//! - [`InMemoryTaskQueue`]: the same semantics inside one process
//! - [`EagerTaskQueue`]: runs the handler inline on enqueue, for tests
//!
//! Delivery is at-most-once: a task popped by a worker that dies before
//! finishing is gone.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use task_queue::{InMemoryTaskQueue, ScheduleEntry, Scheduler, TaskConsumer, TaskRegistry, WorkerPool};
//!
//! # async fn run(registry: TaskRegistry) {
//! let broker = InMemoryTaskQueue::new();
//! let (stop, shutdown) = tokio::sync::watch::channel(false);
//!
//! let beat = Scheduler::new(broker.clone()).add(ScheduleEntry::new(
//!     "flush-analytics-events",
//!     "analytics.flush",
//!     "analytics",
//!     Duration::from_secs(60),
//! ));
//! tokio::spawn(beat.run(shutdown.clone()));
//!
//! let consumers: Vec<Box<dyn TaskConsumer>> =
//!     (0..4).map(|_| Box::new(broker.consumer()) as Box<dyn TaskConsumer>).collect();
//! WorkerPool::new("analytics", registry).run(consumers, shutdown).await;
//! # drop(stop);
//! # }
//! ```

pub mod eager;
pub mod error;
pub mod memory;
pub mod queue;
pub mod redis_queue;
pub mod registry;
pub mod scheduler;
pub mod task;
pub mod worker;

pub use eager::EagerTaskQueue;
pub use error::*;
pub use memory::{InMemoryConsumer, InMemoryTaskQueue};
pub use queue::{TaskConsumer, TaskQueue};
pub use redis_queue::{RedisTaskConsumer, RedisTaskQueue};
pub use registry::{TaskHandler, TaskRegistry};
pub use scheduler::{ScheduleEntry, Scheduler};
pub use task::TaskEnvelope;
pub use worker::{WorkerPool, WorkerStats};
