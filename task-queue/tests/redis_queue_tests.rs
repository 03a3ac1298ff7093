//! Redis broker tests
//!
//! To run these tests:
//! 1. Ensure Redis is running and REDIS_URL points at a scratch database
//! 2. cargo test -p task-queue --test redis_queue_tests -- --ignored

use redis::AsyncCommands;
use serde_json::json;
use std::time::Duration;
use task_queue::redis_queue::queue_key;
use task_queue::{RedisTaskQueue, TaskConsumer, TaskEnvelope, TaskQueue};
use uuid::Uuid;

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/15".to_string())
}

async fn setup_queue() -> (RedisTaskQueue, String) {
    let broker = RedisTaskQueue::connect(&redis_url())
        .await
        .expect("Failed to connect to test Redis");
    (broker, format!("test-analytics-{}", Uuid::new_v4()))
}

#[tokio::test]
#[ignore] // Requires Redis connection
async fn test_enqueue_dequeue_round_trip_in_order() {
    let (broker, queue) = setup_queue().await;
    let first = TaskEnvelope::new("analytics.flush", &queue).with_args(json!({"trigger": "threshold"}));
    let second = TaskEnvelope::new("analytics.cleanup", &queue).with_args(json!({"days_to_keep": 30}));

    broker.enqueue(first.clone()).await.unwrap();
    broker.enqueue(second.clone()).await.unwrap();
    assert_eq!(broker.pending(&queue).await.unwrap(), 2);

    let mut consumer = broker.consumer().await.unwrap();
    let popped_first = consumer.dequeue(&queue, Duration::from_secs(1)).await.unwrap();
    let popped_second = consumer.dequeue(&queue, Duration::from_secs(1)).await.unwrap();

    assert_eq!(popped_first, Some(first));
    assert_eq!(popped_second, Some(second));
    assert_eq!(broker.pending(&queue).await.unwrap(), 0);
}

#[tokio::test]
#[ignore] // Requires Redis connection
async fn test_empty_queue_times_out() {
    let (broker, queue) = setup_queue().await;
    let mut consumer = broker.consumer().await.unwrap();

    let popped = consumer.dequeue(&queue, Duration::from_millis(10)).await.unwrap();

    assert!(popped.is_none());
}

#[tokio::test]
#[ignore] // Requires Redis connection
async fn test_undecodable_envelope_is_discarded() {
    let (broker, queue) = setup_queue().await;
    let client = redis::Client::open(redis_url()).unwrap();
    let mut conn = client.get_multiplexed_tokio_connection().await.unwrap();
    conn.lpush::<_, _, ()>(queue_key(&queue), "not a task").await.unwrap();

    let task = TaskEnvelope::new("analytics.flush", &queue);
    broker.enqueue(task.clone()).await.unwrap();

    let mut consumer = broker.consumer().await.unwrap();
    assert!(consumer.dequeue(&queue, Duration::from_secs(1)).await.unwrap().is_none());
    assert_eq!(consumer.dequeue(&queue, Duration::from_secs(1)).await.unwrap(), Some(task));
    assert_eq!(broker.pending(&queue).await.unwrap(), 0);
}

#[tokio::test]
#[ignore] // Requires Redis connection
async fn test_each_task_reaches_one_consumer() {
    let (broker, queue) = setup_queue().await;
    for _ in 0..20 {
        broker.enqueue(TaskEnvelope::new("analytics.flush", &queue)).await.unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..3 {
        let mut consumer = broker.consumer().await.unwrap();
        let queue = queue.clone();
        handles.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            while let Some(task) = consumer.dequeue(&queue, Duration::from_secs(1)).await.unwrap() {
                ids.push(task.id);
            }
            ids
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.extend(handle.await.unwrap());
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 20);
}
