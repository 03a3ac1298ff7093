//! Property tests for buffer accounting

use analytics_engine::{AnalyticsService, Event, FlushWorker, MemorySink, TrackerConfig};
use event_buffer::InMemoryBufferStore;
use proptest::prelude::*;
use std::sync::Arc;
use task_queue::InMemoryTaskQueue;

const KEY: &str = "analytics:events:batch";

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn service(batch_size: usize) -> (AnalyticsService, Arc<MemorySink>) {
    let buffer = Arc::new(InMemoryBufferStore::new());
    let sink = Arc::new(MemorySink::new());
    let flusher = Arc::new(FlushWorker::new(buffer.clone(), sink.clone(), KEY));
    let service = AnalyticsService::new(
        buffer,
        InMemoryTaskQueue::new(),
        flusher,
        TrackerConfig {
            batch_size,
            ..TrackerConfig::default()
        },
    );
    (service, sink)
}

proptest! {
    #[test]
    fn queue_size_counts_every_unflushed_event(count in 0usize..300) {
        let rt = runtime();
        // Threshold jobs only queue up; nothing consumes them here.
        let (service, sink) = service(100);

        let size = rt.block_on(async {
            for i in 0..count {
                service.track_event(Event::new("prompt_viewed", "prompt").with_entity_id(i.to_string())).await;
            }
            service.get_queue_size().await
        });

        prop_assert_eq!(size, count);
        prop_assert_eq!(sink.attempts(), 0);
    }

    #[test]
    fn interleaved_flushes_persist_everything(chunks in prop::collection::vec(0usize..40, 1..8)) {
        let rt = runtime();
        let (service, sink) = service(1000);

        let (tracked, persisted) = rt.block_on(async {
            let mut tracked = 0;
            let mut persisted = 0;
            for chunk in &chunks {
                for _ in 0..*chunk {
                    service.track_event(Event::new("search_performed", "search")).await;
                    tracked += 1;
                }
                persisted += service.flush_events_now().await.unwrap().persisted;
                assert_eq!(service.get_queue_size().await, 0);
            }
            (tracked, persisted)
        });

        prop_assert_eq!(tracked, persisted);
        prop_assert_eq!(sink.persisted(), tracked);
        prop_assert_eq!(sink.batches().iter().sum::<usize>(), tracked);
    }
}
