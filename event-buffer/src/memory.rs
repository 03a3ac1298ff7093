// In-process backend
use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::store::BufferStore;

/// Buffer store living in the current process.
///
/// Append and drain both take the write lock of the key's shard, which gives
/// the same atomicity as the Redis backend for callers inside one process.
#[derive(Debug, Default)]
pub struct InMemoryBufferStore {
    lists: DashMap<String, Vec<String>>,
}

impl InMemoryBufferStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BufferStore for InMemoryBufferStore {
    async fn append(&self, key: &str, record: String) -> Result<usize> {
        let mut list = self.lists.entry(key.to_string()).or_default();
        list.push(record);
        Ok(list.len())
    }

    async fn append_many(&self, key: &str, records: Vec<String>) -> Result<usize> {
        let mut list = self.lists.entry(key.to_string()).or_default();
        list.extend(records);
        Ok(list.len())
    }

    async fn drain(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.lists.remove(key).map(|(_, records)| records).unwrap_or_default())
    }

    async fn length(&self, key: &str) -> Result<usize> {
        Ok(self.lists.get(key).map_or(0, |list| list.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    const KEY: &str = "analytics:events:batch";

    #[tokio::test]
    async fn append_reports_new_length() {
        let store = InMemoryBufferStore::new();
        assert_eq!(store.append(KEY, "a".into()).await.unwrap(), 1);
        assert_eq!(store.append(KEY, "b".into()).await.unwrap(), 2);
        assert_eq!(store.length(KEY).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn drain_returns_in_order_and_clears() {
        let store = InMemoryBufferStore::new();
        for record in ["a", "b", "c"] {
            store.append(KEY, record.into()).await.unwrap();
        }

        assert_eq!(store.drain(KEY).await.unwrap(), vec!["a", "b", "c"]);
        assert_eq!(store.length(KEY).await.unwrap(), 0);
        assert!(store.drain(KEY).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let store = InMemoryBufferStore::new();
        store.append(KEY, "a".into()).await.unwrap();
        store.append_many("dead-letter", vec!["x".into(), "y".into()]).await.unwrap();

        assert_eq!(store.drain(KEY).await.unwrap(), vec!["a"]);
        assert_eq!(store.length("dead-letter").await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_drains_partition_the_buffer() {
        let store = Arc::new(InMemoryBufferStore::new());
        let total = 2_000;

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    for i in 0..total / 4 {
                        store.append(KEY, format!("{}-{}", p, i)).await.unwrap();
                        if i % 50 == 0 {
                            tokio::task::yield_now().await;
                        }
                    }
                })
            })
            .collect();

        let drainers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let mut seen = Vec::new();
                    for _ in 0..100 {
                        seen.extend(store.drain(KEY).await.unwrap());
                        tokio::task::yield_now().await;
                    }
                    seen
                })
            })
            .collect();

        futures::future::join_all(producers).await;
        let mut all = Vec::new();
        for drained in futures::future::join_all(drainers).await {
            all.extend(drained.unwrap());
        }
        all.extend(store.drain(KEY).await.unwrap());

        let unique: HashSet<_> = all.iter().cloned().collect();
        assert_eq!(all.len(), total, "every record drained exactly once");
        assert_eq!(unique.len(), total, "no record drained twice");
    }
}
