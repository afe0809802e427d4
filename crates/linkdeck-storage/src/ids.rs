//! Persisted id counter
//!
//! Ids stay unique across restarts even when the highest-numbered entries
//! have been deleted: the counter is stored on its own and, on startup,
//! also lifted above every id still in use.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::KeyValueStore;
use crate::error::StorageError;

/// Monotonically increasing id source backed by a [`KeyValueStore`]
pub struct IdAllocator {
    store: Arc<dyn KeyValueStore>,
    key: String,
    next: Mutex<u64>,
}

impl std::fmt::Debug for IdAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdAllocator").field("key", &self.key).finish()
    }
}

impl IdAllocator {
    /// Load the counter stored under `key`, seeded from ids already in use
    ///
    /// The next id is `max(stored counter, max(existing) + 1, 1)`.
    pub async fn load(
        store: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        existing: impl IntoIterator<Item = u64>,
    ) -> Self {
        let key = key.into();
        let stored = match store.get(&key).await {
            Ok(Some(raw)) => raw.trim().parse::<u64>().unwrap_or_else(|e| {
                warn!(key, error = %e, "Ignoring corrupt id counter");
                0
            }),
            Ok(None) => 0,
            Err(e) => {
                warn!(key, error = %e, "Failed to read id counter");
                0
            }
        };
        let seeded = existing
            .into_iter()
            .filter(|&id| {
                let usable = id < u64::MAX;
                if !usable {
                    warn!(key, id, "Ignoring out-of-range id");
                }
                usable
            })
            .max()
            .map_or(1, |max| max + 1);
        let next = stored.max(seeded).max(1);
        debug!(key, next, "Loaded id allocator");

        Self {
            store,
            key,
            next: Mutex::new(next),
        }
    }

    /// Hand out the next id and persist the advanced counter
    pub async fn allocate(&self) -> Result<u64, StorageError> {
        let mut next = self.next.lock().await;
        let id = *next;
        let following = id
            .checked_add(1)
            .ok_or_else(|| StorageError::serialization(format!("id counter {} exhausted", self.key)))?;
        self.store.set(&self.key, following.to_string()).await?;
        *next = following;
        Ok(id)
    }

    /// The id the next call to [`allocate`](Self::allocate) will return
    pub async fn peek(&self) -> u64 {
        *self.next.lock().await
    }

    /// Raise the counter so it stays above `id`
    pub async fn observe(&self, id: u64) {
        let Some(following) = id.checked_add(1) else {
            warn!(key = %self.key, id, "Ignoring out-of-range id");
            return;
        };
        let mut next = self.next.lock().await;
        if following > *next {
            *next = following;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryKvStore;

    #[tokio::test]
    async fn test_seeded_from_existing_ids() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryKvStore::new());
        let ids = IdAllocator::load(store, "next", [3, 9, 4]).await;
        assert_eq!(ids.allocate().await.unwrap(), 10);
        assert_eq!(ids.allocate().await.unwrap(), 11);
    }

    #[tokio::test]
    async fn test_counter_survives_deleted_entries() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryKvStore::new());
        {
            let ids = IdAllocator::load(store.clone(), "next", std::iter::empty()).await;
            for _ in 0..5 {
                ids.allocate().await.unwrap();
            }
        }
        // All entries deleted, counter still remembers
        let ids = IdAllocator::load(store, "next", std::iter::empty()).await;
        assert_eq!(ids.allocate().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_max_value_id_is_ignored() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryKvStore::new());
        let ids = IdAllocator::load(store, "next", [u64::MAX, 4]).await;
        assert_eq!(ids.peek().await, 5);

        ids.observe(u64::MAX).await;
        assert_eq!(ids.peek().await, 5);
        ids.observe(7).await;
        assert_eq!(ids.allocate().await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_exhausted_counter_is_an_error() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryKvStore::new());
        store.set("next", u64::MAX.to_string()).await.unwrap();
        let ids = IdAllocator::load(store, "next", std::iter::empty()).await;
        assert!(matches!(
            ids.allocate().await,
            Err(StorageError::Serialization(_))
        ));
        assert_eq!(ids.peek().await, u64::MAX);
    }

    #[tokio::test]
    async fn test_corrupt_counter_falls_back_to_existing() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryKvStore::new());
        store.set("next", "banana".into()).await.unwrap();
        let ids = IdAllocator::load(store, "next", [2]).await;
        assert_eq!(ids.peek().await, 3);
    }
}
