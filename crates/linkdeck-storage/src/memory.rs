//! In-memory storage implementation
//!
//! Suitable for tests and for sharing one store between several
//! library/overlay instances in the same process.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::trace;

use crate::error::StorageError;
use crate::{KeyValueStore, StorageChange};

/// In-memory implementation of KeyValueStore
#[derive(Debug)]
pub struct InMemoryKvStore {
    entries: DashMap<String, String>,
    changes: broadcast::Sender<StorageChange>,
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            entries: DashMap::new(),
            changes,
        }
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).map(|v| v.clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        trace!(key, bytes = value.len(), "Storing value");
        self.entries.insert(key.to_string(), value.clone());
        let _ = self.changes.send(StorageChange {
            key: key.to_string(),
            value: Some(value),
        });
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        if self.entries.remove(key).is_some() {
            let _ = self.changes.send(StorageChange {
                key: key.to_string(),
                value: None,
            });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_change_notifications() {
        let store = InMemoryKvStore::new();
        let mut rx = store.subscribe();

        store.set("a", "1".into()).await.unwrap();
        store.remove("a").await.unwrap();
        // Removing a missing key is silent
        store.remove("a").await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            StorageChange {
                key: "a".into(),
                value: Some("1".into())
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            StorageChange {
                key: "a".into(),
                value: None
            }
        );
        assert!(rx.try_recv().is_err());
    }
}
