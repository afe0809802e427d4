//! # Linkdeck Storage
//!
//! Local persistence for state that is a cache of, or a companion to, the
//! ledger: the link library, the per-profile order overlay and the move
//! saga journal.
//!
//! ## Features
//!
//! - **KeyValueStore trait**: string values under string keys, plus change
//!   notifications so several instances sharing one store converge
//! - **InMemoryKvStore**: in-memory implementation for testing
//! - **FileKvStore**: one file per key in a data directory, atomic writes
//! - **IdAllocator**: persisted monotonically increasing id counter
//! - **load_json / save_json**: JSON helpers that treat corrupt data as absent
//!
//! ## Example
//!
//! ```rust,ignore
//! use linkdeck_storage::{InMemoryKvStore, KeyValueStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = InMemoryKvStore::new();
//!     let mut changes = store.subscribe();
//!
//!     store.set("linkdeck.order", "{}".to_string()).await.unwrap();
//!     let change = changes.recv().await.unwrap();
//!     assert_eq!(change.key, "linkdeck.order");
//! }
//! ```

pub mod error;
pub mod file;
pub mod ids;
pub mod json;
pub mod memory;

// Re-exports
pub use error::StorageError;
pub use file::FileKvStore;
pub use ids::IdAllocator;
pub use json::{load_json, save_json};
pub use memory::InMemoryKvStore;

use async_trait::async_trait;
use tokio::sync::broadcast;

/// Notification that a key was written or removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    /// The key that changed
    pub key: String,
    /// The new value, or `None` if the key was removed
    pub value: Option<String>,
}

/// String key/value persistence with change notifications
///
/// Writes are last-writer-wins; there is no locking across instances.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value
    ///
    /// Subscribers are notified after the write is durable.
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Remove `key`; removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Subscribe to changes made through this store
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that the KeyValueStore trait is object-safe
    fn _assert_object_safe(_: &dyn KeyValueStore) {}

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryKvStore::new();

        assert!(store.get("missing").await.unwrap().is_none());

        store.set("k", "v1".into()).await.unwrap();
        store.set("k", "v2".into()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));

        store.remove("k").await.unwrap();
        store.remove("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }
}
