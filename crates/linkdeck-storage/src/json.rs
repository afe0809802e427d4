//! JSON helpers over a [`KeyValueStore`]
//!
//! Persisted local state is a cache: a missing, unreadable or corrupt value
//! is treated as absent rather than as an error.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::KeyValueStore;
use crate::error::StorageError;

/// Load and decode the value under `key`
///
/// Returns `None` if the key is missing, the read fails or the value does
/// not decode; the latter two are logged.
pub async fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(key, error = %e, "Failed to read stored value, treating as absent");
            return None;
        }
    };
    decode_json(key, &raw)
}

/// Decode a raw stored value, logging and discarding corrupt data
pub fn decode_json<T: DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "Discarding corrupt stored value");
            None
        }
    }
}

/// Encode `value` and store it under `key`, returning the stored string
pub async fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<String, StorageError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, raw.clone()).await?;
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryKvStore;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_corrupt_value_is_absent() {
        let store = InMemoryKvStore::new();
        store.set("k", "{not json".into()).await.unwrap();
        let loaded: Option<HashMap<String, Vec<String>>> = load_json(&store, "k").await;
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = InMemoryKvStore::new();
        let mut value = HashMap::new();
        value.insert("p1".to_string(), vec!["A".to_string(), "B".to_string()]);
        save_json(&store, "k", &value).await.unwrap();
        let loaded: HashMap<String, Vec<String>> = load_json(&store, "k").await.unwrap();
        assert_eq!(loaded, value);
    }
}
