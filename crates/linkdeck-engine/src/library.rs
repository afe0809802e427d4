//! Link library
//!
//! A flat, profile-independent collection of reusable links, used as a drag
//! source. Entries only get in after the URL has been probed as reachable,
//! and they leave only through [`LinkLibrary::remove`].
//!
//! The whole collection is stored as one JSON array; ids come from an
//! injected [`IdAllocator`] so they stay unique across restarts.

use std::sync::Arc;

use linkdeck_core::{LinkProbe, Notifier, ValidationError, validate_library_label};
use linkdeck_storage::json::decode_json;
use linkdeck_storage::{IdAllocator, KeyValueStore, StorageChange, StorageError, save_json};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Storage key of the library array
pub const LIBRARY_KEY: &str = "linkdeck.library";

/// Storage key of the library id counter
pub const LIBRARY_NEXT_ID_KEY: &str = "linkdeck.library.next_id";

/// One reusable link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryItem {
    /// Decimal rendering of the allocated counter value
    pub id: String,
    pub label: String,
    /// Normalized URL
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

impl LibraryItem {
    /// Case-insensitive label plus URL
    fn dedup_key(&self) -> (String, &str) {
        (self.label.to_lowercase(), self.url.as_str())
    }

    fn numeric_id(&self) -> Option<u64> {
        self.id.parse().ok()
    }
}

/// Why an item was not added
#[derive(Debug, Error)]
pub enum LibraryRejection {
    #[error("{0}")]
    Invalid(#[from] ValidationError),

    #[error("Link is not reachable: {url}")]
    Unreachable { url: String, reason: Option<String> },

    #[error("Link already in library: {label}")]
    Duplicate { label: String, url: String },

    #[error("Failed to save library: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Default)]
struct LibraryState {
    items: Vec<LibraryItem>,
    /// Last value this instance wrote, to tell our own writes from others'
    last_written: Option<String>,
}

/// Locally persisted link collection
pub struct LinkLibrary {
    store: Arc<dyn KeyValueStore>,
    ids: Arc<IdAllocator>,
    probe: Arc<dyn LinkProbe>,
    notifier: Notifier,
    state: RwLock<LibraryState>,
}

impl std::fmt::Debug for LinkLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkLibrary").field("ids", &self.ids).finish()
    }
}

impl LinkLibrary {
    /// Load the library with an injected id allocator
    pub async fn load(
        store: Arc<dyn KeyValueStore>,
        ids: Arc<IdAllocator>,
        probe: Arc<dyn LinkProbe>,
        notifier: Notifier,
    ) -> Self {
        let (items, raw) = read_items(store.as_ref()).await;
        for id in items.iter().filter_map(LibraryItem::numeric_id) {
            ids.observe(id).await;
        }
        debug!(count = items.len(), "Loaded link library");

        Self {
            store,
            ids,
            probe,
            notifier,
            state: RwLock::new(LibraryState {
                items,
                last_written: raw,
            }),
        }
    }

    /// Load the library, seeding a fresh allocator from the stored items
    pub async fn open(
        store: Arc<dyn KeyValueStore>,
        probe: Arc<dyn LinkProbe>,
        notifier: Notifier,
    ) -> Self {
        let ids = Self::allocator(store.clone()).await;
        Self::load(store, Arc::new(ids), probe, notifier).await
    }

    /// Id allocator for the library, seeded from `max(existing ids) + 1`
    pub async fn allocator(store: Arc<dyn KeyValueStore>) -> IdAllocator {
        let (items, _) = read_items(store.as_ref()).await;
        let existing: Vec<u64> = items.iter().filter_map(LibraryItem::numeric_id).collect();
        IdAllocator::load(store, LIBRARY_NEXT_ID_KEY, existing).await
    }

    /// Validate, probe and insert a new item
    ///
    /// Every rejection also emits a warning toast; nothing is changed.
    pub async fn add(
        &self,
        label: &str,
        url: &str,
        favicon: Option<String>,
    ) -> Result<LibraryItem, LibraryRejection> {
        let result = self.try_add(label, url, favicon).await;
        match &result {
            Ok(item) => self
                .notifier
                .success(format!("Added \"{}\" to the library", item.label)),
            Err(LibraryRejection::Storage(e)) => {
                self.notifier.error(format!("Could not save the library: {e}"))
            }
            Err(rejection) => self.notifier.warn(rejection.to_string()),
        }
        result
    }

    async fn try_add(
        &self,
        label: &str,
        url: &str,
        favicon: Option<String>,
    ) -> Result<LibraryItem, LibraryRejection> {
        validate_library_label(label)?;
        let label = label.trim().to_string();

        let report = self.probe.probe(url).await;
        if !report.reachable {
            warn!(url, error = ?report.error, "Rejecting unreachable link");
            return Err(LibraryRejection::Unreachable {
                url: report.normalized_url,
                reason: report.error,
            });
        }

        let mut item = LibraryItem {
            id: String::new(),
            label,
            url: report.normalized_url,
            favicon: favicon.or(report.favicon),
        };

        let mut state = self.state.write().await;
        if state
            .items
            .iter()
            .any(|existing| existing.dedup_key() == item.dedup_key())
        {
            return Err(LibraryRejection::Duplicate {
                label: item.label,
                url: item.url,
            });
        }

        item.id = self.ids.allocate().await?.to_string();
        let mut items = state.items.clone();
        items.push(item.clone());
        let raw = save_json(self.store.as_ref(), LIBRARY_KEY, &items).await?;
        state.items = items;
        state.last_written = Some(raw);

        info!(id = %item.id, label = %item.label, url = %item.url, "Library item added");
        Ok(item)
    }

    /// Remove an item by id
    ///
    /// Returns `None` for unknown ids and when the write fails.
    pub async fn remove(&self, id: &str) -> Option<LibraryItem> {
        let mut state = self.state.write().await;
        let index = state.items.iter().position(|item| item.id == id)?;

        let mut items = state.items.clone();
        let removed = items.remove(index);
        match save_json(self.store.as_ref(), LIBRARY_KEY, &items).await {
            Ok(raw) => {
                state.items = items;
                state.last_written = Some(raw);
                info!(id, label = %removed.label, "Library item removed");
                Some(removed)
            }
            Err(e) => {
                warn!(id, error = %e, "Failed to persist library removal");
                self.notifier.error(format!("Could not save the library: {e}"));
                None
            }
        }
    }

    pub async fn get(&self, id: &str) -> Option<LibraryItem> {
        self.state
            .read()
            .await
            .items
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    /// All items in insertion order
    pub async fn items(&self) -> Vec<LibraryItem> {
        self.state.read().await.items.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Write the current collection back to storage
    pub async fn persist(&self) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let raw = save_json(self.store.as_ref(), LIBRARY_KEY, &state.items).await?;
        state.last_written = Some(raw);
        Ok(())
    }

    /// Re-read the collection from storage
    ///
    /// Returns `false` if the stored value is the one this instance last
    /// wrote.
    pub async fn reload(&self) -> bool {
        let (items, raw) = read_items(self.store.as_ref()).await;
        let mut state = self.state.write().await;
        if raw.is_some() && raw == state.last_written {
            return false;
        }
        for id in items.iter().filter_map(LibraryItem::numeric_id) {
            self.ids.observe(id).await;
        }
        debug!(count = items.len(), "Library reloaded from storage");
        state.items = items;
        state.last_written = raw;
        true
    }

    /// React to a storage notification; other keys are ignored
    pub async fn on_storage_change(&self, change: &StorageChange) -> bool {
        if change.key != LIBRARY_KEY {
            return false;
        }
        self.reload().await
    }

    /// Follow storage notifications until the store goes away
    pub fn spawn_sync(self: Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.store.subscribe();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        self.on_storage_change(&change).await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Library sync lagged, reloading");
                        self.reload().await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Stored items plus the raw value they were decoded from
async fn read_items(store: &dyn KeyValueStore) -> (Vec<LibraryItem>, Option<String>) {
    let raw = match store.get(LIBRARY_KEY).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Failed to read link library, starting empty");
            return (Vec::new(), None);
        }
    };
    let items = raw
        .as_deref()
        .and_then(|raw| decode_json(LIBRARY_KEY, raw))
        .unwrap_or_default();
    (items, raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use linkdeck_core::ProbeReport;
    use linkdeck_linkcheck::normalize_url;
    use linkdeck_storage::InMemoryKvStore;

    /// Everything except hosts containing "down" is reachable
    struct FakeProbe;

    #[async_trait]
    impl LinkProbe for FakeProbe {
        async fn probe(&self, url: &str) -> ProbeReport {
            let normalized_url = normalize_url(url);
            let reachable = !normalized_url.contains("down");
            ProbeReport {
                reachable,
                favicon: reachable.then(|| format!("{normalized_url}/favicon.ico")),
                error: (!reachable).then(|| "status 503".to_string()),
                normalized_url,
                title: None,
            }
        }
    }

    async fn library(store: Arc<dyn KeyValueStore>) -> LinkLibrary {
        LinkLibrary::open(store, Arc::new(FakeProbe), Notifier::new()).await
    }

    #[tokio::test]
    async fn test_add_normalizes_and_assigns_ids() {
        let library = library(Arc::new(InMemoryKvStore::new())).await;

        let first = library.add("Example", "example.com", None).await.unwrap();
        assert_eq!(first.id, "1");
        assert_eq!(first.url, "https://example.com");
        assert_eq!(first.favicon.as_deref(), Some("https://example.com/favicon.ico"));

        let second = library
            .add("Docs", "https://docs.rs", Some("https://docs.rs/icon.svg".into()))
            .await
            .unwrap();
        assert_eq!(second.id, "2");
        assert_eq!(second.favicon.as_deref(), Some("https://docs.rs/icon.svg"));
    }

    #[tokio::test]
    async fn test_rejections_leave_library_unchanged() {
        let library = library(Arc::new(InMemoryKvStore::new())).await;
        let mut toasts = library.notifier.subscribe();

        assert!(matches!(
            library.add("X", "https://x.com", None).await,
            Err(LibraryRejection::Invalid(ValidationError::LabelTooShort { .. }))
        ));
        assert!(matches!(
            library.add("Status", "https://down.example", None).await,
            Err(LibraryRejection::Unreachable { .. })
        ));
        assert!(library.is_empty().await);

        let toast = toasts.recv().await.unwrap();
        assert_eq!(toast.level, linkdeck_core::ToastLevel::Warn);
    }

    #[tokio::test]
    async fn test_duplicate_is_case_insensitive_on_label() {
        let library = library(Arc::new(InMemoryKvStore::new())).await;
        library.add("Blog", "https://blog.example", None).await.unwrap();

        let again = library.add("BLOG", "blog.example", None).await;
        assert!(matches!(again, Err(LibraryRejection::Duplicate { .. })));
        assert_eq!(library.len().await, 1);

        // Same label, different URL is a different entry
        library.add("Blog", "https://other.example", None).await.unwrap();
        assert_eq!(library.len().await, 2);
    }

    #[tokio::test]
    async fn test_ids_survive_removal_and_restart() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryKvStore::new());
        {
            let library = library(store.clone()).await;
            library.add("One", "https://one.example", None).await.unwrap();
            let two = library.add("Two", "https://two.example", None).await.unwrap();
            assert_eq!(library.remove(&two.id).await, Some(two));
        }

        let library = library(store).await;
        assert_eq!(library.len().await, 1);
        let three = library.add("Three", "https://three.example", None).await.unwrap();
        assert_eq!(three.id, "3");
    }

    #[tokio::test]
    async fn test_out_of_range_stored_id_does_not_break_loading() {
        let store = Arc::new(InMemoryKvStore::new());
        store
            .set(
                LIBRARY_KEY,
                r#"[{"id":"18446744073709551615","label":"Big","url":"https://big.example","favicon":null},
                    {"id":"2","label":"Two","url":"https://two.example","favicon":null}]"#
                    .into(),
            )
            .await
            .unwrap();

        let library = library(store).await;
        assert_eq!(library.len().await, 2);
        let next = library.add("Next", "https://next.example", None).await.unwrap();
        assert_eq!(next.id, "3");
    }

    #[tokio::test]
    async fn test_corrupt_storage_yields_empty_library() {
        let store = Arc::new(InMemoryKvStore::new());
        store.set(LIBRARY_KEY, "[{\"id\": 1,".into()).await.unwrap();
        let library = library(store).await;
        assert!(library.is_empty().await);
    }

    #[tokio::test]
    async fn test_reload_ignores_own_writes() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryKvStore::new());
        let library = library(store).await;
        library.add("Home", "https://home.example", None).await.unwrap();
        assert!(!library.reload().await);
    }
}
