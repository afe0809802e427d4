//! Per-profile display order
//!
//! The ledger decides which labels a profile has; the overlay only decides
//! the order they are shown in. Reads always merge the two, so the result
//! is a permutation of the on-chain label set no matter how stale the
//! overlay is. Losing the overlay just falls back to ledger order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use linkdeck_core::{LinkMap, Profile, ProfileId};
use linkdeck_storage::json::decode_json;
use linkdeck_storage::{KeyValueStore, StorageChange, StorageError, save_json};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Storage key of the overlay mapping
pub const ORDER_KEY: &str = "linkdeck.order";

/// Stored orders, keyed by profile
pub type OrderMap = HashMap<ProfileId, Vec<String>>;

/// Merge a stored order with the on-chain labels
///
/// Overlay labels still on-chain come first (each once), followed by
/// on-chain labels the overlay does not mention, in ledger order.
pub fn merge(overlay: Option<&[String]>, links: &LinkMap) -> Vec<String> {
    let mut seen = HashSet::with_capacity(links.len());
    let mut ordered = Vec::with_capacity(links.len());

    for label in overlay.unwrap_or_default() {
        if links.contains(label) && seen.insert(label.as_str()) {
            ordered.push(label.clone());
        }
    }
    for label in links.labels() {
        if seen.insert(label) {
            ordered.push(label.to_string());
        }
    }
    ordered
}

/// Remove `label` and re-insert it at `index`, clamped to the length
fn place(order: &mut Vec<String>, label: &str, index: Option<usize>) {
    order.retain(|l| l != label);
    let index = index.map_or(order.len(), |i| i.min(order.len()));
    order.insert(index, label.to_string());
}

#[derive(Debug, Default)]
struct OverlayState {
    orders: OrderMap,
    last_written: Option<String>,
}

/// Locally persisted ordering layered over ledger link sets
pub struct OrderOverlay {
    store: Arc<dyn KeyValueStore>,
    state: RwLock<OverlayState>,
}

impl std::fmt::Debug for OrderOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderOverlay").finish_non_exhaustive()
    }
}

impl OrderOverlay {
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let (orders, raw) = read_orders(store.as_ref()).await;
        debug!(profiles = orders.len(), "Loaded order overlay");
        Self {
            store,
            state: RwLock::new(OverlayState {
                orders,
                last_written: raw,
            }),
        }
    }

    /// Labels of `profile` in display order
    pub async fn ordered_labels(&self, profile: &Profile) -> Vec<String> {
        let state = self.state.read().await;
        merge(
            state.orders.get(&profile.id).map(Vec::as_slice),
            &profile.links,
        )
    }

    /// The raw stored order for a profile, unmerged
    pub async fn entry(&self, profile_id: &ProfileId) -> Option<Vec<String>> {
        self.state.read().await.orders.get(profile_id).cloned()
    }

    /// Copy of the whole mapping
    pub async fn snapshot(&self) -> OrderMap {
        self.state.read().await.orders.clone()
    }

    /// Move an on-chain label to `to_index` within its profile
    ///
    /// Labels the profile does not have are ignored and `false` returned.
    pub async fn reorder(
        &self,
        profile: &Profile,
        label: &str,
        to_index: usize,
    ) -> Result<bool, StorageError> {
        if !profile.links.contains(label) {
            debug!(profile_id = %profile.id, label, "Ignoring reorder of unknown label");
            return Ok(false);
        }
        self.update(|orders| {
            let mut order = merge(orders.get(&profile.id).map(Vec::as_slice), &profile.links);
            place(&mut order, label, Some(to_index));
            orders.insert(profile.id.clone(), order);
        })
        .await?;
        Ok(true)
    }

    /// Place a label that was just added to `profile`
    ///
    /// `None` appends.
    pub async fn insert_at(
        &self,
        profile: &Profile,
        label: &str,
        to_index: Option<usize>,
    ) -> Result<(), StorageError> {
        self.update(|orders| {
            let mut order = merge(orders.get(&profile.id).map(Vec::as_slice), &profile.links);
            place(&mut order, label, to_index);
            orders.insert(profile.id.clone(), order);
        })
        .await
    }

    /// Record a confirmed move of `label` from one profile to another
    pub async fn move_across(
        &self,
        from: &Profile,
        to: &Profile,
        label: &str,
        to_index: Option<usize>,
    ) -> Result<(), StorageError> {
        self.update(|orders| {
            let mut target = merge(orders.get(&to.id).map(Vec::as_slice), &to.links);
            place(&mut target, label, to_index);

            let mut source = merge(orders.get(&from.id).map(Vec::as_slice), &from.links);
            source.retain(|l| l != label);

            orders.insert(to.id.clone(), target);
            orders.insert(from.id.clone(), source);
        })
        .await
    }

    /// Drop the stored order of a profile
    pub async fn forget(&self, profile_id: &ProfileId) -> Result<bool, StorageError> {
        if !self.state.read().await.orders.contains_key(profile_id) {
            return Ok(false);
        }
        self.update(|orders| {
            orders.remove(profile_id);
        })
        .await?;
        Ok(true)
    }

    /// Apply `change` to a copy, persist it, then swap it in
    async fn update(&self, change: impl FnOnce(&mut OrderMap)) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let mut orders = state.orders.clone();
        change(&mut orders);
        let raw = save_json(self.store.as_ref(), ORDER_KEY, &orders).await?;
        state.orders = orders;
        state.last_written = Some(raw);
        Ok(())
    }

    /// Re-read the mapping; `false` if storage still holds our last write
    pub async fn reload(&self) -> bool {
        let (orders, raw) = read_orders(self.store.as_ref()).await;
        let mut state = self.state.write().await;
        if raw.is_some() && raw == state.last_written {
            return false;
        }
        debug!(profiles = orders.len(), "Order overlay reloaded from storage");
        state.orders = orders;
        state.last_written = raw;
        true
    }

    pub async fn on_storage_change(&self, change: &StorageChange) -> bool {
        if change.key != ORDER_KEY {
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
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                        self.reload().await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

async fn read_orders(store: &dyn KeyValueStore) -> (OrderMap, Option<String>) {
    let raw = match store.get(ORDER_KEY).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Failed to read order overlay, starting empty");
            return (OrderMap::new(), None);
        }
    };
    let orders = raw
        .as_deref()
        .and_then(|raw| decode_json(ORDER_KEY, raw))
        .unwrap_or_default();
    (orders, raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkdeck_storage::InMemoryKvStore;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn profile(id: &str, items: &[&str]) -> Profile {
        items.iter().fold(Profile::new(id, "0xowner", "alice", id), |p, label| {
            p.with_link(*label, format!("https://{}.example", label.to_lowercase()))
        })
    }

    #[test]
    fn test_merge_prunes_and_appends() {
        let p = profile("p", &["A", "B", "C"]);
        let stale = labels(&["C", "Gone", "A", "C"]);
        assert_eq!(merge(Some(stale.as_slice()), &p.links), labels(&["C", "A", "B"]));
        assert_eq!(merge(None, &p.links), labels(&["A", "B", "C"]));
    }

    #[test]
    fn test_place_clamps() {
        let mut order = labels(&["A", "B", "C"]);
        place(&mut order, "A", Some(99));
        assert_eq!(order, labels(&["B", "C", "A"]));
        place(&mut order, "A", None);
        assert_eq!(order, labels(&["B", "C", "A"]));
        place(&mut order, "C", Some(0));
        assert_eq!(order, labels(&["C", "B", "A"]));
    }

    #[tokio::test]
    async fn test_reorder_unknown_label_is_noop() {
        let store = Arc::new(InMemoryKvStore::new());
        let overlay = OrderOverlay::load(store.clone()).await;
        let p = profile("p", &["A", "B"]);

        assert!(!overlay.reorder(&p, "Z", 0).await.unwrap());
        assert!(overlay.entry(&p.id).await.is_none());
        assert!(store.get(ORDER_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_forget() {
        let overlay = OrderOverlay::load(Arc::new(InMemoryKvStore::new())).await;
        let p = profile("p", &["A", "B"]);
        overlay.reorder(&p, "B", 0).await.unwrap();
        assert!(overlay.forget(&p.id).await.unwrap());
        assert!(!overlay.forget(&p.id).await.unwrap());
        assert_eq!(overlay.ordered_labels(&p).await, labels(&["A", "B"]));
    }

    #[tokio::test]
    async fn test_corrupt_overlay_is_empty() {
        let store = Arc::new(InMemoryKvStore::new());
        store.set(ORDER_KEY, "[1, 2".into()).await.unwrap();
        let overlay = OrderOverlay::load(store).await;
        assert!(overlay.snapshot().await.is_empty());
    }
}
