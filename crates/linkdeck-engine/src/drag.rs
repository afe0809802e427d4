//! Drag-and-drop reconciliation
//!
//! The UI layer only encodes a [`DragPayload`] at drag start and hands the
//! decoded payload plus a [`DropTarget`] to [`DragCoordinator::handle_drop`].
//! Deciding what a drop means is the pure [`reconcile_drop`]; executing it
//! (ledger mutations, overlay updates, toasts) is the coordinator's job.
//!
//! Per gesture: Idle → Dragging → Dropped → Reconciling → Idle. A drop whose
//! token is already being reconciled is ignored, so a drop event fired twice
//! has its side effects applied once.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashSet;
use derive_more::Display;
use linkdeck_core::{Notifier, Profile, ProfileId, ValidationError, check_can_receive};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::{PayloadError, SagaError};
use crate::library::{LibraryItem, LinkLibrary};
use crate::overlay::OrderOverlay;
use crate::saga::{MoveJournal, MoveReport, PendingMove};
use crate::store::RemoteProfileStore;

/// Where a drag started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragSource {
    Library,
    Profile,
}

/// Single-gesture deduplication key
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[display("{_0}")]
pub struct DragToken(String);

impl DragToken {
    /// Fresh 128-bit random token
    pub fn random() -> Self {
        Self(format!("{:032x}", rand::rng().random::<u128>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DragToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// What travels in the drag transfer buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragPayload {
    /// Library item id for library drags, the label for profile drags
    pub link_id: String,
    pub from: DragSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_profile_id: Option<ProfileId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<DragToken>,
}

impl DragPayload {
    pub fn library(item_id: impl Into<String>) -> Self {
        Self {
            link_id: item_id.into(),
            from: DragSource::Library,
            from_profile_id: None,
            token: None,
        }
    }

    pub fn profile(profile_id: ProfileId, label: impl Into<String>) -> Self {
        Self {
            link_id: label.into(),
            from: DragSource::Profile,
            from_profile_id: Some(profile_id),
            token: None,
        }
    }

    pub fn with_token(mut self, token: DragToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn encode(&self) -> Result<String, PayloadError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> Result<Self, PayloadError> {
        let payload: Self = serde_json::from_str(raw)?;
        if payload.link_id.is_empty() {
            return Err(PayloadError::EmptyLinkId);
        }
        Ok(payload)
    }
}

/// Position inside a profile's rendered list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropSlot {
    /// On the row rendered at this index: insert before it
    Before(usize),
    /// On the trailing append zone
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropTarget {
    pub profile_id: ProfileId,
    pub slot: DropSlot,
}

impl DropTarget {
    pub fn before(profile_id: ProfileId, index: usize) -> Self {
        Self {
            profile_id,
            slot: DropSlot::Before(index),
        }
    }

    pub fn end(profile_id: ProfileId) -> Self {
        Self {
            profile_id,
            slot: DropSlot::End,
        }
    }
}

/// Why a drop was refused
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[display("profile has at most 10 links")]
    Max,
    #[display("label already exists in target")]
    Duplicate,
    #[display("dragged link no longer exists")]
    UnknownItem,
    #[display("profile could not be loaded")]
    UnknownProfile,
    #[display("dragged link has no origin profile")]
    MissingOrigin,
    #[display("{_0}")]
    Invalid(String),
}

impl RejectReason {
    /// Short machine code
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::Max => "max",
            RejectReason::Duplicate => "dup",
            RejectReason::UnknownItem => "unknown-item",
            RejectReason::UnknownProfile => "unknown-profile",
            RejectReason::MissingOrigin => "missing-origin",
            RejectReason::Invalid(_) => "invalid",
        }
    }
}

impl From<ValidationError> for RejectReason {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::TooManyLinks { .. } => RejectReason::Max,
            ValidationError::DuplicateLabel(_) => RejectReason::Duplicate,
            other => RejectReason::Invalid(other.to_string()),
        }
    }
}

/// What a drop should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    CopyFromLibrary {
        item: LibraryItem,
        profile_id: ProfileId,
        /// `None` appends
        to_index: Option<usize>,
    },
    Reorder {
        profile_id: ProfileId,
        label: String,
        to_index: usize,
    },
    Move {
        label: String,
        url: String,
        from_profile_id: ProfileId,
        to_profile_id: ProfileId,
        to_index: Option<usize>,
    },
    Reject(RejectReason),
}

/// State a drop is reconciled against
#[derive(Debug, Clone, Copy)]
pub struct DropSnapshot<'a> {
    pub target: &'a Profile,
    /// Target labels in rendered order
    pub target_order: &'a [String],
    /// Origin profile of a cross-profile drag
    pub source: Option<&'a Profile>,
    /// The dragged item of a library drag
    pub library_item: Option<&'a LibraryItem>,
}

/// Decide what a drop means
///
/// Pure: touches neither the ledger nor local storage.
pub fn reconcile_drop(
    payload: &DragPayload,
    target: &DropTarget,
    snapshot: &DropSnapshot<'_>,
) -> Effect {
    let len = snapshot.target_order.len();
    let insert_index = match target.slot {
        DropSlot::Before(index) => Some(index.min(len)),
        DropSlot::End => None,
    };

    match payload.from {
        DragSource::Library => {
            let Some(item) = snapshot.library_item.filter(|i| i.id == payload.link_id) else {
                return Effect::Reject(RejectReason::UnknownItem);
            };
            if let Err(e) = check_can_receive(&snapshot.target.links, &item.label) {
                return Effect::Reject(e.into());
            }
            Effect::CopyFromLibrary {
                item: item.clone(),
                profile_id: target.profile_id.clone(),
                to_index: insert_index,
            }
        }
        DragSource::Profile => {
            let Some(from_profile_id) = payload.from_profile_id.as_ref() else {
                return Effect::Reject(RejectReason::MissingOrigin);
            };
            let label = &payload.link_id;

            if *from_profile_id == target.profile_id {
                let Some(current) = snapshot.target_order.iter().position(|l| l == label) else {
                    return Effect::Reject(RejectReason::UnknownItem);
                };
                // Indices are in the rendered order, which still includes
                // the dragged row
                let to_index = match insert_index {
                    Some(index) if index > current => index - 1,
                    Some(index) => index,
                    None => len.saturating_sub(1),
                };
                return Effect::Reorder {
                    profile_id: target.profile_id.clone(),
                    label: label.clone(),
                    to_index,
                };
            }

            let Some(source) = snapshot.source.filter(|p| p.id == *from_profile_id) else {
                return Effect::Reject(RejectReason::UnknownProfile);
            };
            let Some(url) = source.links.get(label) else {
                return Effect::Reject(RejectReason::UnknownItem);
            };
            if let Err(e) = check_can_receive(&snapshot.target.links, label) {
                return Effect::Reject(e.into());
            }
            Effect::Move {
                label: label.clone(),
                url: url.to_string(),
                from_profile_id: from_profile_id.clone(),
                to_profile_id: target.profile_id.clone(),
                to_index: insert_index,
            }
        }
    }
}

/// How a drop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// The same gesture is already being reconciled
    Ignored,
    Rejected(RejectReason),
    Copied { profile_id: ProfileId, label: String },
    Reordered { profile_id: ProfileId, label: String },
    Moved {
        from_profile_id: ProfileId,
        to_profile_id: ProfileId,
        label: String,
    },
    /// Added to the target, still present in the source
    PartiallyMoved { move_id: String, label: String },
    Failed(String),
}

/// Holds a key in an in-flight set until dropped
struct InFlightGuard<K: Eq + Hash + Clone> {
    set: Arc<DashSet<K>>,
    key: K,
}

impl<K: Eq + Hash + Clone> InFlightGuard<K> {
    fn acquire(set: &Arc<DashSet<K>>, key: K) -> Option<Self> {
        if !set.insert(key.clone()) {
            return None;
        }
        Some(Self {
            set: set.clone(),
            key,
        })
    }
}

impl<K: Eq + Hash + Clone> Drop for InFlightGuard<K> {
    fn drop(&mut self) {
        self.set.remove(&self.key);
    }
}

/// Turns drops into ledger mutations and overlay updates
pub struct DragCoordinator {
    store: Arc<RemoteProfileStore>,
    library: Arc<LinkLibrary>,
    overlay: Arc<OrderOverlay>,
    journal: Arc<MoveJournal>,
    notifier: Notifier,
    in_flight: Arc<DashSet<DragToken>>,
    /// Ids of journaled moves currently being run
    running_moves: Arc<DashSet<String>>,
}

impl std::fmt::Debug for DragCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragCoordinator")
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl DragCoordinator {
    pub fn new(
        store: Arc<RemoteProfileStore>,
        library: Arc<LinkLibrary>,
        overlay: Arc<OrderOverlay>,
        journal: Arc<MoveJournal>,
        notifier: Notifier,
    ) -> Self {
        Self {
            store,
            library,
            overlay,
            journal,
            notifier,
            in_flight: Arc::new(DashSet::new()),
            running_moves: Arc::new(DashSet::new()),
        }
    }

    /// Start a gesture: the returned payload carries a fresh token
    pub fn begin_drag(
        &self,
        link_id: impl Into<String>,
        from: DragSource,
        from_profile_id: Option<ProfileId>,
    ) -> DragPayload {
        let payload = DragPayload {
            link_id: link_id.into(),
            from,
            from_profile_id,
            token: Some(DragToken::random()),
        };
        debug!(link_id = %payload.link_id, ?from, "Drag started");
        payload
    }

    /// Number of drops currently being reconciled
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Decode a transfer buffer and handle the drop
    pub async fn handle_encoded_drop(&self, raw: &str, target: DropTarget) -> DropOutcome {
        match DragPayload::decode(raw) {
            Ok(payload) => self.handle_drop(payload, target).await,
            Err(e) => {
                warn!(error = %e, "Could not decode drop");
                self.notifier.error("Could not read the dragged item");
                DropOutcome::Failed(e.to_string())
            }
        }
    }

    /// Reconcile and execute one drop
    ///
    /// Always emits exactly one toast, except for ignored duplicates.
    #[instrument(skip(self, payload, target), fields(link_id = %payload.link_id, to = %target.profile_id))]
    pub async fn handle_drop(&self, payload: DragPayload, target: DropTarget) -> DropOutcome {
        let _guard = match payload.token.clone() {
            Some(token) => match InFlightGuard::acquire(&self.in_flight, token) {
                Some(guard) => Some(guard),
                None => {
                    debug!("Drop already in flight, ignoring");
                    return DropOutcome::Ignored;
                }
            },
            None => None,
        };

        let Some(target_profile) = self.store.refresh_profile(&target.profile_id).await else {
            return self.reject(RejectReason::UnknownProfile);
        };
        let target_order = self.overlay.ordered_labels(&target_profile).await;

        let library_item = match payload.from {
            DragSource::Library => self.library.get(&payload.link_id).await,
            DragSource::Profile => None,
        };
        let source_profile = match &payload.from_profile_id {
            Some(id) if payload.from == DragSource::Profile && *id != target.profile_id => {
                self.store.refresh_profile(id).await
            }
            _ => None,
        };

        let snapshot = DropSnapshot {
            target: &target_profile,
            target_order: &target_order,
            source: source_profile.as_ref(),
            library_item: library_item.as_ref(),
        };
        let effect = reconcile_drop(&payload, &target, &snapshot);
        debug!(?effect, "Drop reconciled");

        match effect {
            Effect::Reject(reason) => self.reject(reason),
            Effect::CopyFromLibrary {
                item,
                profile_id,
                to_index,
            } => self.copy_from_library(item, profile_id, target_profile, to_index).await,
            Effect::Reorder {
                profile_id,
                label,
                to_index,
            } => self.reorder(&target_profile, profile_id, label, to_index).await,
            Effect::Move {
                label,
                url,
                from_profile_id,
                to_profile_id,
                to_index,
            } => {
                let pending = PendingMove::new(label, url, from_profile_id, to_profile_id, to_index);
                if let Err(e) = self.journal.begin(&pending).await {
                    warn!(error = %e, "Could not journal move");
                    self.notifier.error(format!("Could not start the move: {e}"));
                    return DropOutcome::Failed(e.to_string());
                }
                self.run_move(pending).await
            }
        }
    }

    /// Re-run every journaled move that did not finish
    ///
    /// Moves already running in this process are reported as `Ignored`.
    pub async fn resume_moves(&self) -> Vec<DropOutcome> {
        let mut outcomes = Vec::new();
        for pending in self.journal.pending().await {
            info!(id = %pending.id, label = %pending.label, "Resuming move");
            outcomes.push(self.run_move(pending).await);
        }
        outcomes
    }

    fn reject(&self, reason: RejectReason) -> DropOutcome {
        info!(code = reason.code(), %reason, "Drop rejected");
        self.notifier.warn(reason.to_string());
        DropOutcome::Rejected(reason)
    }

    async fn copy_from_library(
        &self,
        item: LibraryItem,
        profile_id: ProfileId,
        before: Profile,
        to_index: Option<usize>,
    ) -> DropOutcome {
        let tx = match RemoteProfileStore::add_link(&profile_id, &item.label, &item.url) {
            Ok(tx) => tx,
            Err(e) => return self.reject(e.into()),
        };

        let refreshed = match self.store.submit_and_refresh(tx).await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                self.notifier.error(format!("Failed to add \"{}\": {e}", item.label));
                return DropOutcome::Failed(e.to_string());
            }
        };

        match &refreshed {
            Some(profile) => {
                if let Err(e) = self.overlay.insert_at(profile, &item.label, to_index).await {
                    warn!(error = %e, "Link added but its position was not saved");
                }
            }
            // Position is only recorded against a fetched profile
            None => warn!(%profile_id, "Link added but the profile could not be re-read"),
        }

        self.notifier
            .success(format!("Added \"{}\" to {}", item.label, before.slug));
        DropOutcome::Copied {
            profile_id,
            label: item.label,
        }
    }

    async fn reorder(
        &self,
        profile: &Profile,
        profile_id: ProfileId,
        label: String,
        to_index: usize,
    ) -> DropOutcome {
        match self.overlay.reorder(profile, &label, to_index).await {
            Ok(_) => {
                self.notifier.info(format!("Moved \"{label}\""));
                DropOutcome::Reordered { profile_id, label }
            }
            Err(e) => {
                self.notifier.error(format!("Could not save the new order: {e}"));
                DropOutcome::Failed(e.to_string())
            }
        }
    }

    async fn run_move(&self, pending: PendingMove) -> DropOutcome {
        let move_id = pending.id.clone();
        let Some(_running) = InFlightGuard::acquire(&self.running_moves, move_id.clone()) else {
            debug!(id = %move_id, "Move already running, skipping");
            return DropOutcome::Ignored;
        };
        let label = pending.label.clone();
        let to_profile_id = pending.to_profile_id.clone();
        let to_index = pending.to_index;

        match self.journal.run(&self.store, pending).await {
            Ok(MoveReport {
                pending,
                from_profile,
                to_profile,
            }) => {
                if let (Some(from), Some(to)) = (&from_profile, &to_profile)
                    && let Err(e) = self.overlay.move_across(from, to, &label, to_index).await
                {
                    warn!(error = %e, "Link moved but its position was not saved");
                }
                self.notifier.success(format!("Moved \"{label}\""));
                DropOutcome::Moved {
                    from_profile_id: pending.from_profile_id,
                    to_profile_id: pending.to_profile_id,
                    label,
                }
            }
            Err(SagaError::AddFailed(e)) => {
                self.notifier.error(format!("Failed to move \"{label}\": {e}"));
                DropOutcome::Failed(e.to_string())
            }
            Err(SagaError::RemoveFailed(e)) => {
                // The add is confirmed, so the target may show the label
                if let Some(to) = self.store.refresh_profile(&to_profile_id).await
                    && let Err(err) = self.overlay.insert_at(&to, &label, to_index).await
                {
                    warn!(error = %err, "Could not save target position");
                }
                self.notifier.error(format!(
                    "\"{label}\" now exists in both profiles; removing it from the source failed: {e}"
                ));
                DropOutcome::PartiallyMoved { move_id, label }
            }
            Err(e) => {
                self.notifier.error(format!("Failed to move \"{label}\": {e}"));
                DropOutcome::Failed(e.to_string())
            }
        }
    }
}
