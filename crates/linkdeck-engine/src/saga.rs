//! Two-step cross-profile move
//!
//! Moving a link between profiles takes two ledger transactions: add to the
//! target, then remove from the source. They cannot be made atomic, so each
//! move is journaled before the first step and its progress recorded after
//! every step. A move that stopped halfway (failed removal, crash) stays in
//! the journal and can be resumed or abandoned.
//!
//! ```text
//! begin ──► add to target ──► record ──► remove from source ──► finish
//!               │                              │
//!               └─ fails: record dropped       └─ fails: record kept
//!                  unless the target already
//!                  holds the link
//! ```
//!
//! The attempt counter is written before any ledger call, so a move found
//! in the journal after a crash always checks the ledger before re-sending.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use linkdeck_core::{Profile, ProfileId};
use linkdeck_storage::{KeyValueStore, StorageError, load_json, save_json};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{SagaError, StoreError};
use crate::store::RemoteProfileStore;

/// Storage key of the move journal
pub const MOVES_KEY: &str = "linkdeck.moves";

/// A journaled move and how far it got
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMove {
    pub id: String,
    pub label: String,
    pub url: String,
    pub from_profile_id: ProfileId,
    pub to_profile_id: ProfileId,
    /// Requested position in the target's display order
    #[serde(default)]
    pub to_index: Option<usize>,
    pub added_to_target: bool,
    pub removed_from_source: bool,
    /// Number of times the move has been run
    #[serde(default)]
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
}

impl PendingMove {
    pub fn new(
        label: impl Into<String>,
        url: impl Into<String>,
        from_profile_id: ProfileId,
        to_profile_id: ProfileId,
        to_index: Option<usize>,
    ) -> Self {
        Self {
            id: format!("{:016x}", rand::rng().random::<u64>()),
            label: label.into(),
            url: url.into(),
            from_profile_id,
            to_profile_id,
            to_index,
            added_to_target: false,
            removed_from_source: false,
            attempts: 0,
            started_at: Utc::now(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.added_to_target && self.removed_from_source
    }
}

/// Profiles as they stand after a finished move
#[derive(Debug, Clone)]
pub struct MoveReport {
    pub pending: PendingMove,
    pub from_profile: Option<Profile>,
    pub to_profile: Option<Profile>,
}

/// Persisted list of moves that have not finished
pub struct MoveJournal {
    store: Arc<dyn KeyValueStore>,
    moves: Mutex<Vec<PendingMove>>,
}

impl std::fmt::Debug for MoveJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MoveJournal").finish_non_exhaustive()
    }
}

impl MoveJournal {
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let moves: Vec<PendingMove> = load_json(store.as_ref(), MOVES_KEY)
            .await
            .unwrap_or_default();
        if !moves.is_empty() {
            info!(count = moves.len(), "Found unfinished moves");
        }
        Self {
            store,
            moves: Mutex::new(moves),
        }
    }

    /// Unfinished moves, oldest first
    pub async fn pending(&self) -> Vec<PendingMove> {
        self.moves.lock().await.clone()
    }

    /// Journal a move before its first step
    pub async fn begin(&self, pending: &PendingMove) -> Result<(), StorageError> {
        self.write(|moves| moves.push(pending.clone())).await
    }

    /// Store the progress of a move
    pub async fn record(&self, pending: &PendingMove) -> Result<(), StorageError> {
        self.write(|moves| match moves.iter().position(|m| m.id == pending.id) {
            Some(index) => moves[index] = pending.clone(),
            None => moves.push(pending.clone()),
        })
        .await
    }

    /// Drop a move once both steps are done
    pub async fn finish(&self, id: &str) -> Result<(), StorageError> {
        self.write(|moves| moves.retain(|m| m.id != id)).await
    }

    /// Give up on a move, leaving both profiles as they are
    pub async fn abandon(&self, id: &str) -> Result<PendingMove, SagaError> {
        let pending = self
            .moves
            .lock()
            .await
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| SagaError::UnknownMove(id.to_string()))?;
        self.finish(id).await?;
        warn!(
            id,
            label = %pending.label,
            added_to_target = pending.added_to_target,
            "Move abandoned"
        );
        Ok(pending)
    }

    async fn write(&self, change: impl FnOnce(&mut Vec<PendingMove>)) -> Result<(), StorageError> {
        let mut moves = self.moves.lock().await;
        let mut next = moves.clone();
        change(&mut next);
        save_json(self.store.as_ref(), MOVES_KEY, &next).await?;
        *moves = next;
        Ok(())
    }

    /// Run the remaining steps of a journaled move
    ///
    /// A resumed move first checks the ledger: a target that already holds
    /// the link counts as added, a source that no longer has the label
    /// counts as removed.
    #[instrument(skip(self, store, pending), fields(id = %pending.id, label = %pending.label))]
    pub async fn run(
        &self,
        store: &RemoteProfileStore,
        mut pending: PendingMove,
    ) -> Result<MoveReport, SagaError> {
        // Persisted before any ledger call so a crash mid-step is seen as a resume
        pending.attempts += 1;
        let resumed = pending.attempts > 1;
        self.record(&pending).await?;

        if !pending.added_to_target {
            if resumed && self.target_has_link(store, &pending).await {
                debug!("Target already holds the link");
            } else if let Err(e) = self.add_to_target(store, &pending).await {
                // An earlier run may have landed the add without recording it
                if !self.target_has_link(store, &pending).await {
                    self.finish(&pending.id).await?;
                    return Err(SagaError::AddFailed(e));
                }
                debug!(error = %e, "Add rejected but the target already holds the link");
            }
            pending.added_to_target = true;
            self.record(&pending).await?;
        }

        if !pending.removed_from_source {
            if resumed && !self.source_has_label(store, &pending).await {
                debug!("Source no longer has the label");
            } else {
                let tx = RemoteProfileStore::remove_link(&pending.from_profile_id, &pending.label);
                if let Err(e) = store.submit(tx).await {
                    self.record(&pending).await?;
                    warn!(error = %e, "Move stopped after adding to target");
                    return Err(SagaError::RemoveFailed(e));
                }
            }
            pending.removed_from_source = true;
        }

        self.finish(&pending.id).await?;
        info!(
            from = %pending.from_profile_id,
            to = %pending.to_profile_id,
            "Move finished"
        );

        let to_profile = store.refresh_profile(&pending.to_profile_id).await;
        let from_profile = store.refresh_profile(&pending.from_profile_id).await;
        Ok(MoveReport {
            pending,
            from_profile,
            to_profile,
        })
    }

    async fn add_to_target(
        &self,
        store: &RemoteProfileStore,
        pending: &PendingMove,
    ) -> Result<(), StoreError> {
        let tx = RemoteProfileStore::add_link(&pending.to_profile_id, &pending.label, &pending.url)?;
        store.submit(tx).await?;
        Ok(())
    }

    async fn target_has_link(&self, store: &RemoteProfileStore, pending: &PendingMove) -> bool {
        store
            .refresh_profile(&pending.to_profile_id)
            .await
            .is_some_and(|p| p.links.get(&pending.label) == Some(pending.url.as_str()))
    }

    async fn source_has_label(&self, store: &RemoteProfileStore, pending: &PendingMove) -> bool {
        // An unreadable source is treated as still holding the label
        store
            .refresh_profile(&pending.from_profile_id)
            .await
            .is_none_or(|p| p.links.contains(&pending.label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkdeck_core::{InMemoryLedger, LedgerError, TransactionKind};
    use linkdeck_storage::InMemoryKvStore;

    fn setup() -> (Arc<InMemoryLedger>, RemoteProfileStore, ProfileId, ProfileId) {
        let ledger = Arc::new(InMemoryLedger::new());
        let p1 = ledger.insert_profile(
            Profile::new("0x1", "0xowner", "alice", "main").with_link("X", "https://x.com"),
        );
        let p2 = ledger.insert_profile(Profile::new("0x2", "0xowner", "alice", "work"));
        let store = RemoteProfileStore::new(ledger.clone(), ledger.clone());
        (ledger, store, p1, p2)
    }

    #[tokio::test]
    async fn test_completed_move_leaves_no_record() {
        let (ledger, store, p1, p2) = setup();
        let journal = MoveJournal::load(Arc::new(InMemoryKvStore::new())).await;

        let pending = PendingMove::new("X", "https://x.com", p1.clone(), p2.clone(), None);
        journal.begin(&pending).await.unwrap();
        let report = journal.run(&store, pending).await.unwrap();

        assert!(report.pending.is_complete());
        assert!(report.to_profile.unwrap().links.contains("X"));
        assert!(!ledger.profile(&p1).unwrap().links.contains("X"));
        assert!(journal.pending().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_add_drops_record() {
        let (ledger, store, p1, p2) = setup();
        let journal = MoveJournal::load(Arc::new(InMemoryKvStore::new())).await;
        ledger.fail_next(TransactionKind::AddLink, LedgerError::Network("offline".into()));

        let pending = PendingMove::new("X", "https://x.com", p1.clone(), p2, None);
        journal.begin(&pending).await.unwrap();
        let err = journal.run(&store, pending).await.unwrap_err();

        assert!(matches!(err, SagaError::AddFailed(_)));
        assert!(journal.pending().await.is_empty());
        assert!(ledger.profile(&p1).unwrap().links.contains("X"));
    }

    #[tokio::test]
    async fn test_journal_survives_restart() {
        let (ledger, store, p1, p2) = setup();
        let kv: Arc<dyn KeyValueStore> = Arc::new(InMemoryKvStore::new());
        ledger.fail_next(
            TransactionKind::RemoveLink,
            LedgerError::SigningRejected("closed wallet".into()),
        );

        {
            let journal = MoveJournal::load(kv.clone()).await;
            let pending = PendingMove::new("X", "https://x.com", p1.clone(), p2.clone(), Some(0));
            journal.begin(&pending).await.unwrap();
            assert!(matches!(
                journal.run(&store, pending).await,
                Err(SagaError::RemoveFailed(_))
            ));
        }

        let journal = MoveJournal::load(kv).await;
        let pending = journal.pending().await;
        assert_eq!(pending.len(), 1);
        assert!(pending[0].added_to_target);
        assert!(!pending[0].removed_from_source);
        assert_eq!(pending[0].to_index, Some(0));

        journal.run(&store, pending[0].clone()).await.unwrap();
        assert!(journal.pending().await.is_empty());
        assert!(!ledger.profile(&p1).unwrap().links.contains("X"));
        assert!(ledger.profile(&p2).unwrap().links.contains("X"));
        assert_eq!(ledger.executed_count(TransactionKind::AddLink), 1);
    }

    #[tokio::test]
    async fn test_resume_after_crash_between_add_and_record() {
        use linkdeck_core::TransactionSigner;

        let (ledger, store, p1, p2) = setup();
        let kv: Arc<dyn KeyValueStore> = Arc::new(InMemoryKvStore::new());

        let id = {
            let journal = MoveJournal::load(kv.clone()).await;
            let pending = PendingMove::new("X", "https://x.com", p1.clone(), p2.clone(), None);
            journal.begin(&pending).await.unwrap();
            // The add lands, then the process dies before progress is recorded
            let tx = RemoteProfileStore::add_link(&p2, "X", "https://x.com").unwrap();
            ledger.sign_and_execute(tx).await.unwrap();
            pending.id
        };

        let journal = MoveJournal::load(kv).await;
        let pending = journal.pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert!(!pending[0].added_to_target);

        let report = journal.run(&store, pending[0].clone()).await.unwrap();
        assert!(report.pending.is_complete());
        assert!(journal.pending().await.is_empty());
        assert!(!ledger.profile(&p1).unwrap().links.contains("X"));
        assert!(ledger.profile(&p2).unwrap().links.contains("X"));
        assert_eq!(ledger.executed_count(TransactionKind::AddLink), 1);
    }

    #[tokio::test]
    async fn test_attempt_is_recorded_before_first_step() {
        let (ledger, store, p1, p2) = setup();
        let kv: Arc<dyn KeyValueStore> = Arc::new(InMemoryKvStore::new());
        ledger.fail_next(
            TransactionKind::RemoveLink,
            LedgerError::SigningRejected("closed wallet".into()),
        );

        let journal = MoveJournal::load(kv.clone()).await;
        let pending = PendingMove::new("X", "https://x.com", p1, p2, None);
        journal.begin(&pending).await.unwrap();
        let _ = journal.run(&store, pending).await;

        let reloaded = MoveJournal::load(kv).await.pending().await;
        assert_eq!(reloaded[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_abandon() {
        let journal = MoveJournal::load(Arc::new(InMemoryKvStore::new())).await;
        let pending = PendingMove::new("X", "https://x.com", "0x1".into(), "0x2".into(), None);
        journal.begin(&pending).await.unwrap();

        assert_eq!(journal.abandon(&pending.id).await.unwrap(), pending);
        assert!(matches!(
            journal.abandon(&pending.id).await,
            Err(SagaError::UnknownMove(_))
        ));
    }
}
