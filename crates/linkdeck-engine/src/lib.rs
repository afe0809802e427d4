//! # Linkdeck Engine
//!
//! Client-side reconciliation between ledger-held profiles and local state.
//!
//! This crate provides [`Linkdeck`], which ties together:
//! - [`RemoteProfileStore`]: ledger reads and transaction submission
//! - [`LinkLibrary`]: probed, locally persisted reusable links
//! - [`OrderOverlay`]: local display order over on-chain label sets
//! - [`DragCoordinator`]: drop handling with per-gesture deduplication
//! - [`MoveJournal`]: the persisted two-step cross-profile move
//!
//! ## Example
//!
//! ```rust,ignore
//! use linkdeck_engine::{DragSource, DropTarget, EngineConfig, Linkdeck};
//!
//! let deck = Linkdeck::open(EngineConfig::with_data_dir("./deck"), client, signer).await?;
//! deck.resume_moves().await;
//!
//! let item = deck.library().add("Docs", "docs.rs", None).await?;
//! let payload = deck.drag().begin_drag(&item.id, DragSource::Library, None);
//! let outcome = deck
//!     .drag()
//!     .handle_encoded_drop(&payload.encode()?, DropTarget::end(profile_id))
//!     .await;
//! ```

pub mod config;
pub mod drag;
pub mod error;
pub mod library;
pub mod overlay;
pub mod saga;
pub mod store;

pub use config::EngineConfig;
pub use drag::{
    DragCoordinator, DragPayload, DragSource, DragToken, DropOutcome, DropSlot, DropSnapshot,
    DropTarget, Effect, RejectReason, reconcile_drop,
};
pub use error::{ConfigError, EngineError, EngineResult, PayloadError, SagaError, StoreError};
pub use library::{LIBRARY_KEY, LIBRARY_NEXT_ID_KEY, LibraryItem, LibraryRejection, LinkLibrary};
pub use overlay::{ORDER_KEY, OrderMap, OrderOverlay, merge};
pub use saga::{MOVES_KEY, MoveJournal, MoveReport, PendingMove};
pub use store::RemoteProfileStore;

use std::sync::Arc;

use linkdeck_core::{LedgerClient, LinkProbe, Notifier, Toast, TransactionSigner};
use linkdeck_linkcheck::LinkReachabilityChecker;
use linkdeck_storage::{FileKvStore, KeyValueStore};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

/// All reconciliation components over one local store
pub struct Linkdeck {
    config: EngineConfig,
    kv: Arc<dyn KeyValueStore>,
    notifier: Notifier,
    store: Arc<RemoteProfileStore>,
    library: Arc<LinkLibrary>,
    overlay: Arc<OrderOverlay>,
    journal: Arc<MoveJournal>,
    drag: DragCoordinator,
}

impl std::fmt::Debug for Linkdeck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Linkdeck")
            .field("data_dir", &self.config.data_dir)
            .finish_non_exhaustive()
    }
}

impl Linkdeck {
    /// Open the file store in the configured data directory and probe links
    /// with a [`LinkReachabilityChecker`]
    pub async fn open(
        config: EngineConfig,
        client: Arc<dyn LedgerClient>,
        signer: Arc<dyn TransactionSigner>,
    ) -> EngineResult<Self> {
        let kv = FileKvStore::with_options(&config.data_dir, config.sync_writes).await?;
        let checker = LinkReachabilityChecker::new(config.checker.clone())?;
        Ok(Self::with_parts(config, Arc::new(kv), client, signer, Arc::new(checker)).await)
    }

    /// Assemble from explicit parts
    pub async fn with_parts(
        config: EngineConfig,
        kv: Arc<dyn KeyValueStore>,
        client: Arc<dyn LedgerClient>,
        signer: Arc<dyn TransactionSigner>,
        probe: Arc<dyn LinkProbe>,
    ) -> Self {
        let notifier = Notifier::with_capacity(config.toast_capacity);
        let store = Arc::new(RemoteProfileStore::new(client, signer));

        let ids = Arc::new(LinkLibrary::allocator(kv.clone()).await);
        let library = Arc::new(LinkLibrary::load(kv.clone(), ids, probe, notifier.clone()).await);
        let overlay = Arc::new(OrderOverlay::load(kv.clone()).await);
        let journal = Arc::new(MoveJournal::load(kv.clone()).await);

        let drag = DragCoordinator::new(
            store.clone(),
            library.clone(),
            overlay.clone(),
            journal.clone(),
            notifier.clone(),
        );

        info!(data_dir = %config.data_dir.display(), "Linkdeck ready");
        Self {
            config,
            kv,
            notifier,
            store,
            library,
            overlay,
            journal,
            drag,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<RemoteProfileStore> {
        &self.store
    }

    pub fn library(&self) -> &Arc<LinkLibrary> {
        &self.library
    }

    pub fn overlay(&self) -> &Arc<OrderOverlay> {
        &self.overlay
    }

    pub fn journal(&self) -> &Arc<MoveJournal> {
        &self.journal
    }

    pub fn drag(&self) -> &DragCoordinator {
        &self.drag
    }

    pub fn storage(&self) -> &Arc<dyn KeyValueStore> {
        &self.kv
    }

    /// Subscribe to user-facing notifications
    pub fn toasts(&self) -> broadcast::Receiver<Toast> {
        self.notifier.subscribe()
    }

    /// Finish moves left over from a previous session
    pub async fn resume_moves(&self) -> Vec<DropOutcome> {
        self.drag.resume_moves().await
    }

    /// Keep library and overlay in step with writes from other instances
    /// sharing the store
    pub fn spawn_sync(&self) -> Vec<JoinHandle<()>> {
        vec![
            self.library.clone().spawn_sync(),
            self.overlay.clone().spawn_sync(),
        ]
    }
}
