//! In-memory ledger for testing
//!
//! Implements both [`LedgerClient`] and [`TransactionSigner`] and applies
//! the same rules the profile contract enforces (link capacity, unique
//! labels, unique usernames), so reconciliation logic can be exercised
//! without a chain.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use linkdeck_core::{InMemoryLedger, Profile, TransactionKind, LedgerError};
//!
//! let ledger = InMemoryLedger::new();
//! let id = ledger.insert_profile(Profile::new("0x1", "0xowner", "alice", "main"));
//!
//! // Make the next removal fail as if the user rejected the signature
//! ledger.fail_next(TransactionKind::RemoveLink, LedgerError::SigningRejected("user".into()));
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::LedgerError;
use crate::profile::{
    Address, MAX_LINKS, ObjectId, PROFILE_TYPE, Profile, ProfileId, STATISTICS_TYPE,
};
use crate::traits::{LedgerClient, TransactionSigner};
use crate::transaction::{Transaction, TransactionKind, TxDigest};

/// Click counters attached to a profile
#[derive(Debug, Clone)]
struct Statistics {
    profile_id: ProfileId,
    owner: Address,
    clicks: HashMap<String, u64>,
}

/// Ledger state held in memory
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    profiles: DashMap<ObjectId, Profile>,
    statistics: DashMap<ObjectId, Statistics>,
    /// (base_username, slug) -> profile
    usernames: DashMap<(String, String), ProfileId>,
    /// Objects whose stored JSON no longer matches the profile shape
    raw_objects: DashMap<ObjectId, serde_json::Value>,
    failures: DashMap<TransactionKind, VecDeque<LedgerError>>,
    executed: Mutex<Vec<Transaction>>,
    latency: Option<Duration>,
    next_id: AtomicU64,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every execution, to widen race windows in tests
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seed a profile directly, bypassing transactions
    pub fn insert_profile(&self, profile: Profile) -> ProfileId {
        let id = profile.id.clone();
        self.usernames.insert(
            (profile.base_username.clone(), profile.slug.clone()),
            id.clone(),
        );
        self.profiles.insert(id.clone(), profile);
        id
    }

    /// Replace an object's stored JSON with arbitrary content
    pub fn put_raw_object(&self, id: ObjectId, object: serde_json::Value) {
        self.raw_objects.insert(id, object);
    }

    /// Current ledger view of a profile
    pub fn profile(&self, id: &ProfileId) -> Option<Profile> {
        self.profiles.get(id).map(|p| p.clone())
    }

    /// Queue a failure for the next transaction of `kind`
    pub fn fail_next(&self, kind: TransactionKind, error: LedgerError) {
        self.failures.entry(kind).or_default().push_back(error);
    }

    /// Successfully executed transactions, in execution order
    pub fn executed(&self) -> Vec<Transaction> {
        self.executed.lock().clone()
    }

    pub fn executed_count(&self, kind: TransactionKind) -> usize {
        self.executed
            .lock()
            .iter()
            .filter(|tx| tx.kind() == kind)
            .count()
    }

    /// Click count recorded for a label
    pub fn clicks(&self, statistics_id: &ObjectId, label: &str) -> u64 {
        self.statistics
            .get(statistics_id)
            .and_then(|s| s.clicks.get(label).copied())
            .unwrap_or(0)
    }

    fn fresh_id(&self) -> ObjectId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        ObjectId::new(format!("0x{n:040x}"))
    }

    fn take_failure(&self, kind: TransactionKind) -> Option<LedgerError> {
        self.failures.get_mut(&kind)?.pop_front()
    }

    fn apply(&self, tx: &Transaction) -> Result<(), LedgerError> {
        match tx {
            Transaction::AddLink {
                profile_id,
                label,
                url,
            } => {
                let mut profile = self
                    .profiles
                    .get_mut(profile_id)
                    .ok_or_else(|| LedgerError::ObjectNotFound(profile_id.to_string()))?;
                if profile.links.len() >= MAX_LINKS {
                    return Err(LedgerError::abort("add_link", "ETooManyLinks"));
                }
                if profile.links.contains(label) {
                    return Err(LedgerError::abort("add_link", "ELabelExists"));
                }
                profile.links.insert(label.clone(), url.clone());
            }
            Transaction::RemoveLink { profile_id, label } => {
                let mut profile = self
                    .profiles
                    .get_mut(profile_id)
                    .ok_or_else(|| LedgerError::ObjectNotFound(profile_id.to_string()))?;
                if profile.links.remove(label).is_none() {
                    return Err(LedgerError::abort("remove_link", "ELabelNotFound"));
                }
            }
            Transaction::UpdateProfile { profile_id, update } => {
                let mut profile = self
                    .profiles
                    .get_mut(profile_id)
                    .ok_or_else(|| LedgerError::ObjectNotFound(profile_id.to_string()))?;
                if let Some(bio) = &update.bio {
                    profile.bio = bio.clone();
                }
                if let Some(avatar_cid) = &update.avatar_cid {
                    profile.avatar_cid = avatar_cid.clone();
                }
                if let Some(theme) = &update.theme {
                    profile.theme = theme.clone();
                }
            }
            Transaction::CreateProfile { profile: new } => {
                let key = (new.base_username.clone(), new.slug.clone());
                if self.usernames.contains_key(&key) {
                    return Err(LedgerError::abort("create_profile", "EUsernameTaken"));
                }
                let id = self.fresh_id();
                let mut profile = Profile::new(
                    id.clone(),
                    new.owner.clone(),
                    new.base_username.clone(),
                    new.slug.clone(),
                );
                profile.bio = new.bio.clone();
                profile.avatar_cid = new.avatar_cid.clone();
                profile.theme = new.theme.clone();
                profile.is_category = new.is_category;
                profile.parent_slug = new.parent_slug.clone();
                profile.created_at = self.next_id.load(Ordering::SeqCst);
                self.usernames.insert(key, id.clone());
                self.profiles.insert(id, profile);
            }
            Transaction::RegisterUsername {
                base_username,
                slug,
                profile_id,
                ..
            } => {
                if !self.profiles.contains_key(profile_id) {
                    return Err(LedgerError::ObjectNotFound(profile_id.to_string()));
                }
                let key = (base_username.clone(), slug.clone());
                match self.usernames.get(&key) {
                    Some(owner) if owner.value() != profile_id => {
                        return Err(LedgerError::abort("register_username", "EUsernameTaken"));
                    }
                    _ => {}
                }
                self.usernames.insert(key, profile_id.clone());
            }
            Transaction::TrackClick {
                statistics_id,
                label,
            } => {
                let mut stats = self
                    .statistics
                    .get_mut(statistics_id)
                    .ok_or_else(|| LedgerError::ObjectNotFound(statistics_id.to_string()))?;
                *stats.clicks.entry(label.clone()).or_default() += 1;
            }
            Transaction::CreateStatistics { profile_id } => {
                let owner = self
                    .profiles
                    .get(profile_id)
                    .map(|p| p.owner.clone())
                    .ok_or_else(|| LedgerError::ObjectNotFound(profile_id.to_string()))?;
                let id = self.fresh_id();
                self.statistics.insert(
                    id,
                    Statistics {
                        profile_id: profile_id.clone(),
                        owner,
                        clicks: HashMap::new(),
                    },
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn get_object(&self, id: &ObjectId) -> Result<Option<serde_json::Value>, LedgerError> {
        if let Some(raw) = self.raw_objects.get(id) {
            return Ok(Some(raw.clone()));
        }
        if let Some(profile) = self.profiles.get(id) {
            return Ok(Some(profile.to_object()));
        }
        if let Some(stats) = self.statistics.get(id) {
            return Ok(Some(serde_json::json!({
                "profile_id": stats.profile_id,
                "clicks": stats.clicks,
            })));
        }
        Ok(None)
    }

    async fn owned_objects(
        &self,
        owner: &Address,
        type_tag: &str,
    ) -> Result<Vec<ObjectId>, LedgerError> {
        let mut ids: Vec<ObjectId> = match type_tag {
            PROFILE_TYPE => self
                .profiles
                .iter()
                .filter(|p| &p.owner == owner)
                .map(|p| p.key().clone())
                .collect(),
            STATISTICS_TYPE => self
                .statistics
                .iter()
                .filter(|s| &s.owner == owner)
                .map(|s| s.key().clone())
                .collect(),
            _ => Vec::new(),
        };
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl TransactionSigner for InMemoryLedger {
    async fn sign_and_execute(&self, tx: Transaction) -> Result<TxDigest, LedgerError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let kind = tx.kind();
        if let Some(error) = self.take_failure(kind) {
            debug!(%kind, %error, "Injected ledger failure");
            return Err(error);
        }

        self.apply(&tx)?;
        let digest = TxDigest::new(format!("tx-{}", self.fresh_id()));
        trace!(%kind, %digest, "Executed transaction");
        self.executed.lock().push(tx);
        Ok(digest)
    }
}
