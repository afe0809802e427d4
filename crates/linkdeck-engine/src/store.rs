//! Remote profile store
//!
//! Reads profiles from the ledger, builds mutations and submits them to the
//! signer. Nothing is applied optimistically: after a transaction succeeds
//! the affected profile is re-fetched and replaces the cached copy
//! wholesale.

use std::sync::Arc;

use dashmap::DashMap;
use linkdeck_core::{
    Address, LedgerClient, NewProfile, ObjectId, PROFILE_TYPE, Profile, ProfileId,
    ProfileUpdate, Transaction, TransactionSigner, TxDigest, ValidationError, validate_label,
    validate_link_url,
};
use tracing::{debug, info, warn};

use crate::error::StoreError;

/// Ledger-backed profile access with a refresh-on-success cache
pub struct RemoteProfileStore {
    client: Arc<dyn LedgerClient>,
    signer: Arc<dyn TransactionSigner>,
    cache: DashMap<ProfileId, Profile>,
}

impl std::fmt::Debug for RemoteProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteProfileStore")
            .field("cached_profiles", &self.cache.len())
            .finish()
    }
}

impl RemoteProfileStore {
    pub fn new(client: Arc<dyn LedgerClient>, signer: Arc<dyn TransactionSigner>) -> Self {
        Self {
            client,
            signer,
            cache: DashMap::new(),
        }
    }

    // ------------------------------------------------------------------
    // Transaction builders
    // ------------------------------------------------------------------

    /// Build an add-link mutation
    ///
    /// Only the label and URL shape are checked here. Capacity and label
    /// uniqueness are the caller's job; if skipped, the contract rejects
    /// the transaction.
    pub fn add_link(
        profile_id: &ProfileId,
        label: &str,
        url: &str,
    ) -> Result<Transaction, ValidationError> {
        validate_label(label)?;
        validate_link_url(url)?;
        Ok(Transaction::AddLink {
            profile_id: profile_id.clone(),
            label: label.to_string(),
            url: url.to_string(),
        })
    }

    pub fn remove_link(profile_id: &ProfileId, label: &str) -> Transaction {
        Transaction::RemoveLink {
            profile_id: profile_id.clone(),
            label: label.to_string(),
        }
    }

    pub fn update_profile(profile_id: &ProfileId, update: ProfileUpdate) -> Transaction {
        Transaction::UpdateProfile {
            profile_id: profile_id.clone(),
            update,
        }
    }

    pub fn create_profile(profile: NewProfile) -> Transaction {
        Transaction::CreateProfile { profile }
    }

    pub fn register_username(
        registry_id: &ObjectId,
        base_username: &str,
        slug: &str,
        profile_id: &ProfileId,
    ) -> Transaction {
        Transaction::RegisterUsername {
            registry_id: registry_id.clone(),
            base_username: base_username.to_string(),
            slug: slug.to_string(),
            profile_id: profile_id.clone(),
        }
    }

    pub fn track_click(statistics_id: &ObjectId, label: &str) -> Transaction {
        Transaction::TrackClick {
            statistics_id: statistics_id.clone(),
            label: label.to_string(),
        }
    }

    pub fn create_statistics(profile_id: &ProfileId) -> Transaction {
        Transaction::CreateStatistics {
            profile_id: profile_id.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Fetch and decode a profile
    ///
    /// Not-found, transport failures and shape mismatches all yield `None`;
    /// the latter two are logged.
    pub async fn get_profile(
        client: &dyn LedgerClient,
        profile_id: &ProfileId,
    ) -> Option<Profile> {
        let object = match client.get_object(profile_id).await {
            Ok(Some(object)) => object,
            Ok(None) => {
                debug!(%profile_id, "Profile not found");
                return None;
            }
            Err(e) => {
                warn!(%profile_id, error = %e, "Failed to fetch profile");
                return None;
            }
        };

        match Profile::from_object(profile_id.clone(), object) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(%profile_id, error = %e, "Profile object does not match expected shape");
                None
            }
        }
    }

    /// Ids of the profiles owned by `owner`; empty on failure
    pub async fn get_user_profiles(
        client: &dyn LedgerClient,
        owner: &Address,
    ) -> Vec<ProfileId> {
        match client.owned_objects(owner, PROFILE_TYPE).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(%owner, error = %e, "Failed to list owned profiles");
                Vec::new()
            }
        }
    }

    /// Cached profile, without touching the ledger
    pub fn cached(&self, profile_id: &ProfileId) -> Option<Profile> {
        self.cache.get(profile_id).map(|p| p.clone())
    }

    /// Cached profile, fetched on first use
    pub async fn profile(&self, profile_id: &ProfileId) -> Option<Profile> {
        match self.cached(profile_id) {
            Some(profile) => Some(profile),
            None => self.refresh_profile(profile_id).await,
        }
    }

    /// Re-fetch a profile and replace the cached copy
    ///
    /// A failed fetch evicts the cache entry.
    pub async fn refresh_profile(&self, profile_id: &ProfileId) -> Option<Profile> {
        match Self::get_profile(self.client.as_ref(), profile_id).await {
            Some(profile) => {
                self.cache.insert(profile_id.clone(), profile.clone());
                Some(profile)
            }
            None => {
                self.cache.remove(profile_id);
                None
            }
        }
    }

    /// Load every profile owned by `owner`
    pub async fn user_profiles(&self, owner: &Address) -> Vec<Profile> {
        let mut profiles = Vec::new();
        for id in Self::get_user_profiles(self.client.as_ref(), owner).await {
            if let Some(profile) = self.refresh_profile(&id).await {
                profiles.push(profile);
            }
        }
        profiles
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Hand a transaction to the signer and wait for execution
    ///
    /// No retry is attempted.
    pub async fn submit(&self, tx: Transaction) -> Result<TxDigest, StoreError> {
        let kind = tx.kind();
        match self.signer.sign_and_execute(tx).await {
            Ok(digest) => {
                info!(%kind, %digest, "Transaction executed");
                Ok(digest)
            }
            Err(e) => {
                warn!(%kind, error = %e, "Transaction failed");
                Err(e.into())
            }
        }
    }

    /// Submit, then refresh the profile the transaction touched
    pub async fn submit_and_refresh(
        &self,
        tx: Transaction,
    ) -> Result<Option<Profile>, StoreError> {
        let profile_id = tx.profile_id().cloned();
        self.submit(tx).await?;
        match profile_id {
            Some(id) => Ok(self.refresh_profile(&id).await),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkdeck_core::{InMemoryLedger, LedgerError};

    fn store_with(ledger: Arc<InMemoryLedger>) -> RemoteProfileStore {
        RemoteProfileStore::new(ledger.clone(), ledger)
    }

    #[test]
    fn test_add_link_validates_shape_only() {
        let id = ProfileId::new("0x1");
        assert!(RemoteProfileStore::add_link(&id, "Blog", "https://blog.example").is_ok());
        assert!(RemoteProfileStore::add_link(&id, "Home", "/u/alice").is_ok());
        assert_eq!(
            RemoteProfileStore::add_link(&id, "", "https://x.com"),
            Err(ValidationError::EmptyLabel)
        );
        assert!(matches!(
            RemoteProfileStore::add_link(&id, "Bad", "mailto:a@b.c"),
            Err(ValidationError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_get_profile_handles_missing_and_corrupt() {
        let ledger = Arc::new(InMemoryLedger::new());
        let missing = ProfileId::new("0xmissing");
        assert!(RemoteProfileStore::get_profile(ledger.as_ref(), &missing).await.is_none());

        let corrupt = ProfileId::new("0xcorrupt");
        ledger.put_raw_object(corrupt.clone(), serde_json::json!({ "owner": 7 }));
        assert!(RemoteProfileStore::get_profile(ledger.as_ref(), &corrupt).await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_replaces_cache_after_success() {
        let ledger = Arc::new(InMemoryLedger::new());
        let id = ledger.insert_profile(Profile::new("0x1", "0xowner", "alice", "main"));
        let store = store_with(ledger.clone());

        let before = store.profile(&id).await.unwrap();
        assert!(before.links.is_empty());

        let tx = RemoteProfileStore::add_link(&id, "X", "https://x.com").unwrap();
        let after = store.submit_and_refresh(tx).await.unwrap().unwrap();
        assert!(after.links.contains("X"));
        assert_eq!(store.cached(&id), Some(after));
    }

    #[tokio::test]
    async fn test_failed_submit_leaves_cache_alone() {
        let ledger = Arc::new(InMemoryLedger::new());
        let id = ledger.insert_profile(Profile::new("0x1", "0xowner", "alice", "main"));
        let store = store_with(ledger.clone());
        store.profile(&id).await.unwrap();

        ledger.fail_next(
            linkdeck_core::TransactionKind::AddLink,
            LedgerError::SigningRejected("user".into()),
        );
        let tx = RemoteProfileStore::add_link(&id, "X", "https://x.com").unwrap();
        assert!(store.submit_and_refresh(tx).await.is_err());
        assert!(store.cached(&id).unwrap().links.is_empty());
    }

    #[tokio::test]
    async fn test_user_profiles() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.insert_profile(Profile::new("0x1", "0xowner", "alice", "main"));
        ledger.insert_profile(Profile::new("0x2", "0xowner", "alice", "work"));
        ledger.insert_profile(Profile::new("0x3", "0xother", "bob", "main"));
        let store = store_with(ledger);

        let profiles = store.user_profiles(&Address::new("0xowner")).await;
        let slugs: Vec<_> = profiles.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["main", "work"]);
    }
}
