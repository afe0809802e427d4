//! Ledger mutations
//!
//! A [`Transaction`] is built locally and handed to a
//! [`TransactionSigner`](crate::TransactionSigner). Nothing in Linkdeck
//! inspects a transaction after submission beyond its success or failure.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::profile::{Address, ObjectId, ProfileId};

/// Digest returned by the signer for an executed transaction
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[display("{_0}")]
pub struct TxDigest(String);

impl TxDigest {
    pub fn new(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Metadata changes for an existing profile; `None` leaves a field as is
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub bio: Option<String>,
    pub avatar_cid: Option<String>,
    pub theme: Option<String>,
}

/// Fields for a freshly created profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProfile {
    pub owner: Address,
    pub base_username: String,
    pub slug: String,
    pub bio: String,
    pub avatar_cid: String,
    pub theme: String,
    pub is_category: bool,
    pub parent_slug: Option<String>,
}

impl NewProfile {
    pub fn new(
        owner: impl Into<Address>,
        base_username: impl Into<String>,
        slug: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            base_username: base_username.into(),
            slug: slug.into(),
            bio: String::new(),
            avatar_cid: String::new(),
            theme: String::new(),
            is_category: false,
            parent_slug: None,
        }
    }

    /// Mark this profile as a category nested under `parent_slug`
    pub fn as_category_of(mut self, parent_slug: impl Into<String>) -> Self {
        self.is_category = true;
        self.parent_slug = Some(parent_slug.into());
        self
    }
}

/// A mutation to be signed and executed on the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum Transaction {
    AddLink {
        profile_id: ProfileId,
        label: String,
        url: String,
    },
    RemoveLink {
        profile_id: ProfileId,
        label: String,
    },
    UpdateProfile {
        profile_id: ProfileId,
        update: ProfileUpdate,
    },
    CreateProfile {
        profile: NewProfile,
    },
    RegisterUsername {
        registry_id: ObjectId,
        base_username: String,
        slug: String,
        profile_id: ProfileId,
    },
    TrackClick {
        statistics_id: ObjectId,
        label: String,
    },
    CreateStatistics {
        profile_id: ProfileId,
    },
}

/// Discriminant of a [`Transaction`], used for logging and fault injection
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    AddLink,
    RemoveLink,
    UpdateProfile,
    CreateProfile,
    RegisterUsername,
    TrackClick,
    CreateStatistics,
}

impl Transaction {
    pub fn kind(&self) -> TransactionKind {
        match self {
            Transaction::AddLink { .. } => TransactionKind::AddLink,
            Transaction::RemoveLink { .. } => TransactionKind::RemoveLink,
            Transaction::UpdateProfile { .. } => TransactionKind::UpdateProfile,
            Transaction::CreateProfile { .. } => TransactionKind::CreateProfile,
            Transaction::RegisterUsername { .. } => TransactionKind::RegisterUsername,
            Transaction::TrackClick { .. } => TransactionKind::TrackClick,
            Transaction::CreateStatistics { .. } => TransactionKind::CreateStatistics,
        }
    }

    /// The profile this transaction mutates, if any
    pub fn profile_id(&self) -> Option<&ProfileId> {
        match self {
            Transaction::AddLink { profile_id, .. }
            | Transaction::RemoveLink { profile_id, .. }
            | Transaction::UpdateProfile { profile_id, .. }
            | Transaction::RegisterUsername { profile_id, .. }
            | Transaction::CreateStatistics { profile_id } => Some(profile_id),
            Transaction::CreateProfile { .. } | Transaction::TrackClick { .. } => None,
        }
    }
}
