//! Seams to the outside world
//!
//! ## Key Traits
//!
//! - [`LedgerClient`]: object reads
//! - [`TransactionSigner`]: signing and execution of mutations
//! - [`LinkProbe`]: URL reachability checks

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::profile::{Address, ObjectId};
use crate::transaction::{Transaction, TxDigest};

/// Read access to ledger objects
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fetch an object's fields as JSON
    ///
    /// Returns `Ok(None)` when the object does not exist.
    async fn get_object(&self, id: &ObjectId) -> Result<Option<serde_json::Value>, LedgerError>;

    /// List objects of the given type owned by `owner`
    async fn owned_objects(
        &self,
        owner: &Address,
        type_tag: &str,
    ) -> Result<Vec<ObjectId>, LedgerError>;
}

/// External signing and execution service
///
/// Once a transaction has been handed over it cannot be retracted.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    async fn sign_and_execute(&self, tx: Transaction) -> Result<TxDigest, LedgerError>;
}

/// Outcome of a reachability probe, reduced to what the library needs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub reachable: bool,
    /// The URL as it should be stored (scheme added if it was missing)
    pub normalized_url: String,
    pub title: Option<String>,
    pub favicon: Option<String>,
    pub error: Option<String>,
}

/// Checks whether a URL is worth accepting into the library
#[async_trait]
pub trait LinkProbe: Send + Sync {
    /// Never fails; problems are reported through [`ProbeReport::error`]
    async fn probe(&self, url: &str) -> ProbeReport;
}
