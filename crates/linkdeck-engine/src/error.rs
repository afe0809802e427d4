//! Error types for the linkdeck engine

use std::path::PathBuf;

use linkdeck_core::{LedgerError, ProfileId, ValidationError};
use thiserror::Error;

/// Errors surfaced by the remote profile store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The ledger or signer failed
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Input rejected before submission
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The profile could not be loaded
    #[error("Profile not found: {0}")]
    ProfileNotFound(ProfileId),
}

/// Decoding a drag transfer buffer failed
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Malformed drag payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Drag payload has an empty link id")]
    EmptyLinkId,
}

/// Errors raised by the move saga
#[derive(Debug, Error)]
pub enum SagaError {
    /// Nothing changed on either profile
    #[error("Adding to target failed: {0}")]
    AddFailed(#[source] StoreError),

    /// The link now exists in both profiles
    #[error("Link now exists in both profiles: {0}")]
    RemoveFailed(#[source] StoreError),

    /// The journal could not be written
    #[error("Storage error: {0}")]
    Storage(#[from] linkdeck_storage::StorageError),

    #[error("Unknown pending move: {0}")]
    UnknownMove(String),
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors raised while assembling the engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] linkdeck_storage::StorageError),

    #[error("Link checker error: {0}")]
    LinkCheck(#[from] linkdeck_linkcheck::LinkCheckError),
}

/// Result type for engine setup
pub type EngineResult<T> = Result<T, EngineError>;
