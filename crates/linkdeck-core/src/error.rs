//! Error types for Linkdeck

use thiserror::Error;

/// Errors reported by the ledger client or the signing service
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Transaction rejected by signer: {0}")]
    SigningRejected(String),

    #[error("Move abort in {function}: {code}")]
    ContractAbort { function: String, code: String },

    #[error("Malformed ledger response: {0}")]
    Malformed(String),
}

impl LedgerError {
    /// Create a contract abort error
    pub fn abort(function: impl Into<String>, code: impl Into<String>) -> Self {
        Self::ContractAbort {
            function: function.into(),
            code: code.into(),
        }
    }
}

/// Input rejected before any mutation is attempted
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Label must not be empty")]
    EmptyLabel,

    #[error("Label must be at least {min} characters")]
    LabelTooShort { min: usize },

    #[error("URL must start with http://, https:// or /: {0}")]
    InvalidUrl(String),

    #[error("Profile has at most {max} links")]
    TooManyLinks { max: usize },

    #[error("Label already exists in target: {0}")]
    DuplicateLabel(String),
}
