//! Error types for linkdeck-linkcheck

use thiserror::Error;

/// Errors raised while setting up a checker or relay
///
/// Probe failures are not errors; they are reported in the check result.
#[derive(Debug, Error)]
pub enum LinkCheckError {
    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Invalid relay URL: {0}")]
    InvalidRelay(String),
}

impl From<reqwest::Error> for LinkCheckError {
    fn from(err: reqwest::Error) -> Self {
        LinkCheckError::Client(err.to_string())
    }
}

/// Why a single probe attempt failed
#[derive(Debug, Error)]
pub(crate) enum ProbeError {
    #[error("timeout")]
    Timeout,

    #[error("{0}")]
    Http(#[from] reqwest::Error),
}
