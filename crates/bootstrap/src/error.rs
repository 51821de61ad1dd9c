//! Error types for the bootstrap checker.

use thiserror::Error;

/// Errors returned by an issue tracker backend.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors that abort a reconciliation pass.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// The tracker could not be queried or updated.
    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),

    /// More than one open ticket carries the canonical title.
    #[error("found {} open tickets titled '{title}': {numbers:?} - close the duplicates", numbers.len())]
    DuplicateTickets { title: String, numbers: Vec<u64> },

    /// The most recent ticket comment is not a `<sequence>:<message>` entry.
    #[error("ticket #{ticket} has a malformed status comment: {body:?}")]
    CorruptStatusLog { ticket: u64, body: String },

    /// A credential install step failed.
    #[error("credential step '{step}' failed ({status}): {output}")]
    CredentialStep {
        step: &'static str,
        status: String,
        output: String,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Remediation state could not be encoded or decoded.
    #[error("state file error: {0}")]
    State(#[from] serde_json::Error),
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, BootstrapError>;
