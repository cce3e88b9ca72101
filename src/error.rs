//! Error types for cluster discovery
//!
//! Errors are split by how the reconciliation loop treats them: configuration
//! misuse aborts the instance, everything else raised inside a poll is logged
//! and the poll is retried on the next interval.

use thiserror::Error;

/// Result alias for a single discovery poll
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Structural configuration errors. These indicate a caller bug and are fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A structurally required field is absent
    #[error("missing required configuration field `{field}`")]
    MissingField { field: &'static str },

    /// The poll interval must be a positive number of milliseconds
    #[error("poll_interval_ms must be greater than zero")]
    InvalidPollInterval,

    /// The configuration file could not be read or parsed
    #[error("failed to load configuration: {0}")]
    Load(String),
}

/// A required field is present but empty or ill-formed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid value for configuration field `{field}`")]
pub struct ValidationError {
    pub field: &'static str,
}

/// Failures of the external directory service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// The request never produced a response
    #[error("directory transport error: {0}")]
    Transport(String),

    /// The request exceeded the configured timeout
    #[error("directory request timed out")]
    Timeout,

    /// The directory answered with a non-success status
    #[error("directory returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response did not have the expected shape
    #[error("unrecognized response shape: {0}")]
    UnrecognizedShape(String),
}

/// Everything that can go wrong while computing the candidate members
#[derive(Error, Debug, Clone)]
pub enum DiscoveryError {
    /// Fatal misuse, see [`ConfigError`]
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Soft configuration failure
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Directory transport or response failure
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// A configured service name is not a valid pattern
    #[error("invalid service pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A configured service name matched no service in the cluster
    #[error("no service in the cluster matched `{pattern}`")]
    Resolution { pattern: String },

    /// The task description batch was malformed
    #[error("failed to extract member addresses: {0}")]
    Extraction(String),
}

impl DiscoveryError {
    /// Whether the error must abort the discovery instance instead of
    /// being retried on the next poll.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DiscoveryError::Config(_))
    }
}
