//! Error types for Booth.
//!
//! Errors are layered the same way the work is: provider calls classify their
//! failures into [`GenerateError`], the executor annotates them with the number
//! of attempts, and the lifecycle manager attaches the photo id before the
//! error reaches the caller as a [`BoothError`].

use crate::types::PhotoId;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for Booth operations.
#[derive(Error, Debug)]
pub enum BoothError {
    /// `capture` was called with no prompt text set.
    #[error("No prompt set: enter a prompt before capturing")]
    EmptyPrompt,

    /// `capture` was handed an image with no bytes.
    #[error("Captured image is empty")]
    EmptyImage,

    /// The photo id is not present in the durable store.
    #[error("Photo not found: {id}")]
    NotFound { id: PhotoId },

    /// No prompt history entry has this id.
    #[error("Prompt history entry not found: {id}")]
    HistoryEntryNotFound { id: String },

    #[error("Unknown preset '{name}'")]
    UnknownPreset { name: String },

    /// An operation was attempted before startup rehydration completed.
    #[error("Durable state has not been rehydrated yet")]
    NotRehydrated,

    /// Image or title generation failed after the executor gave up.
    #[error("Generation failed for photo {photo_id} after {attempts} attempt(s): {source}")]
    Generation {
        photo_id: PhotoId,
        attempts: u32,
        #[source]
        source: GenerateError,
    },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Durable store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl BoothError {
    /// The provider classification behind this error, if it came from a call.
    pub fn generate_error(&self) -> Option<&GenerateError> {
        match self {
            BoothError::Generation { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Classified failure of a single provider call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerateError {
    /// The selected provider needs a credential that was not supplied.
    #[error("{provider} API key is missing")]
    CredentialMissing { provider: String },

    /// The provider's safety filter rejected the request.
    #[error("Request blocked by provider: {reason}")]
    ContentBlocked { reason: String },

    /// The model answered but produced no usable output.
    #[error("Model produced no result: {reason}")]
    NoResult { reason: String },

    /// Network, overload, or "model still loading" failures worth retrying.
    #[error("{message}")]
    Transient {
        message: String,
        status_code: Option<u16>,
        /// Provider-supplied wait before the next attempt.
        retry_after: Option<Duration>,
    },

    /// The attempt did not finish within the executor's timeout.
    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Malformed request, auth failure, or unparseable response.
    #[error("{message}")]
    Fatal {
        message: String,
        status_code: Option<u16>,
    },
}

impl GenerateError {
    pub(crate) fn transient(message: impl Into<String>) -> Self {
        GenerateError::Transient {
            message: message.into(),
            status_code: None,
            retry_after: None,
        }
    }

    pub(crate) fn fatal(message: impl Into<String>) -> Self {
        GenerateError::Fatal {
            message: message.into(),
            status_code: None,
        }
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Durable store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem failure while reading or writing a record
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be serialized or deserialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored record exists but its contents are unusable
    #[error("Corrupt record {key}: {message}")]
    Corrupt { key: String, message: String },
}

/// Convenience type alias for Booth results.
pub type Result<T> = std::result::Result<T, BoothError>;

/// Convenience type alias for store results.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
