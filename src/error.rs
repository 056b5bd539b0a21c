//! Error types for shellcache
//!
//! All modules use `ShellCacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for shellcache operations
pub type ShellCacheResult<T> = Result<T, ShellCacheError>;

/// All errors that can occur in shellcache
#[derive(Error, Debug)]
pub enum ShellCacheError {
    // Network errors
    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Fetch for {key} returned status {status}")]
    FetchStatus { key: String, status: u16 },

    // Store errors
    #[error("Store unavailable during {operation} on partition {partition}: {reason}")]
    Store {
        operation: String,
        partition: String,
        reason: String,
    },

    #[error("Invalid partition name: {0:?}")]
    InvalidPartitionName(String),

    // Lifecycle errors
    #[error("Activation failed, all partitions were torn down: {source}")]
    ActivationFailed {
        #[source]
        source: Box<ShellCacheError>,
    },

    #[error("Staging is incomplete, missing core shell resource {0}")]
    StagingIncomplete(String),

    #[error("Staging was prepared for a different manifest")]
    StagingMismatch,

    #[error("Cannot handle {event} while worker is {state}")]
    InvalidTransition { state: String, event: String },

    #[error("Worker is not active")]
    NotActive,

    #[error("Unknown message command: {0}")]
    UnknownCommand(String),

    // Manifest errors
    #[error("Invalid resource manifest: {reason}")]
    ManifestInvalid { reason: String },

    #[error("No resource manifest configured")]
    ManifestNotConfigured,

    #[error("Invalid origin {url}: {reason}")]
    InvalidOrigin { url: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl ShellCacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a store failure for an operation on a partition
    pub fn store(
        operation: impl Into<String>,
        partition: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::Store {
            operation: operation.into(),
            partition: partition.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a fetch failure
    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a manifest validation error
    pub fn manifest(reason: impl Into<String>) -> Self {
        Self::ManifestInvalid {
            reason: reason.into(),
        }
    }

    /// Check if error is retryable on the next install cycle
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch { .. } | Self::FetchStatus { .. } | Self::Store { .. } => true,
            Self::ActivationFailed { .. } | Self::StagingIncomplete(_) | Self::StagingMismatch => {
                true
            }
            _ => false,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ManifestNotConfigured => {
                Some("Pass --manifest <path> or set manifest.path in the config file")
            }
            Self::Fetch { .. } => Some("Check that the origin is reachable: origin.url"),
            Self::ActivationFailed { .. } => Some("Run: shellcache upgrade"),
            Self::StagingIncomplete(_) | Self::StagingMismatch => Some("Run: shellcache install"),
            Self::NotActive => Some("Run: shellcache upgrade"),
            Self::UnknownCommand(_) => Some("Valid commands: skipWaiting, downloadOffline"),
            _ => None,
        }
    }
}
