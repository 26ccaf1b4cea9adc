#![forbid(unsafe_code)]

//! Error type for store construction and snapshot persistence.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Construction | Initializer returned `Err` | `Store::try_create` returns the error |
//! | Storage I/O | Backend could not read or write | `persist`/`flush` return the error |
//! | Encode/decode | Snapshot not representable as JSON | `persist`/`flush` return the error |
//!
//! Panics raised by selectors or callbacks are not represented here: they
//! are programmer errors and unwind through the caller of the store
//! operation that triggered them.

use std::fmt;

/// Errors produced by the store and its collaborators.
#[derive(Debug)]
pub enum StoreError {
    /// The state initializer failed.
    Construction(String),
    /// A storage backend failed to read or write an entry.
    #[cfg(feature = "state-persistence")]
    Io {
        key: String,
        source: std::io::Error,
    },
    /// A snapshot could not be encoded.
    #[cfg(feature = "state-persistence")]
    Serialize {
        key: String,
        source: serde_json::Error,
    },
    /// Stored data could not be decoded into the state type.
    #[cfg(feature = "state-persistence")]
    Deserialize {
        key: String,
        source: serde_json::Error,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Construction(reason) => write!(f, "state initializer failed: {reason}"),
            #[cfg(feature = "state-persistence")]
            Self::Io { key, source } => write!(f, "storage I/O failed for '{key}': {source}"),
            #[cfg(feature = "state-persistence")]
            Self::Serialize { key, source } => {
                write!(f, "failed to encode snapshot '{key}': {source}")
            }
            #[cfg(feature = "state-persistence")]
            Self::Deserialize { key, source } => {
                write!(f, "failed to decode snapshot '{key}': {source}")
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Construction(_) => None,
            #[cfg(feature = "state-persistence")]
            Self::Io { source, .. } => Some(source),
            #[cfg(feature = "state-persistence")]
            Self::Serialize { source, .. } | Self::Deserialize { source, .. } => Some(source),
        }
    }
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
