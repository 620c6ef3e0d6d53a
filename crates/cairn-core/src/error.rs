//! Error types for the cairn build cache.
//!
//! A cache miss is never an error: lookups return `Option::None` instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Remote tier
    #[error("Network error: {0}")]
    Network(String),

    // Local tier
    #[error("Storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Wire and key validation
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // Fingerprinting
    #[error("Invalid task input: {0}")]
    InvalidInput(String),

    // Configuration
    #[error("Configuration error: {0}")]
    Config(String),

    // Plumbing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap an I/O failure that happened at `path` inside the local store.
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Storage {
            path: path.into(),
            source,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_))
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage { .. })
    }

    /// True for malformed keys and corrupt entry bytes.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Protocol(_) | Error::InvalidKey(_))
    }

    /// Disk full while writing a local entry.
    pub fn is_disk_full(&self) -> bool {
        match self {
            Error::Storage { source, .. } | Error::Io(source) => {
                source.kind() == std::io::ErrorKind::StorageFull
            }
            _ => false,
        }
    }

    /// Permission problems are configuration errors, not per-call failures.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Error::Storage { source, .. } | Error::Io(source) => {
                source.kind() == std::io::ErrorKind::PermissionDenied
            }
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
