//! Error types for the store module.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem error while reading or writing an object.
    #[error("IO error on {}: {source}", path.display())]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Network-level error talking to a remote object store.
    #[error("object store request failed for {key}: {source}")]
    Remote {
        /// The object key being accessed.
        key: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The remote object store answered with an unexpected HTTP status.
    #[error("object store returned HTTP {status} for {key}")]
    UnexpectedStatus {
        /// The object key being accessed.
        key: String,
        /// The HTTP status code.
        status: u16,
    },

    /// A blocking checksum task failed to complete.
    #[error("checksum task failed for {}", path.display())]
    ChecksumTask {
        /// The path being checksummed.
        path: PathBuf,
    },
}

impl StoreError {
    /// Creates a filesystem IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a remote transport error.
    pub fn remote(key: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Remote {
            key: key.into(),
            source,
        }
    }

    /// Creates an unexpected status error.
    pub fn unexpected_status(key: impl Into<String>, status: u16) -> Self {
        Self::UnexpectedStatus {
            key: key.into(),
            status,
        }
    }
}
