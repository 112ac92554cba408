//! Pluggable storage backends behind a uniform stat/persist capability.
//!
//! Backends are selected once, at pipeline construction, by the store URI
//! scheme through a static registry:
//!
//! - `file://...` or a bare path → [`FsFilesStore`]
//! - `s3://bucket/prefix/` → [`S3FilesStore`] (any S3-compatible endpoint)
//!
//! All blocking I/O inside backends is offloaded (tokio's blocking pool or
//! async filesystem calls), so callers can await these operations from the
//! coordination core without stalling it.

mod error;
mod fs;
mod s3;

pub use error::StoreError;
pub use fs::FsFilesStore;
pub use s3::S3FilesStore;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::config::{ConfigError, MediaSettings, split_store_uri};

/// Metadata reported by a backend for an existing stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatInfo {
    /// Content checksum, when the backend can provide one.
    pub checksum: Option<String>,
    /// When the object was last written.
    pub last_modified: Option<SystemTime>,
}

/// Uniform storage capability implemented by all backends.
#[async_trait]
pub trait FilesStore: Send + Sync {
    /// Persists `data` under `key`, overwriting any previous object.
    ///
    /// `meta` carries caller metadata the backend may attach to the object
    /// (ignored by backends without a metadata concept).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    async fn persist_file(
        &self,
        key: &str,
        data: &[u8],
        meta: Option<&HashMap<String, String>>,
    ) -> Result<(), StoreError>;

    /// Reports checksum and mtime for the object under `key`.
    ///
    /// Returns `Ok(None)` when no such object exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup itself fails.
    async fn stat_file(&self, key: &str) -> Result<Option<StatInfo>, StoreError>;
}

/// Computes the hex SHA-256 checksum of a byte buffer.
///
/// ```
/// use media_pipeline::store::sha256_hex;
///
/// assert_eq!(
///     sha256_hex(b"file content to hash"),
///     "d16a10b5af664011e1dabd89fd5f27473da43dbdba05cd0c0fa2d5ba7a70c1b2"
/// );
/// ```
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex_encode(&hasher.finalize())
}

/// Lowercase hex rendering of a digest.
pub(crate) fn hex_encode(digest: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        // Writing to a String cannot fail.
        let _ = write!(out, "{byte:02x}");
    }
    out
}

type StoreCtor = fn(&str, &MediaSettings) -> Result<Arc<dyn FilesStore>, ConfigError>;

/// Static scheme → constructor registry, resolved once at startup.
static STORE_SCHEMES: &[(&str, StoreCtor)] = &[
    ("", make_fs_store),
    ("file", make_fs_store),
    ("s3", make_s3_store),
];

fn make_fs_store(rest: &str, _settings: &MediaSettings) -> Result<Arc<dyn FilesStore>, ConfigError> {
    Ok(Arc::new(FsFilesStore::new(rest)))
}

fn make_s3_store(rest: &str, settings: &MediaSettings) -> Result<Arc<dyn FilesStore>, ConfigError> {
    Ok(Arc::new(S3FilesStore::new(rest, &settings.s3)?))
}

/// Resolves the backend for the configured store URI.
///
/// # Errors
///
/// Returns [`ConfigError::UnsupportedScheme`] for schemes with no
/// registered backend and propagates backend construction failures.
pub fn store_for_uri(settings: &MediaSettings) -> Result<Arc<dyn FilesStore>, ConfigError> {
    let (scheme, rest) = split_store_uri(&settings.store_uri);
    let ctor = STORE_SCHEMES
        .iter()
        .find(|(s, _)| *s == scheme)
        .map(|(_, ctor)| ctor)
        .ok_or_else(|| ConfigError::UnsupportedScheme {
            scheme: scheme.to_string(),
            uri: settings.store_uri.clone(),
        })?;
    ctor(rest, settings)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_vector() {
        // RFC-published SHA-256 of the empty string.
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode(&[0x00, 0xff, 0x0a]), "00ff0a");
    }

    #[test]
    fn test_store_for_uri_selects_fs_for_bare_path() {
        let settings = MediaSettings::with_store_uri("/tmp/files-store");
        assert!(store_for_uri(&settings).is_ok());
    }

    #[test]
    fn test_store_for_uri_selects_fs_for_file_scheme() {
        let settings = MediaSettings::with_store_uri("file:///tmp/files-store");
        assert!(store_for_uri(&settings).is_ok());
    }

    #[test]
    fn test_store_for_uri_rejects_unknown_scheme() {
        let settings = MediaSettings::with_store_uri("ftp://host/dir");
        let result = store_for_uri(&settings);
        assert!(matches!(
            result,
            Err(ConfigError::UnsupportedScheme { scheme, .. }) if scheme == "ftp"
        ));
    }

    #[test]
    fn test_store_for_uri_s3_requires_endpoint() {
        let settings = MediaSettings::with_store_uri("s3://bucket/prefix/");
        let result = store_for_uri(&settings);
        assert!(matches!(result, Err(ConfigError::InvalidStoreUri { .. })));
    }
}
