//! Pipeline configuration: store location, freshness window, item field names.
//!
//! Configuration problems abort pipeline construction entirely; they are
//! never reported per item. A pipeline with no store URI is a deployment
//! mistake, not a runtime condition.

use thiserror::Error;

/// Default freshness window in days before a stored object is re-fetched.
pub const DEFAULT_EXPIRES_DAYS: u64 = 90;

/// Default item field read for input URLs.
pub const DEFAULT_FILES_URLS_FIELD: &str = "file_urls";

/// Default item field written with result descriptors.
pub const DEFAULT_FILES_RESULT_FIELD: &str = "files";

/// Default bound on concurrently running fetches.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default Cache-Control header attached to uploads by the S3 store.
pub const DEFAULT_CACHE_CONTROL: &str = "max-age=172800";

/// Errors raised while constructing a pipeline from settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No store URI configured; the pipeline cannot persist anything.
    #[error("no store URI configured: set MediaSettings::store_uri")]
    MissingStoreUri,

    /// The store URI scheme has no registered backend.
    #[error("unsupported store URI scheme '{scheme}' in {uri}")]
    UnsupportedScheme {
        /// The unrecognized scheme.
        scheme: String,
        /// The full URI it was found in.
        uri: String,
    },

    /// The store URI is structurally invalid for its backend.
    #[error("invalid store URI {uri}: {reason}")]
    InvalidStoreUri {
        /// The offending URI.
        uri: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Settings for the remote object-store backend.
#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    /// Endpoint base URL for an S3-compatible service. Required when a
    /// `s3://` store URI is used.
    pub endpoint: Option<String>,
    /// Static bearer token attached to store requests, when the endpoint
    /// requires one.
    pub access_token: Option<String>,
    /// Canned ACL applied to uploads (`x-amz-acl`), e.g. `private`.
    pub acl: Option<String>,
    /// Cache-Control header attached to uploads.
    pub cache_control: Option<String>,
}

/// Settings for the media pipeline.
#[derive(Debug, Clone)]
pub struct MediaSettings {
    /// Store location: `file:///path`, `s3://bucket/prefix/`, or a bare
    /// filesystem path.
    pub store_uri: String,
    /// Freshness window in days; stored objects older than this are
    /// re-fetched.
    pub expires_days: u64,
    /// Item field holding the list of input URLs.
    pub files_urls_field: String,
    /// Item field the result descriptors are written to.
    pub files_result_field: String,
    /// Maximum number of concurrently running fetches.
    pub concurrency: usize,
    /// Remote object-store knobs.
    pub s3: S3Settings,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            store_uri: String::new(),
            expires_days: DEFAULT_EXPIRES_DAYS,
            files_urls_field: DEFAULT_FILES_URLS_FIELD.to_string(),
            files_result_field: DEFAULT_FILES_RESULT_FIELD.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            s3: S3Settings::default(),
        }
    }
}

impl MediaSettings {
    /// Creates settings with the given store URI and defaults elsewhere.
    #[must_use]
    pub fn with_store_uri(store_uri: impl Into<String>) -> Self {
        Self {
            store_uri: store_uri.into(),
            ..Self::default()
        }
    }

    /// Validates settings that must be correct before any work starts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingStoreUri`] for an empty store URI and
    /// [`ConfigError::InvalidConcurrency`] for an out-of-range concurrency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_uri.is_empty() {
            return Err(ConfigError::MissingStoreUri);
        }
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(ConfigError::InvalidConcurrency {
                value: self.concurrency,
            });
        }
        Ok(())
    }
}

/// Splits a store URI into `(scheme, rest)`.
///
/// Bare paths (no `://`) and absolute paths map to the empty scheme, which
/// the registry treats as the filesystem backend. This mirrors how crawl
/// deployments commonly point the store at a plain directory.
#[must_use]
pub fn split_store_uri(uri: &str) -> (&str, &str) {
    match uri.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("", uri),
    }
}
