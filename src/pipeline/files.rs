//! Freshness and persistence policy for file downloads.
//!
//! [`FilesPolicy`] decides whether an existing stored copy is fresh enough
//! to skip the network, drives the download-then-store flow for everything
//! else, and writes the result descriptors back onto items. Deployments
//! with different item shapes or key layouts implement [`MediaPolicy`]
//! themselves.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use url::Url;

use super::MediaError;
use super::media::JobId;
use crate::config::{ConfigError, MediaSettings};
use crate::fetch::{FetchError, FetchResponse, FileRequest};
use crate::item::{FileInfo, FileStatus, MediaItem};
use crate::stats::StatsSink;
use crate::store::{FilesStore, hex_encode, sha256_hex, store_for_uri};

/// Key prefix under which full-size files are stored.
const KEY_PREFIX: &str = "full";

/// Longest URL extension carried over into storage keys.
const MAX_EXT_LEN: usize = 5;

/// Verdict of the freshness check for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaDecision {
    /// A stored copy is fresh; use it without fetching.
    Uptodate(FileInfo),
    /// Fetch the resource; the status says whether the store had no record
    /// ([`FileStatus::New`]) or a stale one ([`FileStatus::Expired`]).
    Download(FileStatus),
}

/// Policy hooks invoked by the coordination core.
///
/// The core owns dedup and fan-out; everything domain-shaped (what counts
/// as a request, where bytes go, how freshness is judged) lives here.
#[async_trait]
pub trait MediaPolicy: Send + Sync {
    /// Extracts the resource requests referenced by an item, in order.
    fn get_media_requests(&self, item: &dyn MediaItem) -> Vec<FileRequest>;

    /// Deterministic storage key for a URL; doubles as the dedup
    /// fingerprint.
    fn file_path(&self, url: &str) -> String;

    /// Decides whether a request can be satisfied from the store without a
    /// fetch.
    async fn media_to_download(&self, request: &FileRequest, job: &JobId) -> MediaDecision;

    /// Validates and persists a completed fetch.
    ///
    /// # Errors
    ///
    /// Returns the classified [`MediaError`] for non-success statuses,
    /// empty bodies and persistence failures.
    async fn media_downloaded(
        &self,
        response: FetchResponse,
        request: &FileRequest,
        status: FileStatus,
        job: &JobId,
    ) -> Result<FileInfo, MediaError>;

    /// Classifies an upstream fetch failure. Nothing is persisted.
    fn media_failed(&self, error: &FetchError, request: &FileRequest, job: &JobId) -> MediaError;

    /// Writes the successful outcomes onto the item, preserving input
    /// order.
    fn item_completed(
        &self,
        results: &[Result<FileInfo, MediaError>],
        item: &mut dyn MediaItem,
        job: &JobId,
    );
}

/// The concrete file-download policy.
pub struct FilesPolicy {
    store: Arc<dyn FilesStore>,
    stats: Arc<dyn StatsSink>,
    expires: Duration,
    urls_field: String,
    result_field: String,
}

impl FilesPolicy {
    /// Builds the policy from settings, resolving the storage backend once.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the store URI is missing, malformed or
    /// names an unknown scheme.
    pub fn from_settings(
        settings: &MediaSettings,
        stats: Arc<dyn StatsSink>,
    ) -> Result<Self, ConfigError> {
        let store = store_for_uri(settings)?;
        Ok(Self::new(store, stats, settings))
    }

    /// Builds the policy around an already-constructed store.
    #[must_use]
    pub fn new(
        store: Arc<dyn FilesStore>,
        stats: Arc<dyn StatsSink>,
        settings: &MediaSettings,
    ) -> Self {
        Self {
            store,
            stats,
            expires: Duration::from_secs(settings.expires_days * 24 * 60 * 60),
            urls_field: settings.files_urls_field.clone(),
            result_field: settings.files_result_field.clone(),
        }
    }

    /// Returns the storage backend this policy persists through.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn FilesStore> {
        &self.store
    }

    fn inc_status(&self, status: FileStatus, job: &JobId) {
        self.stats.increment("file_count", job);
        self.stats
            .increment(&format!("file_status_count/{}", status.as_str()), job);
    }
}

#[async_trait]
impl MediaPolicy for FilesPolicy {
    fn get_media_requests(&self, item: &dyn MediaItem) -> Vec<FileRequest> {
        let Some(value) = item.get_field(&self.urls_field) else {
            return Vec::new();
        };
        let Some(urls) = value.as_array() else {
            warn!(field = %self.urls_field, "urls field is not an array; no media requests");
            return Vec::new();
        };
        urls.iter()
            .filter_map(|u| match u.as_str() {
                Some(url) => Some(FileRequest::new(url)),
                None => {
                    warn!(field = %self.urls_field, "skipping non-string entry in urls field");
                    None
                }
            })
            .collect()
    }

    fn file_path(&self, url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let guid = hex_encode(&hasher.finalize());
        match url_extension(url) {
            Some(ext) => format!("{KEY_PREFIX}/{guid}.{ext}"),
            None => format!("{KEY_PREFIX}/{guid}"),
        }
    }

    async fn media_to_download(&self, request: &FileRequest, job: &JobId) -> MediaDecision {
        let path = self.file_path(&request.url);

        let stat = match self.store.stat_file(&path).await {
            Ok(Some(stat)) => stat,
            Ok(None) => return MediaDecision::Download(FileStatus::New),
            Err(error) => {
                // A failing stat must not block the pipeline; fall back to
                // a fresh download.
                warn!(url = %request.url, error = %error, "stat failed; forcing download");
                return MediaDecision::Download(FileStatus::New);
            }
        };

        let Some(last_modified) = stat.last_modified else {
            return MediaDecision::Download(FileStatus::New);
        };

        let age = SystemTime::now()
            .duration_since(last_modified)
            .unwrap_or_default();
        if age > self.expires {
            debug!(url = %request.url, age_days = age.as_secs() / 86_400, "stored copy expired");
            return MediaDecision::Download(FileStatus::Expired);
        }

        debug!(
            url = %request.url,
            referer = request.referer.as_deref().unwrap_or("-"),
            "file up to date"
        );
        self.inc_status(FileStatus::Uptodate, job);
        MediaDecision::Uptodate(FileInfo {
            url: request.url.clone(),
            path,
            checksum: stat.checksum,
            status: FileStatus::Uptodate,
        })
    }

    async fn media_downloaded(
        &self,
        response: FetchResponse,
        request: &FileRequest,
        status: FileStatus,
        job: &JobId,
    ) -> Result<FileInfo, MediaError> {
        let referer = request.referer.as_deref().unwrap_or("-");

        if !response.is_success() {
            warn!(
                url = %request.url,
                status = response.status,
                referer,
                "error downloading file"
            );
            return Err(MediaError::Download {
                url: request.url.clone(),
                status: response.status,
            });
        }

        if response.body.is_empty() {
            warn!(url = %request.url, referer, "empty file body");
            return Err(MediaError::EmptyContent {
                url: request.url.clone(),
            });
        }

        let path = self.file_path(&request.url);
        let checksum = sha256_hex(&response.body);

        let meta = HashMap::from([("checksum".to_string(), checksum.clone())]);
        self.store
            .persist_file(&path, &response.body, Some(&meta))
            .await
            .map_err(|e| MediaError::Persistence {
                url: request.url.clone(),
                message: e.to_string(),
            })?;

        debug!(url = %request.url, path = %path, referer, "file downloaded");
        self.inc_status(status, job);

        Ok(FileInfo {
            url: request.url.clone(),
            path,
            checksum: Some(checksum),
            status,
        })
    }

    fn media_failed(&self, error: &FetchError, request: &FileRequest, _job: &JobId) -> MediaError {
        warn!(
            url = %request.url,
            referer = request.referer.as_deref().unwrap_or("-"),
            error = %error,
            "error fetching file"
        );
        MediaError::UpstreamFetch {
            url: request.url.clone(),
            message: error.to_string(),
        }
    }

    fn item_completed(
        &self,
        results: &[Result<FileInfo, MediaError>],
        item: &mut dyn MediaItem,
        _job: &JobId,
    ) {
        let ok: Vec<&FileInfo> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        match serde_json::to_value(&ok) {
            Ok(value) => item.set_field(&self.result_field, value),
            Err(error) => warn!(error = %error, "failed to serialize file descriptors"),
        }
    }
}

/// Extracts a plausible media extension from a URL path.
///
/// Only short, purely alphanumeric extensions are kept; anything else (no
/// dot, query-string noise, over-long suffixes) yields `None` and the key
/// is stored without an extension.
fn url_extension(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last_segment = parsed.path_segments()?.last()?;
    let (_, ext) = last_segment.rsplit_once('.')?;
    if ext.is_empty()
        || ext.len() > MAX_EXT_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
