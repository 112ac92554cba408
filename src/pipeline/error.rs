//! Error types for the pipeline module.
//!
//! Unlike the fetch/store errors, [`MediaError`] is `Clone`: one settlement
//! value per fingerprint fans out to every concurrent requester, so the
//! classified error flattens its sources into plain context strings.

use thiserror::Error;

/// Per-resource failure recorded in a pipeline outcome.
///
/// These never abort processing of sibling resources in the same item, nor
/// of other items; they surface only as `Err` entries in the outcome list
/// and as per-kind counters in the stats sink.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MediaError {
    /// The fetch completed with a non-success HTTP status.
    #[error("download error: HTTP {status} from {url}")]
    Download {
        /// The requested URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The fetch succeeded but the body was empty.
    #[error("empty content from {url}")]
    EmptyContent {
        /// The requested URL.
        url: String,
    },

    /// Checksumming or writing to the storage backend failed.
    #[error("persistence error for {url}: {message}")]
    Persistence {
        /// The requested URL.
        url: String,
        /// Rendered store error.
        message: String,
    },

    /// The external fetch capability itself failed (network level).
    #[error("upstream fetch failed for {url}: {message}")]
    UpstreamFetch {
        /// The requested URL.
        url: String,
        /// Rendered fetch error.
        message: String,
    },

    /// The job closed (or was never opened) while this request was pending.
    #[error("job closed while {url} was pending")]
    JobClosed {
        /// The requested URL.
        url: String,
    },
}

impl MediaError {
    /// Stable error-kind label used for per-kind stats counters.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Download { .. } => "download-error",
            Self::EmptyContent { .. } => "empty-content",
            Self::Persistence { .. } => "persistence-error",
            Self::UpstreamFetch { .. } => "upstream-error",
            Self::JobClosed { .. } => "job-closed",
        }
    }
}
