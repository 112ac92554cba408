//! External fetch capability consumed by the pipeline.
//!
//! The pipeline never performs HTTP itself; it hands a [`FileRequest`] to a
//! [`Fetcher`] and receives a fully resolved [`FetchResponse`]. Retry,
//! redirects and politeness are the fetcher's concern; the pipeline makes
//! exactly one attempt per resource.
//!
//! [`HttpFetcher`] is the provided reqwest-backed implementation.
//!
//! # Example
//!
//! ```no_run
//! use media_pipeline::fetch::{FileRequest, Fetcher, HttpFetcher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = HttpFetcher::new();
//! let request = FileRequest::new("https://example.com/paper.pdf");
//! let response = fetcher.fetch(&request).await?;
//! println!("{} bytes, status {}", response.body.len(), response.status);
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;

pub use client::HttpFetcher;
pub use constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
pub use error::FetchError;

use async_trait::async_trait;

/// An immutable request for one resource URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRequest {
    /// The resource URL to retrieve.
    pub url: String,
    /// URL of the page that referenced this resource, if known.
    pub referer: Option<String>,
}

impl FileRequest {
    /// Creates a request with no referer.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            referer: None,
        }
    }

    /// Creates a request carrying the referring page URL.
    #[must_use]
    pub fn with_referer(url: impl Into<String>, referer: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            referer: Some(referer.into()),
        }
    }
}

/// A resolved response for a [`FileRequest`].
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Final URL the body was retrieved from.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response body bytes.
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// Whether the status code is a success (2xx).
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Capability that retrieves a URL and returns the resolved response.
///
/// Implementations are shared across concurrent fetch tasks and must be
/// cheap to call repeatedly (connection pooling etc. lives behind this
/// trait).
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Retrieves `request.url` once.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] for network-level failures. Non-success HTTP
    /// statuses are NOT errors here; they come back as a [`FetchResponse`]
    /// and are classified by the pipeline's policy layer.
    async fn fetch(&self, request: &FileRequest) -> Result<FetchResponse, FetchError>;
}
