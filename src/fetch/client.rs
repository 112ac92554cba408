//! Reqwest-backed fetch capability.
//!
//! One shared client per pipeline, reused across all fetches for connection
//! pooling. Bodies are buffered fully in memory: downstream the policy layer
//! checksums and persists the whole buffer, and the dedup core hands the
//! same bytes to every waiter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::REFERER;
use reqwest::{Client, ClientBuilder};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::{FetchError, FetchResponse, FileRequest, Fetcher};

/// HTTP fetcher with connection pooling and configurable timeouts.
///
/// This is the default [`Fetcher`] used when the surrounding crawl engine
/// does not supply its own fetch capability.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    /// Creates a fetcher with default timeouts (30s connect, 5min read).
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a fetcher with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Wraps an externally configured reqwest client.
    #[must_use]
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self, request), fields(url = %request.url))]
    async fn fetch(&self, request: &FileRequest) -> Result<FetchResponse, FetchError> {
        let url =
            Url::parse(&request.url).map_err(|_| FetchError::invalid_url(&request.url))?;

        let mut builder = self.client.get(url);
        if let Some(referer) = &request.referer {
            builder = builder.header(REFERER, referer.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&request.url, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(&request.url, e))?
            .to_vec();

        debug!(status, bytes = body.len(), "fetch complete");

        Ok(FetchResponse {
            url: final_url,
            status,
            body,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_returns_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF".to_vec()))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new();
        let request = FileRequest::new(format!("{}/a.pdf", server.uri()));
        let response = fetcher.fetch(&request).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"%PDF");
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn test_fetch_propagates_referer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img.png"))
            .and(header("referer", "http://site/page.html"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new();
        let request =
            FileRequest::with_referer(format!("{}/img.png", server.uri()), "http://site/page.html");
        let response = fetcher.fetch(&request).await.unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_fetch_non_success_status_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new();
        let request = FileRequest::new(format!("{}/missing", server.uri()));
        let response = fetcher.fetch(&request).await.unwrap();
        assert_eq!(response.status, 404);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let fetcher = HttpFetcher::new();
        let request = FileRequest::new("not a url");
        let result = fetcher.fetch(&request).await;
        assert!(matches!(result, Err(FetchError::InvalidUrl { .. })));
    }
}
