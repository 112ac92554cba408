//! Remote object-store backend speaking the S3 REST surface over HTTP.
//!
//! The store URI `s3://bucket/prefix/` names the bucket and key prefix; the
//! service endpoint comes from [`S3Settings::endpoint`] so any
//! S3-compatible service works. Stat maps to a HEAD request (ETag as
//! checksum, `Last-Modified` as timestamp) and persist maps to a PUT with a
//! fixed Cache-Control header and an optional canned ACL.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CACHE_CONTROL, ETAG, LAST_MODIFIED};
use reqwest::{Client, ClientBuilder, StatusCode};
use tracing::{debug, instrument};

use super::{FilesStore, StatInfo, StoreError};
use crate::config::{ConfigError, S3Settings};
use crate::fetch::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};

/// Canned ACL request header.
const ACL_HEADER: &str = "x-amz-acl";

/// Prefix for user metadata headers attached to uploads.
const META_HEADER_PREFIX: &str = "x-amz-meta-";

/// Stores objects in an S3-compatible service via plain HTTP.
#[derive(Debug)]
pub struct S3FilesStore {
    client: Client,
    /// `<endpoint>/<bucket>`, no trailing slash.
    bucket_url: String,
    /// Key prefix inside the bucket, possibly empty.
    prefix: String,
    access_token: Option<String>,
    acl: Option<String>,
    cache_control: String,
}

impl S3FilesStore {
    /// Creates a store for `rest` (the URI after `s3://`, i.e.
    /// `bucket/prefix/`).
    ///
    /// The prefix is prepended to keys verbatim, so it must end with `/`
    /// to act as a directory; `s3://bucket/media` yields keys like
    /// `mediafull/<hash>`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidStoreUri`] when the bucket is missing
    /// or no endpoint is configured.
    #[allow(clippy::expect_used)]
    pub fn new(rest: &str, settings: &S3Settings) -> Result<Self, ConfigError> {
        let uri = format!("s3://{rest}");
        let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(ConfigError::InvalidStoreUri {
                uri,
                reason: "missing bucket name",
            });
        }
        let endpoint = settings
            .endpoint
            .as_deref()
            .ok_or(ConfigError::InvalidStoreUri {
                uri,
                reason: "s3 store requires S3Settings::endpoint",
            })?;

        let client = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client with static configuration");

        Ok(Self {
            client,
            bucket_url: format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
            prefix: prefix.to_string(),
            access_token: settings.access_token.clone(),
            acl: settings.acl.clone(),
            cache_control: settings
                .cache_control
                .clone()
                .unwrap_or_else(|| crate::config::DEFAULT_CACHE_CONTROL.to_string()),
        })
    }

    /// Full object URL for a storage key.
    fn object_url(&self, key: &str) -> String {
        format!("{}/{}{}", self.bucket_url, self.prefix, key)
    }

    fn object_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }
}

#[async_trait]
impl FilesStore for S3FilesStore {
    #[instrument(level = "debug", skip(self, data, meta), fields(bytes = data.len()))]
    async fn persist_file(
        &self,
        key: &str,
        data: &[u8],
        meta: Option<&HashMap<String, String>>,
    ) -> Result<(), StoreError> {
        let object_key = self.object_key(key);
        let mut builder = self
            .client
            .put(self.object_url(key))
            .header(CACHE_CONTROL, &self.cache_control)
            .body(data.to_vec());
        if let Some(acl) = &self.acl {
            builder = builder.header(ACL_HEADER, acl);
        }
        if let Some(meta) = meta {
            for (name, value) in meta {
                builder = builder.header(format!("{META_HEADER_PREFIX}{name}"), value);
            }
        }

        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| StoreError::remote(&object_key, e))?;

        if !response.status().is_success() {
            return Err(StoreError::unexpected_status(
                &object_key,
                response.status().as_u16(),
            ));
        }
        debug!(key = %object_key, "uploaded object");
        Ok(())
    }

    async fn stat_file(&self, key: &str) -> Result<Option<StatInfo>, StoreError> {
        let object_key = self.object_key(key);
        let response = self
            .authorize(self.client.head(self.object_url(key)))
            .send()
            .await
            .map_err(|e| StoreError::remote(&object_key, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let checksum = response
                    .headers()
                    .get(ETAG)
                    .and_then(|v| v.to_str().ok())
                    .map(|etag| etag.trim_matches('"').to_string());
                let last_modified = response
                    .headers()
                    .get(LAST_MODIFIED)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_last_modified);
                Ok(Some(StatInfo {
                    checksum,
                    last_modified,
                }))
            }
            status => Err(StoreError::unexpected_status(&object_key, status.as_u16())),
        }
    }
}

/// Parses an RFC 7231 `Last-Modified` header value.
fn parse_last_modified(value: &str) -> Option<SystemTime> {
    httpdate::parse_http_date(value).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn settings_with_endpoint(endpoint: &str) -> S3Settings {
        S3Settings {
            endpoint: Some(endpoint.to_string()),
            ..S3Settings::default()
        }
    }

    #[test]
    fn test_new_requires_endpoint() {
        let result = S3FilesStore::new("bucket/files/", &S3Settings::default());
        assert!(matches!(result, Err(ConfigError::InvalidStoreUri { .. })));
    }

    #[test]
    fn test_new_requires_bucket() {
        let result = S3FilesStore::new("", &settings_with_endpoint("http://localhost:9000"));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidStoreUri {
                reason: "missing bucket name",
                ..
            })
        ));
    }

    #[test]
    fn test_object_url_joins_bucket_prefix_and_key() {
        let store = S3FilesStore::new(
            "media/files/",
            &settings_with_endpoint("http://localhost:9000/"),
        )
        .unwrap();
        assert_eq!(
            store.object_url("full/abc.pdf"),
            "http://localhost:9000/media/files/full/abc.pdf"
        );
    }

    #[test]
    fn test_bucket_without_prefix() {
        let store =
            S3FilesStore::new("media", &settings_with_endpoint("http://localhost:9000")).unwrap();
        assert_eq!(
            store.object_url("full/abc.pdf"),
            "http://localhost:9000/media/full/abc.pdf"
        );
    }

    #[test]
    fn test_prefix_without_trailing_slash_concatenates_verbatim() {
        let store = S3FilesStore::new(
            "bucket/media",
            &settings_with_endpoint("http://localhost:9000"),
        )
        .unwrap();
        assert_eq!(
            store.object_url("full/abc.pdf"),
            "http://localhost:9000/bucket/mediafull/abc.pdf"
        );
    }

    #[test]
    fn test_parse_last_modified() {
        let parsed = parse_last_modified("Sun, 06 Nov 1994 08:49:37 GMT");
        assert!(parsed.is_some());
        assert!(parse_last_modified("not a date").is_none());
    }
}
