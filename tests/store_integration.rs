//! Integration tests for the storage backends.
//!
//! The S3-compatible backend is exercised against a mock HTTP server; the
//! filesystem backend against a temp directory through the public trait.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use media_pipeline::{FilesStore, FsFilesStore, MediaSettings, S3FilesStore, StoreError};
use media_pipeline::config::S3Settings;
use media_pipeline::store::{sha256_hex, store_for_uri};
use tempfile::TempDir;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Routes store logs through the test harness; enable with `RUST_LOG`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn s3_settings(server: &MockServer) -> S3Settings {
    init_tracing();
    S3Settings {
        endpoint: Some(server.uri()),
        ..S3Settings::default()
    }
}

#[tokio::test]
async fn test_s3_stat_parses_etag_and_last_modified() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/bucket/media/full/doc.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"abc123etag\"")
                .insert_header("Last-Modified", "Wed, 01 Jan 2025 00:00:00 GMT"),
        )
        .mount(&server)
        .await;

    let store = S3FilesStore::new("bucket/media/", &s3_settings(&server)).unwrap();
    let stat = store.stat_file("full/doc.pdf").await.unwrap().unwrap();

    assert_eq!(stat.checksum.as_deref(), Some("abc123etag"));
    let modified = stat.last_modified.unwrap();
    assert!(modified < SystemTime::now());
    assert!(modified > SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000));
}

#[tokio::test]
async fn test_s3_stat_missing_object_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/bucket/media/full/nope.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = S3FilesStore::new("bucket/media/", &s3_settings(&server)).unwrap();
    assert!(store.stat_file("full/nope.pdf").await.unwrap().is_none());
}

#[tokio::test]
async fn test_s3_stat_server_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/bucket/media/full/x.pdf"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = S3FilesStore::new("bucket/media/", &s3_settings(&server)).unwrap();
    let result = store.stat_file("full/x.pdf").await;
    assert!(matches!(
        result,
        Err(StoreError::UnexpectedStatus { status: 500, .. })
    ));
}

#[tokio::test]
async fn test_s3_persist_puts_with_cache_control_and_acl() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/bucket/media/full/up.pdf"))
        .and(header("cache-control", "max-age=172800"))
        .and(header("x-amz-acl", "private"))
        .and(body_string("upload me"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let settings = S3Settings {
        acl: Some("private".to_string()),
        ..s3_settings(&server)
    };
    let store = S3FilesStore::new("bucket/media/", &settings).unwrap();
    store
        .persist_file("full/up.pdf", b"upload me", None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_s3_persist_attaches_metadata_and_token() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/bucket/media/full/meta.bin"))
        .and(header("authorization", "Bearer sekrit"))
        .and(header("x-amz-meta-checksum", "cafe"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let settings = S3Settings {
        access_token: Some("sekrit".to_string()),
        ..s3_settings(&server)
    };
    let store = S3FilesStore::new("bucket/media/", &settings).unwrap();
    let meta = HashMap::from([("checksum".to_string(), "cafe".to_string())]);
    store
        .persist_file("full/meta.bin", b"x", Some(&meta))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_s3_persist_rejected_upload_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/bucket/media/full/denied.bin"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let store = S3FilesStore::new("bucket/media/", &s3_settings(&server)).unwrap();
    let result = store.persist_file("full/denied.bin", b"x", None).await;
    assert!(matches!(
        result,
        Err(StoreError::UnexpectedStatus { status: 403, .. })
    ));
}

#[tokio::test]
async fn test_registry_resolves_s3_scheme_with_endpoint() {
    let server = MockServer::start().await;
    let mut settings = MediaSettings::with_store_uri("s3://bucket/media/");
    settings.s3 = s3_settings(&server);

    Mock::given(method("HEAD"))
        .and(path("/bucket/media/full/any.bin"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = store_for_uri(&settings).unwrap();
    assert!(store.stat_file("full/any.bin").await.unwrap().is_none());
}

#[tokio::test]
async fn test_fs_store_persist_stat_through_trait() {
    init_tracing();
    let temp = TempDir::new().unwrap();
    let store: Box<dyn FilesStore> = Box::new(FsFilesStore::new(temp.path()));

    store
        .persist_file("full/deep/nested.bin", b"nested bytes", None)
        .await
        .unwrap();
    let stat = store
        .stat_file("full/deep/nested.bin")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        stat.checksum.as_deref(),
        Some(sha256_hex(b"nested bytes").as_str())
    );
    assert!(stat.last_modified.is_some());
}
