//! Media Pipeline Library
//!
//! This library is the media/resource download subsystem of a web-crawling
//! framework: given items that reference resource URLs, it fetches each
//! resource at most once per job, persists it through a pluggable storage
//! backend and attaches a descriptor of the result back onto the item.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`pipeline`] - Coordination core (dedup, fan-out, job lifecycle) and
//!   the file freshness/persistence policy
//! - [`store`] - Storage backends (filesystem, S3-compatible) behind a
//!   uniform stat/persist capability
//! - [`fetch`] - External fetch capability consumed by the pipeline
//! - [`item`] - Item field-access abstraction and result descriptors
//! - [`config`] - Pipeline settings
//! - [`stats`] - Metrics sink for status and error counters

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod fetch;
pub mod item;
pub mod pipeline;
pub mod stats;
pub mod store;

// Re-export commonly used types
pub use config::{ConfigError, DEFAULT_CONCURRENCY, DEFAULT_EXPIRES_DAYS, MediaSettings, S3Settings};
pub use fetch::{FetchError, FetchResponse, Fetcher, FileRequest, HttpFetcher};
pub use item::{FileInfo, FileStatus, Item, MediaItem};
pub use pipeline::{
    FileInfoOrError, FilesPolicy, Fingerprint, JobId, MediaDecision, MediaError, MediaPipeline,
    MediaPolicy,
};
pub use stats::{MemoryStats, NoopStats, StatsSink};
pub use store::{FilesStore, FsFilesStore, S3FilesStore, StatInfo, StoreError, store_for_uri};
