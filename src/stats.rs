//! Metrics sink for file counts and per-status/per-error counters.
//!
//! The pipeline reports through a [`StatsSink`] trait object so deployments
//! can wire in their own collector. [`MemoryStats`] is the default and keeps
//! counters in a concurrent map, scoped per job; [`NoopStats`] discards
//! everything.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::pipeline::JobId;

/// Counter sink consumed by the pipeline.
///
/// Counters are flat strings such as `file_count`,
/// `file_status_count/uptodate` or `file_error_count/download-error`,
/// always scoped to the reporting job.
pub trait StatsSink: Send + Sync {
    /// Increments `counter` for `job` by one.
    fn increment(&self, counter: &str, job: &JobId);
}

/// In-memory stats collector keyed by `(job, counter)`.
#[derive(Debug, Default)]
pub struct MemoryStats {
    counters: DashMap<(JobId, String), Arc<AtomicU64>>,
}

impl MemoryStats {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current value of `counter` for `job` (zero if never hit).
    #[must_use]
    pub fn get(&self, counter: &str, job: &JobId) -> u64 {
        self.counters
            .get(&(job.clone(), counter.to_string()))
            .map_or(0, |c| c.load(Ordering::SeqCst))
    }
}

impl StatsSink for MemoryStats {
    fn increment(&self, counter: &str, job: &JobId) {
        self.counters
            .entry((job.clone(), counter.to_string()))
            .or_default()
            .fetch_add(1, Ordering::SeqCst);
    }
}

/// Sink that drops all counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStats;

impl StatsSink for NoopStats {
    fn increment(&self, _counter: &str, _job: &JobId) {}
}
