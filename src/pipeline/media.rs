//! Coordination core: per-job dedup bookkeeping and result fan-out.
//!
//! The pipeline guarantees at most one in-flight fetch per fingerprint per
//! job and delivers the settled result to every concurrent requester of
//! that fingerprint. All map bookkeeping happens in short critical sections
//! under one mutex that is never held across an await; the spawned fetch
//! task owns the single settlement step (write `completed`, clear
//! `in_flight`, drain waiters), so no other code path mutates the maps
//! mid-flight.
//!
//! Per-fingerprint lifecycle within a job:
//!
//! ```text
//! Unseen -> (Cached | InFlight) -> Settled -> removed with the job
//! ```
//!
//! Cancellation is not supported: a started fetch runs to completion. If
//! its job closes first, the close hook resolves every pending waiter with
//! [`MediaError::JobClosed`] and the late settlement is dropped.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Semaphore, oneshot};
use tracing::{debug, info, instrument, warn};

use super::files::{FilesPolicy, MediaDecision, MediaPolicy};
use super::{FileInfoOrError, MediaError};
use crate::config::{ConfigError, MediaSettings};
use crate::fetch::{Fetcher, FileRequest};
use crate::item::MediaItem;
use crate::stats::StatsSink;

/// Identifier of one crawl job, scoping the dedup maps and freshness cache.
///
/// Jobs are named explicitly by the caller; the pipeline never keys state
/// by object identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    /// Returns the job name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Dedup key for one resource URL: the storage key it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Returns the underlying storage key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Fingerprint {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Per-job coordination state.
///
/// Invariants: a fingerprint lives in at most one of `in_flight` and
/// `completed`; every `waiters` entry corresponds to an `in_flight`
/// fingerprint.
#[derive(Default)]
struct JobContext {
    in_flight: HashMap<Fingerprint, FileRequest>,
    completed: HashMap<Fingerprint, FileInfoOrError>,
    waiters: HashMap<Fingerprint, Vec<oneshot::Sender<FileInfoOrError>>>,
}

/// Media download pipeline.
///
/// Owns the job registry and wires the policy layer, the external fetch
/// capability and the stats sink together.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use media_pipeline::config::MediaSettings;
/// use media_pipeline::fetch::HttpFetcher;
/// use media_pipeline::item::{Item, MediaItem};
/// use media_pipeline::pipeline::{JobId, MediaPipeline};
/// use media_pipeline::stats::MemoryStats;
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let settings = MediaSettings::with_store_uri("/var/lib/crawl/files");
/// let pipeline = MediaPipeline::from_settings(
///     settings,
///     Arc::new(HttpFetcher::new()),
///     Arc::new(MemoryStats::new()),
/// )?;
///
/// let job = JobId::from("crawl-2026-08");
/// pipeline.on_job_open(&job);
///
/// let mut item = Item::new();
/// item.set_field("file_urls", json!(["https://example.com/report.pdf"]));
/// pipeline.process_item(&mut item, &job).await;
///
/// pipeline.on_job_close(&job);
/// # Ok(())
/// # }
/// ```
pub struct MediaPipeline {
    policy: Arc<dyn MediaPolicy>,
    fetcher: Arc<dyn Fetcher>,
    stats: Arc<dyn StatsSink>,
    fetch_permits: Arc<Semaphore>,
    jobs: Arc<Mutex<HashMap<JobId, JobContext>>>,
}

impl MediaPipeline {
    /// Builds a pipeline with the default file policy resolved from
    /// settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when settings are invalid; construction
    /// failures disable the pipeline entirely and are logged once here.
    pub fn from_settings(
        settings: MediaSettings,
        fetcher: Arc<dyn Fetcher>,
        stats: Arc<dyn StatsSink>,
    ) -> Result<Self, ConfigError> {
        let policy = settings
            .validate()
            .and_then(|()| FilesPolicy::from_settings(&settings, Arc::clone(&stats)))
            .map_err(|error| {
                tracing::error!(error = %error, "media pipeline disabled");
                error
            })?;
        Self::with_policy(Arc::new(policy), fetcher, stats, settings.concurrency)
    }

    /// Builds a pipeline around a custom policy implementation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConcurrency`] for an out-of-range
    /// `concurrency`.
    pub fn with_policy(
        policy: Arc<dyn MediaPolicy>,
        fetcher: Arc<dyn Fetcher>,
        stats: Arc<dyn StatsSink>,
        concurrency: usize,
    ) -> Result<Self, ConfigError> {
        if concurrency == 0 || concurrency > 100 {
            return Err(ConfigError::InvalidConcurrency { value: concurrency });
        }
        Ok(Self {
            policy,
            fetcher,
            stats,
            fetch_permits: Arc::new(Semaphore::new(concurrency)),
            jobs: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Opens a job, creating its coordination state.
    #[instrument(level = "debug", skip(self))]
    pub fn on_job_open(&self, job: &JobId) {
        let mut jobs = lock_jobs(&self.jobs);
        jobs.entry(job.clone()).or_default();
        debug!(%job, "job opened");
    }

    /// Closes a job, discarding its state.
    ///
    /// Waiters still pending for in-flight fetches are resolved with
    /// [`MediaError::JobClosed`] rather than left hanging; the fetches
    /// themselves run to completion and their late results are dropped.
    #[instrument(level = "debug", skip(self))]
    pub fn on_job_close(&self, job: &JobId) {
        let ctx = lock_jobs(&self.jobs).remove(job);
        let Some(mut ctx) = ctx else {
            return;
        };

        let mut orphaned = 0usize;
        for (fingerprint, senders) in ctx.waiters.drain() {
            let url = ctx
                .in_flight
                .get(&fingerprint)
                .map_or_else(|| fingerprint.as_str().to_string(), |r| r.url.clone());
            for tx in senders {
                orphaned += 1;
                let _ = tx.send(Err(MediaError::JobClosed { url: url.clone() }));
            }
        }
        if orphaned > 0 {
            warn!(%job, orphaned, "job closed with pending downloads");
        }
        info!(%job, completed = ctx.completed.len(), "job closed");
    }

    /// Processes one item: extracts its resource requests, downloads or
    /// reuses each, writes the descriptors back and returns the full
    /// outcome list, one entry per requested URL in request order.
    #[instrument(level = "debug", skip(self, item))]
    pub async fn process_item(
        &self,
        item: &mut dyn MediaItem,
        job: &JobId,
    ) -> Vec<FileInfoOrError> {
        let requests = self.policy.get_media_requests(item);
        debug!(%job, requests = requests.len(), "processing item media");

        let pending = requests.into_iter().map(|r| self.enqueue(r, job));
        let results = futures_util::future::join_all(pending).await;

        self.policy.item_completed(&results, item, job);
        results
    }

    /// Resolves one request: freshness short-circuit, then dedup against
    /// the job's completed cache and in-flight set, starting a fetch only
    /// for the first requester of a fingerprint.
    pub async fn enqueue(&self, request: FileRequest, job: &JobId) -> FileInfoOrError {
        // Freshness check happens before any bookkeeping; a fresh hit never
        // touches the maps.
        let status = match self.policy.media_to_download(&request, job).await {
            MediaDecision::Uptodate(info) => return Ok(info),
            MediaDecision::Download(status) => status,
        };

        let fingerprint = Fingerprint::from(self.policy.file_path(&request.url));

        let rx = {
            let mut jobs = lock_jobs(&self.jobs);
            let Some(ctx) = jobs.get_mut(job) else {
                warn!(%job, url = %request.url, "enqueue on unopened job");
                return Err(MediaError::JobClosed { url: request.url });
            };

            if let Some(result) = ctx.completed.get(&fingerprint) {
                return result.clone();
            }

            let (tx, rx) = oneshot::channel();
            ctx.waiters.entry(fingerprint.clone()).or_default().push(tx);

            if !ctx.in_flight.contains_key(&fingerprint) {
                ctx.in_flight.insert(fingerprint.clone(), request.clone());
                self.start_fetch(request.clone(), fingerprint, status, job.clone());
            } else {
                debug!(url = %request.url, "joining in-flight fetch");
            }
            rx
        };

        match rx.await {
            Ok(result) => result,
            // Sender dropped without settling; only reachable if the job
            // context vanished outside on_job_close.
            Err(_) => Err(MediaError::JobClosed { url: request.url }),
        }
    }

    /// Spawns the fetch task for the first requester of a fingerprint.
    ///
    /// The task performs the single settlement step for its fingerprint:
    /// it is the only writer of `completed` and the only remover of
    /// `in_flight` entries.
    fn start_fetch(
        &self,
        request: FileRequest,
        fingerprint: Fingerprint,
        status: crate::item::FileStatus,
        job: JobId,
    ) {
        let policy = Arc::clone(&self.policy);
        let fetcher = Arc::clone(&self.fetcher);
        let stats = Arc::clone(&self.stats);
        let permits = Arc::clone(&self.fetch_permits);
        let jobs = Arc::clone(&self.jobs);

        tokio::spawn(async move {
            let result: FileInfoOrError = match permits.acquire_owned().await {
                Ok(_permit) => match fetcher.fetch(&request).await {
                    Ok(response) => {
                        policy
                            .media_downloaded(response, &request, status, &job)
                            .await
                    }
                    Err(error) => Err(policy.media_failed(&error, &request, &job)),
                },
                // The semaphore lives as long as the pipeline; a closed
                // semaphore means shutdown, settle waiters instead of
                // hanging them.
                Err(_) => Err(MediaError::JobClosed {
                    url: request.url.clone(),
                }),
            };

            if let Err(error) = &result {
                stats.increment(&format!("file_error_count/{}", error.kind()), &job);
            }

            let senders = {
                let mut jobs = lock_jobs(&jobs);
                match jobs.get_mut(&job) {
                    Some(ctx) => {
                        ctx.in_flight.remove(&fingerprint);
                        ctx.completed.insert(fingerprint.clone(), result.clone());
                        ctx.waiters.remove(&fingerprint).unwrap_or_default()
                    }
                    // Job closed mid-fetch; waiters were resolved by the
                    // close hook, drop the late result.
                    None => Vec::new(),
                }
            };

            debug!(
                fingerprint = fingerprint.as_str(),
                waiters = senders.len(),
                ok = result.is_ok(),
                "fetch settled"
            );
            for tx in senders {
                let _ = tx.send(result.clone());
            }
        });
    }
}

/// Locks the job registry, recovering the guard if a panicking task
/// poisoned it.
fn lock_jobs<'a>(
    jobs: &'a Mutex<HashMap<JobId, JobContext>>,
) -> MutexGuard<'a, HashMap<JobId, JobContext>> {
    match jobs.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
