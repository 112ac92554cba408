//! Media download pipeline: dedup coordination plus the file policy.
//!
//! Split the way it runs: [`MediaPipeline`] is the coordination core
//! (at-most-one in-flight fetch per fingerprint per job, result fan-out,
//! job lifecycle), [`MediaPolicy`]/[`FilesPolicy`] is the domain layer
//! (request extraction, freshness, persistence, item write-back), and
//! [`MediaError`] is the per-resource failure taxonomy shared between them.

mod error;
mod files;
mod media;

pub use error::MediaError;
pub use files::{FilesPolicy, MediaDecision, MediaPolicy};
pub use media::{Fingerprint, JobId, MediaPipeline};

use crate::item::FileInfo;

/// One entry of a pipeline outcome: the descriptor on success, the
/// classified error otherwise.
pub type FileInfoOrError = Result<FileInfo, MediaError>;
