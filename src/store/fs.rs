//! Filesystem storage backend.
//!
//! Keys are slash-separated and mapped to paths under a base directory.
//! Parent directories are created lazily on first write and memoized so
//! repeated writes into the same directory skip the syscall.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashSet;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use super::{FilesStore, StatInfo, StoreError, hex_encode};

/// Read buffer size for streaming checksums.
const CHECKSUM_BUF_SIZE: usize = 8192;

/// Stores objects as plain files under a base directory.
#[derive(Debug)]
pub struct FsFilesStore {
    basedir: PathBuf,
    created_dirs: DashSet<PathBuf>,
}

impl FsFilesStore {
    /// Creates a store rooted at `basedir`. The directory itself is created
    /// lazily on first persist.
    #[must_use]
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        Self {
            basedir: basedir.into(),
            created_dirs: DashSet::new(),
        }
    }

    /// Returns the base directory.
    #[must_use]
    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    /// Maps a slash-separated key to its filesystem path.
    fn filesystem_path(&self, key: &str) -> PathBuf {
        let mut path = self.basedir.clone();
        for comp in key.split('/') {
            path.push(comp);
        }
        path
    }

    /// Ensures `dir` exists, skipping the syscall when it was already
    /// created through this store.
    async fn ensure_dir(&self, dir: &Path) -> Result<(), StoreError> {
        if self.created_dirs.contains(dir) {
            return Ok(());
        }
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| StoreError::io(dir, e))?;
        self.created_dirs.insert(dir.to_path_buf());
        Ok(())
    }
}

#[async_trait]
impl FilesStore for FsFilesStore {
    #[instrument(level = "debug", skip(self, data, _meta), fields(bytes = data.len()))]
    async fn persist_file(
        &self,
        key: &str,
        data: &[u8],
        _meta: Option<&HashMap<String, String>>,
    ) -> Result<(), StoreError> {
        let path = self.filesystem_path(key);
        if let Some(parent) = path.parent() {
            self.ensure_dir(parent).await?;
        }
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        debug!(path = %path.display(), "persisted object");
        Ok(())
    }

    async fn stat_file(&self, key: &str) -> Result<Option<StatInfo>, StoreError> {
        let path = self.filesystem_path(key);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        let last_modified = metadata.modified().ok();

        let checksum = checksum_file(path).await?;

        Ok(Some(StatInfo {
            checksum: Some(checksum),
            last_modified,
        }))
    }
}

/// Streams a file through SHA-256 on the blocking pool.
async fn checksum_file(path: PathBuf) -> Result<String, StoreError> {
    let task_path = path.clone();
    tokio::task::spawn_blocking(move || {
        let mut file =
            std::fs::File::open(&task_path).map_err(|e| StoreError::io(&task_path, e))?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; CHECKSUM_BUF_SIZE];
        loop {
            let n = file.read(&mut buf).map_err(|e| StoreError::io(&task_path, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex_encode(&hasher.finalize()))
    })
    .await
    .map_err(|_| StoreError::ChecksumTask { path })?
}
