//! Local filesystem job store.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── {job_id}.json                   # Latest state of the job
//! └── {job_id}.json.{pid}.{n}.tmp     # In-flight write, renamed when complete
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{CrawlResult, validate_job_id};
use crate::storage::JobStore;

/// Distinguishes temp files of concurrent writers within this process.
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalJobStore {
    root_dir: PathBuf,
}

impl LocalJobStore {
    /// Create a new store rooted at the given directory.
    ///
    /// The directory is created lazily on first write.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    fn job_key(job_id: &str) -> Result<String> {
        validate_job_id(job_id)?;
        Ok(format!("{job_id}.json"))
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .root_dir
            .join(format!("{key}.{}.{seq}.tmp", std::process::id()));

        let written: std::io::Result<()> = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::Io(e));
        }
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl JobStore for LocalJobStore {
    async fn put(&self, job_id: &str, result: &CrawlResult) -> Result<()> {
        let key = Self::job_key(job_id)?;
        self.write_json(&key, result).await?;
        log::debug!(
            "Saved job {} ({}) to {}",
            job_id,
            result.status,
            self.path(&key).display()
        );
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<CrawlResult> {
        let key = Self::job_key(job_id)?;
        self.read_json(&key)
            .await?
            .ok_or_else(|| AppError::NotFound(job_id.to_string()))
    }
}
