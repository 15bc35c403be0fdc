//! Storage abstractions for job persistence.
//!
//! One document per job identifier:
//!
//! ```text
//! {data_dir}/
//! ├── 2f1c7f3e-....json     # CrawlResult for job 2f1c7f3e-...
//! └── 8a90b2d4-....json
//! ```
//!
//! Writes overwrite the previous document atomically, so a reader only ever
//! sees a complete record.

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::CrawlResult;

// Re-export for convenience
pub use local::LocalJobStore;

/// Trait for job state backends.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Store `result` under `job_id`, replacing any previous record.
    async fn put(&self, job_id: &str, result: &CrawlResult) -> Result<()>;

    /// Load the record for `job_id`.
    ///
    /// Fails with `AppError::NotFound` when nothing was stored.
    async fn get(&self, job_id: &str) -> Result<CrawlResult>;
}
