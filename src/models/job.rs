//! Crawl job record persisted per job identifier.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Film;

/// Lifecycle status of a crawl job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Completed and failed jobs never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted state of one crawl job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrawlResult {
    pub job_id: String,
    pub status: JobStatus,

    /// Films in partition order, then source order
    #[serde(default)]
    pub films: Vec<Film>,

    /// Set on the terminal write only
    #[serde(default)]
    pub crawled_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub error: Option<String>,
}

impl CrawlResult {
    fn new(job_id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            job_id: job_id.into(),
            status,
            films: Vec::new(),
            crawled_at: None,
            error: None,
        }
    }

    pub fn pending(job_id: impl Into<String>) -> Self {
        Self::new(job_id, JobStatus::Pending)
    }

    pub fn running(job_id: impl Into<String>) -> Self {
        Self::new(job_id, JobStatus::Running)
    }

    pub fn completed(
        job_id: impl Into<String>,
        films: Vec<Film>,
        error: Option<String>,
        crawled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            films,
            error,
            crawled_at: Some(crawled_at),
            ..Self::new(job_id, JobStatus::Completed)
        }
    }

    pub fn failed(
        job_id: impl Into<String>,
        error: impl Into<String>,
        crawled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            error: Some(error.into()),
            crawled_at: Some(crawled_at),
            ..Self::new(job_id, JobStatus::Failed)
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Check that a job identifier is safe to use as a storage key.
pub fn validate_job_id(job_id: &str) -> Result<()> {
    if job_id.is_empty() {
        return Err(AppError::validation("job_id", "must not be empty"));
    }
    if job_id.len() > 128 {
        return Err(AppError::validation("job_id", "longer than 128 characters"));
    }
    if job_id.starts_with('.') {
        return Err(AppError::validation("job_id", "must not start with '.'"));
    }
    if let Some(c) = job_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(AppError::validation(
            "job_id",
            format!("invalid character {c:?}"),
        ));
    }
    Ok(())
}
