// src/pipeline/crawl.rs

//! Crawl job orchestration.
//!
//! A job fans out one task per partition, joins them, folds the outcomes
//! into a single `CrawlResult` and persists it:
//!
//! ```text
//! running ──▶ [acquire 2010] [acquire 2011] ... [acquire 2015] ──▶ completed | failed
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::error::{AppError, Result};
use crate::models::{Config, CrawlResult, Film};
use crate::services::{AjaxSource, PartitionAcquirer, PartitionFetcher, RenderedFetcher};
use crate::storage::JobStore;

/// Outcome of one partition task.
pub type PartitionOutcome = (i32, Result<Vec<Film>>);

/// Runs crawl jobs across a fixed set of partitions.
pub struct JobOrchestrator {
    partitions: Vec<i32>,
    acquirer: Arc<PartitionAcquirer>,
    store: Arc<dyn JobStore>,
}

impl JobOrchestrator {
    pub fn new(
        partitions: Vec<i32>,
        acquirer: Arc<PartitionAcquirer>,
        store: Arc<dyn JobStore>,
    ) -> Self {
        Self {
            partitions,
            acquirer,
            store,
        }
    }

    /// Wire the HTTP source and the WebDriver fallback from configuration.
    pub fn from_config(config: &Config, store: Arc<dyn JobStore>) -> Result<Self> {
        let source = Arc::new(AjaxSource::from_config(&config.crawler)?);
        let fallback = Arc::new(RenderedFetcher::from_config(
            &config.fallback,
            &config.crawler.target_url,
        )?);
        let acquirer = PartitionAcquirer::new(PartitionFetcher::new(source, &config.crawler), fallback);

        Ok(Self::new(
            config.crawler.partitions.clone(),
            Arc::new(acquirer),
            store,
        ))
    }

    pub fn partitions(&self) -> &[i32] {
        &self.partitions
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Run one job to completion and persist its terminal state.
    ///
    /// Partition failures end up in the record's `error`; only a failing
    /// store write is returned as `Err`.
    pub async fn run(&self, job_id: &str) -> Result<CrawlResult> {
        log::info!("Starting crawl job {}", job_id);

        if let Err(e) = self.store.put(job_id, &CrawlResult::running(job_id)).await {
            log::error!("Could not mark job {} as running: {}", job_id, e);
            let failed = CrawlResult::failed(job_id, e.to_string(), Utc::now());
            if let Err(write_err) = self.store.put(job_id, &failed).await {
                log::error!("Could not record failure of job {}: {}", job_id, write_err);
            }
            return Err(e);
        }

        let result = match self.collect(job_id).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Crawl job {} failed unexpectedly: {}", job_id, e);
                CrawlResult::failed(job_id, e.to_string(), Utc::now())
            }
        };

        self.store.put(job_id, &result).await?;
        log::info!(
            "Crawl job {} finished: status={}, films={}",
            job_id,
            result.status,
            result.films.len()
        );
        Ok(result)
    }

    /// Acquire every partition concurrently and fold the outcomes.
    async fn collect(&self, job_id: &str) -> Result<CrawlResult> {
        if self.partitions.is_empty() {
            return Err(AppError::config("no partitions to crawl"));
        }

        let tasks = self.partitions.iter().map(|&year| {
            let acquirer = Arc::clone(&self.acquirer);
            tokio::spawn(async move { acquirer.acquire(year).await })
        });
        let joined = join_all(tasks).await;

        let outcomes = self
            .partitions
            .iter()
            .copied()
            .zip(joined)
            .map(|(year, joined)| {
                let outcome = joined.unwrap_or_else(|e| Err(AppError::Task(e.to_string())));
                (year, outcome)
            });

        Ok(summarize(job_id, outcomes, Utc::now()))
    }
}

/// Fold partition outcomes, in partition order, into a terminal record.
///
/// - nothing failed: `completed`, no error
/// - some failed: `completed`, error `"Partial failures: ..."`
/// - all failed: `failed`, error lists every partition
pub fn summarize(
    job_id: &str,
    outcomes: impl IntoIterator<Item = PartitionOutcome>,
    crawled_at: DateTime<Utc>,
) -> CrawlResult {
    let mut films = Vec::new();
    let mut errors = Vec::new();
    let mut succeeded = 0usize;

    for (year, outcome) in outcomes {
        match outcome {
            Ok(partition_films) => {
                succeeded += 1;
                films.extend(partition_films);
            }
            Err(e) => {
                log::error!("Failed to collect partition {}: {}", year, e);
                errors.push(format!("Partition {year}: {e}"));
            }
        }
    }

    if errors.is_empty() {
        CrawlResult::completed(job_id, films, None, crawled_at)
    } else if succeeded == 0 {
        CrawlResult::failed(job_id, errors.join("; "), crawled_at)
    } else {
        let error = format!("Partial failures: {}", errors.join("; "));
        CrawlResult::completed(job_id, films, Some(error), crawled_at)
    }
}
