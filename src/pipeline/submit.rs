//! Job submission: record the job as pending and start it in the background.

use std::sync::Arc;

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{CrawlResult, JobStatus, validate_job_id};
use crate::pipeline::JobOrchestrator;

/// Handle returned to the submitter.
///
/// The spawned job reports only through the job store; `handle` can be
/// dropped without affecting it.
#[derive(Debug)]
pub struct Submission {
    pub job_id: String,
    pub status: JobStatus,
    pub handle: JoinHandle<()>,
}

/// Persist a `pending` record and spawn the job without awaiting it.
///
/// A fresh UUID is generated when `job_id` is `None`. An id that already
/// has a record is rejected so a finished job never reverts to `pending`.
pub async fn submit_job(
    orchestrator: Arc<JobOrchestrator>,
    job_id: Option<String>,
) -> Result<Submission> {
    let job_id = job_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    validate_job_id(&job_id)?;

    match orchestrator.store().get(&job_id).await {
        Ok(existing) => {
            log::warn!("Rejected crawl job {}: already {}", job_id, existing.status);
            return Err(AppError::validation("job_id", "already exists"));
        }
        Err(AppError::NotFound(_)) => {}
        Err(e) => return Err(e),
    }

    orchestrator
        .store()
        .put(&job_id, &CrawlResult::pending(&job_id))
        .await?;
    log::info!("Accepted crawl job {}", job_id);

    let spawned_id = job_id.clone();
    let handle = tokio::spawn(async move {
        if let Err(e) = orchestrator.run(&spawned_id).await {
            log::error!("Crawl job {} could not be persisted: {}", spawned_id, e);
        }
    });

    Ok(Submission {
        job_id,
        status: JobStatus::Pending,
        handle,
    })
}
