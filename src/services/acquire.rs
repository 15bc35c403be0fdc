//! Per-partition escalation from the primary to the fallback strategy.

use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::Film;
use crate::services::{FallbackFetcher, PartitionFetcher};

/// Acquires one partition, primary first.
pub struct PartitionAcquirer {
    primary: PartitionFetcher,
    fallback: Arc<dyn FallbackFetcher>,
}

impl PartitionAcquirer {
    pub fn new(primary: PartitionFetcher, fallback: Arc<dyn FallbackFetcher>) -> Self {
        Self { primary, fallback }
    }

    /// Fetch the films of `year`.
    ///
    /// Any primary failure, including a malformed payload, escalates to a
    /// single fallback attempt. A fallback failure is the partition's error.
    pub async fn acquire(&self, year: i32) -> Result<Vec<Film>> {
        let primary_err = match self.primary.fetch_primary(year).await {
            Ok(films) => return Ok(films),
            Err(e) => e,
        };

        log::warn!(
            "HTTP failed for {}, falling back to rendered fetch: {}",
            year,
            primary_err
        );

        self.fallback
            .fetch_fallback(year)
            .await
            .map_err(|e| match e {
                e @ AppError::FallbackFetch { .. } => e,
                other => AppError::fallback(year, other),
            })
    }
}
