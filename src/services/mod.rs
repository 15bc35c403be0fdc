//! Service layer for the crawler application.
//!
//! This module contains the acquisition logic for one partition:
//! - Primary JSON fetch with retry (`PartitionFetcher`)
//! - Rendering-based fallback over WebDriver (`RenderedFetcher`)
//! - Escalation from one to the other (`PartitionAcquirer`)

mod acquire;
mod primary;
mod render;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Film;

pub use acquire::PartitionAcquirer;
pub use primary::{AjaxSource, PartitionFetcher};
pub use render::{RenderedFetcher, WebDriverClient, WebDriverSession, extract_payload};

/// One request against the structured source.
#[async_trait]
pub trait PartitionSource: Send + Sync {
    /// Perform a single attempt and return the raw response body.
    ///
    /// Transport and status failures must be retryable errors
    /// (see `AppError::is_retryable`).
    async fn request(&self, year: i32) -> Result<String>;
}

/// Secondary acquisition strategy, attempted once per partition.
#[async_trait]
pub trait FallbackFetcher: Send + Sync {
    async fn fetch_fallback(&self, year: i32) -> Result<Vec<Film>>;
}
