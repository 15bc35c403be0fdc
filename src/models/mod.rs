// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod film;
mod job;

// Re-export all public types
pub use config::{Config, CrawlerConfig, FallbackConfig, StorageConfig};
pub use film::Film;
pub use job::{CrawlResult, JobStatus, validate_job_id};
