//! Pipeline entry points for crawl jobs.
//!
//! - `JobOrchestrator::run`: Crawl every partition and persist the outcome
//! - `submit_job`: Record a job as pending and run it in the background

pub mod crawl;
pub mod submit;

pub use crawl::{JobOrchestrator, PartitionOutcome, summarize};
pub use submit::{Submission, submit_job};
