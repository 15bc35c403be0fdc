//! Awards Crawler CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::sync::Arc;

use awards_crawler::{
    error::{AppError, Result},
    models::{Config, JobStatus},
    pipeline::{self, JobOrchestrator},
    storage::{JobStore, LocalJobStore},
};
use clap::{Parser, Subcommand};

/// Film awards crawler
#[derive(Parser, Debug)]
#[command(name = "awards-crawler", version, about = "Film Awards Crawler")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the job store directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a crawl job and wait for it to finish
    Crawl {
        /// Job identifier (default: random UUID)
        #[arg(long)]
        job_id: Option<String>,
    },

    /// Print the stored result of a job
    #[command(name = "result")]
    Show {
        /// Job identifier
        job_id: String,
    },

    /// Validate configuration
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    config.apply_env();
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = dir;
    }

    let store: Arc<dyn JobStore> = Arc::new(LocalJobStore::new(&config.storage.data_dir));

    match cli.command {
        Command::Crawl { job_id } => {
            config.validate()?;
            let orchestrator = Arc::new(JobOrchestrator::from_config(&config, Arc::clone(&store))?);

            let submission = pipeline::submit_job(orchestrator, job_id).await?;
            log::info!(
                "Job {} is {}; crawling {} partitions",
                submission.job_id,
                submission.status,
                config.crawler.partitions.len()
            );

            submission
                .handle
                .await
                .map_err(|e| AppError::Task(e.to_string()))?;

            let result = store.get(&submission.job_id).await?;
            log::info!(
                "Job {} {} with {} films",
                result.job_id,
                result.status,
                result.films.len()
            );
            if let Some(error) = &result.error {
                log::warn!("{}", error);
            }
            if result.status == JobStatus::Failed {
                log::error!("Job {} produced no films", result.job_id);
            }
            println!("{}", result.job_id);
        }

        Command::Show { job_id } => match store.get(&job_id).await {
            Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
            Err(AppError::NotFound(id)) => {
                log::error!("Job not found: {}", id);
                return Err(AppError::NotFound(id));
            }
            Err(e) => return Err(e),
        },

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} partitions, store at {})",
                config.crawler.partitions.len(),
                config.storage.data_dir.display()
            );
        }
    }

    Ok(())
}
