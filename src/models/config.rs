//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Primary fetch and partition settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Rendering-based fallback settings
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Job store settings
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply overrides from the process environment.
    ///
    /// Recognizes `DATA_DIR`, `WEBDRIVER_URL` and `CHROME_EXECUTABLE_PATH`.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("DATA_DIR").filter(|v| !v.trim().is_empty()) {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("WEBDRIVER_URL").filter(|v| !v.trim().is_empty()) {
            self.fallback.webdriver_url = url;
        }
        if let Some(path) = lookup("CHROME_EXECUTABLE_PATH").filter(|v| !v.trim().is_empty()) {
            self.fallback.chrome_binary = Some(path);
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.target_url.trim().is_empty() {
            return Err(AppError::config("crawler.target_url is empty"));
        }
        url::Url::parse(&self.crawler.target_url)?;
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::config("crawler.user_agent is empty"));
        }
        if self.crawler.partitions.is_empty() {
            return Err(AppError::config("crawler.partitions is empty"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.crawler.partitions.iter().find(|p| !seen.insert(**p)) {
            return Err(AppError::config(format!(
                "crawler.partitions contains {dup} more than once"
            )));
        }
        if self.crawler.retry_ceiling == 0 {
            return Err(AppError::config("crawler.retry_ceiling must be > 0"));
        }
        if self.crawler.fetch_timeout_secs == 0 {
            return Err(AppError::config("crawler.fetch_timeout_secs must be > 0"));
        }
        if self.fallback.webdriver_url.trim().is_empty() {
            return Err(AppError::config("fallback.webdriver_url is empty"));
        }
        url::Url::parse(&self.fallback.webdriver_url)?;
        if self.fallback.wait_timeout_secs == 0 {
            return Err(AppError::config("fallback.wait_timeout_secs must be > 0"));
        }
        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(AppError::config("storage.data_dir is empty"));
        }
        Ok(())
    }
}

/// Primary fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Endpoint queried with `ajax=true&year={year}`
    #[serde(default = "defaults::target_url")]
    pub target_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Years to crawl, in output order
    #[serde(default = "defaults::partitions")]
    pub partitions: Vec<i32>,

    /// Total attempts for the primary fetch
    #[serde(default = "defaults::retry_ceiling")]
    pub retry_ceiling: u32,

    /// Backoff before attempt `n + 1` is `n * backoff_base_ms`
    #[serde(default = "defaults::backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Request timeout in seconds
    #[serde(default = "defaults::fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

impl CrawlerConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            target_url: defaults::target_url(),
            user_agent: defaults::user_agent(),
            partitions: defaults::partitions(),
            retry_ceiling: defaults::retry_ceiling(),
            backoff_base_ms: defaults::backoff_base_ms(),
            fetch_timeout_secs: defaults::fetch_timeout(),
        }
    }
}

/// Rendering-based fallback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// WebDriver endpoint (chromedriver, selenium)
    #[serde(default = "defaults::webdriver_url")]
    pub webdriver_url: String,

    /// How long to wait for rendered content
    #[serde(default = "defaults::wait_timeout")]
    pub wait_timeout_secs: u64,

    /// Browser command line flags
    #[serde(default = "defaults::browser_args")]
    pub browser_args: Vec<String>,

    /// Custom browser binary
    #[serde(default)]
    pub chrome_binary: Option<String>,
}

impl FallbackConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            webdriver_url: defaults::webdriver_url(),
            wait_timeout_secs: defaults::wait_timeout(),
            browser_args: defaults::browser_args(),
            chrome_binary: None,
        }
    }
}

/// Job store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one `{job_id}.json` per job
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn target_url() -> String {
        "https://www.scrapethissite.com/pages/ajax-javascript/".to_string()
    }

    pub fn user_agent() -> String {
        format!("awards-crawler/{}", env!("CARGO_PKG_VERSION"))
    }

    pub fn partitions() -> Vec<i32> {
        (2010..=2015).collect()
    }

    pub fn retry_ceiling() -> u32 {
        3
    }

    pub fn backoff_base_ms() -> u64 {
        500
    }

    pub fn fetch_timeout() -> u64 {
        30
    }

    pub fn webdriver_url() -> String {
        "http://localhost:4444".to_string()
    }

    pub fn wait_timeout() -> u64 {
        10
    }

    pub fn browser_args() -> Vec<String> {
        [
            "--headless",
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--disable-gpu",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    pub fn data_dir() -> PathBuf {
        PathBuf::from("data")
    }
}
