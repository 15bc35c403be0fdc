// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;
use crate::models::{CrawlerConfig, FallbackConfig};

/// Headroom on top of the content wait for WebDriver command round-trips.
const WEBDRIVER_COMMAND_SLACK: Duration = Duration::from_secs(30);

/// Create a configured asynchronous HTTP client for the primary source.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.fetch_timeout())
        .build()?;
    Ok(client)
}

/// Create a client for talking to the WebDriver endpoint.
///
/// Element lookups block server-side for up to the wait timeout, so the
/// request timeout has to outlast it.
pub fn create_webdriver_client(config: &FallbackConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(config.wait_timeout() + WEBDRIVER_COMMAND_SLACK)
        .build()?;
    Ok(client)
}
