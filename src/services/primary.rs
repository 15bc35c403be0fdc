// src/services/primary.rs

//! Primary acquisition: the JSON endpoint behind the page.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, Film};
use crate::services::PartitionSource;
use crate::utils::{http, partition_url};

/// `GET {target_url}?ajax=true&year={year}` over reqwest.
pub struct AjaxSource {
    client: Client,
    endpoint: Url,
}

impl AjaxSource {
    pub fn new(client: Client, target_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            endpoint: Url::parse(target_url)?,
        })
    }

    /// Build a source with its own client from the crawler settings.
    pub fn from_config(config: &CrawlerConfig) -> Result<Self> {
        Self::new(http::create_async_client(config)?, &config.target_url)
    }
}

#[async_trait]
impl PartitionSource for AjaxSource {
    async fn request(&self, year: i32) -> Result<String> {
        let url = partition_url(&self.endpoint, year);
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}

/// Fetches one partition from a `PartitionSource` with linear backoff.
pub struct PartitionFetcher {
    source: Arc<dyn PartitionSource>,
    retry_ceiling: u32,
    backoff_base: Duration,
}

impl PartitionFetcher {
    pub fn new(source: Arc<dyn PartitionSource>, config: &CrawlerConfig) -> Self {
        Self {
            source,
            retry_ceiling: config.retry_ceiling.max(1),
            backoff_base: config.backoff_base(),
        }
    }

    /// Sleep before the attempt following `attempt`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt
    }

    /// Fetch and validate the films of one year.
    ///
    /// Transport and status failures are retried up to the ceiling and then
    /// reported as `TransientFetch`. A payload that fails to parse or validate
    /// is returned immediately.
    pub async fn fetch_primary(&self, year: i32) -> Result<Vec<Film>> {
        let mut attempt = 1;
        loop {
            match self.source.request(year).await {
                Ok(body) => {
                    let films = Film::from_payload(&body)?;
                    log::info!("HTTP: fetched {} films for {}", films.len(), year);
                    return Ok(films);
                }
                Err(e) if e.is_retryable() => {
                    log::warn!(
                        "HTTP attempt {}/{} failed for {}: {}",
                        attempt,
                        self.retry_ceiling,
                        year,
                        e
                    );
                    if attempt >= self.retry_ceiling {
                        return Err(AppError::TransientFetch {
                            partition: year,
                            attempts: attempt,
                            message: e.to_string(),
                        });
                    }
                    tokio::time::sleep(self.backoff_for(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    const TWO_FILMS: &str = r#"[
        {"title": "12 Years a Slave", "year": 2013, "awards": 3, "nominations": 9, "best_picture": true},
        {"title": "Gravity", "year": 2013, "awards": 7, "nominations": 10}
    ]"#;

    /// Replays scripted responses and counts attempts.
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<String>>>,
        attempts: AtomicU32,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                attempts: AtomicU32::new(0),
            })
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PartitionSource for ScriptedSource {
        async fn request(&self, _year: i32) -> Result<String> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(unavailable()))
        }
    }

    fn unavailable() -> AppError {
        AppError::HttpStatus {
            status: 503,
            url: "https://example.com/?ajax=true".into(),
        }
    }

    fn fetcher(source: Arc<ScriptedSource>) -> PartitionFetcher {
        PartitionFetcher::new(source, &CrawlerConfig::default())
    }

    #[test]
    fn test_backoff_is_linear() {
        let fetcher = fetcher(ScriptedSource::new(vec![]));
        assert_eq!(fetcher.backoff_for(1), Duration::from_millis(500));
        assert_eq!(fetcher.backoff_for(2), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_first_attempt() {
        let source = ScriptedSource::new(vec![Ok(TWO_FILMS.to_string())]);
        let films = fetcher(Arc::clone(&source)).fetch_primary(2013).await.unwrap();

        assert_eq!(films.len(), 2);
        assert_eq!(source.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let source = ScriptedSource::new(vec![
            Err(unavailable()),
            Err(unavailable()),
            Ok(TWO_FILMS.to_string()),
        ]);
        let start = tokio::time::Instant::now();

        let films = fetcher(Arc::clone(&source)).fetch_primary(2013).await.unwrap();

        assert_eq!(films[1].title, "Gravity");
        assert_eq!(source.attempts(), 3);
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_ceiling() {
        let source = ScriptedSource::new(vec![]);

        let err = fetcher(Arc::clone(&source)).fetch_primary(2011).await.unwrap_err();

        assert_eq!(source.attempts(), 3);
        match err {
            AppError::TransientFetch {
                partition,
                attempts,
                message,
            } => {
                assert_eq!(partition, 2011);
                assert_eq!(attempts, 3);
                assert!(message.contains("503"));
            }
            other => panic!("expected TransientFetch, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_payload_is_not_retried() {
        let source = ScriptedSource::new(vec![
            Ok(r#"[{"title": "Gravity", "year": 2013}]"#.to_string()),
            Ok(TWO_FILMS.to_string()),
        ]);

        let err = fetcher(Arc::clone(&source)).fetch_primary(2013).await.unwrap_err();

        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "awards"));
        assert_eq!(source.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_json_body_is_not_retried() {
        let source = ScriptedSource::new(vec![Ok("<html>maintenance</html>".to_string())]);

        let err = fetcher(Arc::clone(&source)).fetch_primary(2013).await.unwrap_err();

        assert!(matches!(err, AppError::Json(_)));
        assert_eq!(source.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_ceiling() {
        let source = ScriptedSource::new(vec![]);
        let config = CrawlerConfig {
            retry_ceiling: 5,
            ..CrawlerConfig::default()
        };

        let result = PartitionFetcher::new(source.clone(), &config)
            .fetch_primary(2010)
            .await;

        assert!(result.is_err());
        assert_eq!(source.attempts(), 5);
    }
}
