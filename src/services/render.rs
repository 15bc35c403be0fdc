// src/services/render.rs

//! Rendering-based fallback.
//!
//! Drives a headless browser through a W3C WebDriver endpoint, loads the same
//! partition URL the primary source uses, waits for the JSON body to render
//! and parses it out of the page source.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use scraper::{Html, Selector};
use serde_json::{Value, json};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{FallbackConfig, Film};
use crate::services::FallbackFetcher;
use crate::utils::{base_url, http, partition_url};

/// W3C web element identifier key.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Minimal WebDriver protocol client.
#[derive(Clone)]
pub struct WebDriverClient {
    client: Client,
    base: Url,
    capabilities: Value,
}

impl WebDriverClient {
    pub fn new(config: &FallbackConfig) -> Result<Self> {
        Ok(Self {
            client: http::create_webdriver_client(config)?,
            base: base_url(&config.webdriver_url)?,
            capabilities: Self::chrome_capabilities(config),
        })
    }

    fn chrome_capabilities(config: &FallbackConfig) -> Value {
        let mut options = json!({ "args": config.browser_args });
        if let Some(binary) = &config.chrome_binary {
            options["binary"] = json!(binary);
        }

        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": options,
                }
            }
        })
    }

    /// Send one command and unwrap the `value` member of the reply.
    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = self.base.join(path)?;
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let mut reply: Value = response.json().await?;
        let value = reply.get_mut("value").map(Value::take).unwrap_or(Value::Null);

        if !status.is_success() {
            let error = value["error"].as_str().unwrap_or("unknown error");
            let message = value["message"].as_str().unwrap_or_default();
            return Err(AppError::webdriver(format!("{status} {error}: {message}")));
        }
        Ok(value)
    }

    /// Launch a browser session.
    pub async fn new_session(&self) -> Result<WebDriverSession> {
        let value = self
            .command(Method::POST, "session", Some(self.capabilities.clone()))
            .await?;
        let id = value["sessionId"]
            .as_str()
            .ok_or_else(|| AppError::webdriver("new session reply has no sessionId"))?
            .to_string();

        log::debug!("Opened WebDriver session {}", id);
        Ok(WebDriverSession {
            driver: self.clone(),
            id,
            closed: false,
        })
    }
}

/// A live browser session.
///
/// Call `close` when done. A session dropped without closing is deleted in
/// the background.
pub struct WebDriverSession {
    driver: WebDriverClient,
    id: String,
    closed: bool,
}

impl WebDriverSession {
    fn path(&self, command: &str) -> String {
        if command.is_empty() {
            format!("session/{}", self.id)
        } else {
            format!("session/{}/{}", self.id, command)
        }
    }

    pub async fn set_implicit_wait(&self, wait: Duration) -> Result<()> {
        let body = json!({ "implicit": wait.as_millis() as u64 });
        self.driver
            .command(Method::POST, &self.path("timeouts"), Some(body))
            .await?;
        Ok(())
    }

    pub async fn navigate(&self, url: &Url) -> Result<()> {
        let body = json!({ "url": url.as_str() });
        self.driver
            .command(Method::POST, &self.path("url"), Some(body))
            .await?;
        Ok(())
    }

    /// Find the first element with `tag`, waiting up to the implicit wait.
    pub async fn find_by_tag(&self, tag: &str) -> Result<String> {
        let body = json!({ "using": "tag name", "value": tag });
        let value = self
            .driver
            .command(Method::POST, &self.path("element"), Some(body))
            .await?;

        value[ELEMENT_KEY]
            .as_str()
            .map(String::from)
            .ok_or_else(|| AppError::webdriver(format!("no element reference for <{tag}>")))
    }

    pub async fn page_source(&self) -> Result<String> {
        let value = self
            .driver
            .command(Method::GET, &self.path("source"), None)
            .await?;

        match value {
            Value::String(source) => Ok(source),
            other => Err(AppError::webdriver(format!("unexpected page source {other}"))),
        }
    }

    /// Delete the session, shutting the browser down.
    pub async fn close(mut self) -> Result<()> {
        self.closed = true;
        self.driver
            .command(Method::DELETE, &self.path(""), None)
            .await?;
        log::debug!("Closed WebDriver session {}", self.id);
        Ok(())
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::warn!("WebDriver session {} leaked: no runtime to close it", self.id);
            return;
        };

        let driver = self.driver.clone();
        let path = self.path("");
        handle.spawn(async move {
            if let Err(e) = driver.command(Method::DELETE, &path, None).await {
                log::warn!("Failed to delete abandoned WebDriver session: {}", e);
            }
        });
    }
}

/// Pull the JSON payload out of a rendered page.
///
/// Browsers display raw JSON inside a `<pre>` element; anything else falls
/// back to the body text.
pub fn extract_payload(page_source: &str) -> Result<String> {
    let document = Html::parse_document(page_source);

    for selector in ["pre", "body"] {
        let selector = parse_selector(selector)?;
        if let Some(element) = document.select(&selector).next() {
            let text: String = element.text().collect();
            let text = text.trim();
            if !text.is_empty() {
                return Ok(text.to_string());
            }
        }
    }

    Err(AppError::webdriver("rendered page has no content"))
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::webdriver(format!("invalid selector '{s}': {e:?}")))
}

/// Fallback fetcher that renders the partition URL in a browser.
pub struct RenderedFetcher {
    driver: WebDriverClient,
    endpoint: Url,
    wait_timeout: Duration,
}

impl RenderedFetcher {
    pub fn new(driver: WebDriverClient, target_url: &str, wait_timeout: Duration) -> Result<Self> {
        Ok(Self {
            driver,
            endpoint: Url::parse(target_url)?,
            wait_timeout,
        })
    }

    pub fn from_config(config: &FallbackConfig, target_url: &str) -> Result<Self> {
        Self::new(WebDriverClient::new(config)?, target_url, config.wait_timeout())
    }

    async fn render(&self, year: i32) -> Result<Vec<Film>> {
        let session = self.driver.new_session().await?;
        let outcome = self.render_in(&session, year).await;

        if let Err(e) = session.close().await {
            log::warn!("Failed to close WebDriver session for {}: {}", year, e);
        }

        let films = outcome?;
        log::info!("Rendered: fetched {} films for {}", films.len(), year);
        Ok(films)
    }

    async fn render_in(&self, session: &WebDriverSession, year: i32) -> Result<Vec<Film>> {
        session.set_implicit_wait(self.wait_timeout).await?;
        session.navigate(&partition_url(&self.endpoint, year)).await?;
        session.find_by_tag("pre").await.map_err(|e| {
            AppError::webdriver(format!(
                "content did not render within {:?}: {}",
                self.wait_timeout, e
            ))
        })?;

        let source = session.page_source().await?;
        Film::from_payload(&extract_payload(&source)?)
    }
}

#[async_trait]
impl FallbackFetcher for RenderedFetcher {
    async fn fetch_fallback(&self, year: i32) -> Result<Vec<Film>> {
        self.render(year).await.map_err(|e| match e {
            e @ AppError::FallbackFetch { .. } => e,
            other => AppError::fallback(year, other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const TARGET: &str = "https://www.scrapethissite.com/pages/ajax-javascript/";

    const RENDERED_PAGE: &str = r#"<html><body><pre>[{"title": "Argo", "year": 2012, "awards": 3, "nominations": 7}]</pre></body></html>"#;

    #[derive(Clone, Copy)]
    enum Page {
        Renders,
        NavigationFails,
        NeverRenders,
    }

    /// In-process WebDriver endpoint that records every command it receives.
    struct FakeDriver {
        url: String,
        commands: Arc<Mutex<Vec<String>>>,
    }

    impl FakeDriver {
        async fn start(page: Page) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = format!("http://{}", listener.local_addr().unwrap());
            let commands = Arc::new(Mutex::new(Vec::new()));

            let log = Arc::clone(&commands);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    tokio::spawn(serve(stream, page, Arc::clone(&log)));
                }
            });

            Self { url, commands }
        }

        fn fetcher(&self) -> RenderedFetcher {
            let config = FallbackConfig {
                webdriver_url: self.url.clone(),
                wait_timeout_secs: 1,
                ..FallbackConfig::default()
            };
            RenderedFetcher::from_config(&config, TARGET).unwrap()
        }

        fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    async fn serve(mut stream: TcpStream, page: Page, log: Arc<Mutex<Vec<String>>>) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let head_end = loop {
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let body_len = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while buf.len() < head_end + body_len {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }

        let mut request_line = head.split_whitespace();
        let method = request_line.next().unwrap_or_default().to_string();
        let path = request_line.next().unwrap_or_default().to_string();
        log.lock().unwrap().push(format!("{method} {path}"));

        let (status, value) = reply(page, &method, &path);
        let body = json!({ "value": value }).to_string();
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.shutdown().await;
    }

    fn reply(page: Page, method: &str, path: &str) -> (&'static str, Value) {
        match (method, path) {
            ("POST", "/session") => ("200 OK", json!({ "sessionId": "s1", "capabilities": {} })),
            ("POST", "/session/s1/url") if matches!(page, Page::NavigationFails) => (
                "500 Internal Server Error",
                json!({ "error": "unknown error", "message": "net::ERR_CONNECTION_RESET" }),
            ),
            ("POST", "/session/s1/element") if matches!(page, Page::NeverRenders) => (
                "404 Not Found",
                json!({ "error": "no such element", "message": "no element matching pre" }),
            ),
            ("POST", "/session/s1/element") => (
                "200 OK",
                json!({ "element-6066-11e4-a52e-4f735466cecf": "e1" }),
            ),
            ("GET", "/session/s1/source") => ("200 OK", json!(RENDERED_PAGE)),
            _ => ("200 OK", Value::Null),
        }
    }

    #[test]
    fn test_extract_payload_from_pre() {
        let page = r#"<html><head></head><body><pre style="word-wrap: break-word;">[{"title": "Argo", "year": 2012, "awards": 3, "nominations": 7}]</pre><div class="json-formatter-container"></div></body></html>"#;

        let payload = extract_payload(page).unwrap();
        let films = Film::from_payload(&payload).unwrap();

        assert_eq!(films.len(), 1);
        assert_eq!(films[0].title, "Argo");
    }

    #[test]
    fn test_extract_payload_from_body() {
        let page = "<html><body>\n  []\n</body></html>";
        assert_eq!(extract_payload(page).unwrap(), "[]");
    }

    #[test]
    fn test_extract_payload_empty_page() {
        assert!(extract_payload("<html><body>  </body></html>").is_err());
    }

    #[test]
    fn test_capabilities_include_binary() {
        let config = FallbackConfig {
            chrome_binary: Some("/opt/chrome/chrome".to_string()),
            ..FallbackConfig::default()
        };

        let caps = WebDriverClient::chrome_capabilities(&config);
        let options = &caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"];

        assert_eq!(options["binary"], "/opt/chrome/chrome");
        assert_eq!(options["args"][0], "--headless");
    }

    #[tokio::test]
    async fn test_unreachable_driver_is_fallback_error() {
        let config = FallbackConfig {
            webdriver_url: "http://127.0.0.1:9".to_string(),
            wait_timeout_secs: 1,
            ..FallbackConfig::default()
        };
        let fetcher = RenderedFetcher::from_config(&config, TARGET).unwrap();

        let err = fetcher.fetch_fallback(2014).await.unwrap_err();
        assert!(matches!(err, AppError::FallbackFetch { partition: 2014, .. }));
    }

    #[tokio::test]
    async fn test_session_closed_after_rendering() {
        let driver = FakeDriver::start(Page::Renders).await;

        let films = driver.fetcher().fetch_fallback(2012).await.unwrap();

        assert_eq!(films.len(), 1);
        assert_eq!(films[0].title, "Argo");
        assert_eq!(
            driver.commands(),
            vec![
                "POST /session",
                "POST /session/s1/timeouts",
                "POST /session/s1/url",
                "POST /session/s1/element",
                "GET /session/s1/source",
                "DELETE /session/s1",
            ]
        );
    }

    #[tokio::test]
    async fn test_session_closed_when_navigation_fails() {
        let driver = FakeDriver::start(Page::NavigationFails).await;

        let err = driver.fetcher().fetch_fallback(2012).await.unwrap_err();

        assert!(matches!(err, AppError::FallbackFetch { partition: 2012, .. }));
        assert!(err.to_string().contains("ERR_CONNECTION_RESET"));
        assert_eq!(
            driver.commands(),
            vec![
                "POST /session",
                "POST /session/s1/timeouts",
                "POST /session/s1/url",
                "DELETE /session/s1",
            ]
        );
    }

    #[tokio::test]
    async fn test_session_closed_when_content_never_renders() {
        let driver = FakeDriver::start(Page::NeverRenders).await;

        let err = driver.fetcher().fetch_fallback(2013).await.unwrap_err();

        assert!(matches!(err, AppError::FallbackFetch { partition: 2013, .. }));
        assert!(err.to_string().contains("did not render"));
        let commands = driver.commands();
        assert!(!commands.contains(&"GET /session/s1/source".to_string()));
        assert_eq!(commands.last().map(String::as_str), Some("DELETE /session/s1"));
    }
}
