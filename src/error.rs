// src/error.rs

//! Unified error handling for the crawler application.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A record field is missing or malformed
    #[error("Validation error on '{field}': {message}")]
    Validation { field: String, message: String },

    /// Primary fetch exhausted its retry budget
    #[error("Primary fetch for {partition} failed after {attempts} attempts: {message}")]
    TransientFetch {
        partition: i32,
        attempts: u32,
        message: String,
    },

    /// Rendering-based fetch failed
    #[error("Fallback fetch for {partition} failed: {message}")]
    FallbackFetch { partition: i32, message: String },

    /// WebDriver protocol error
    #[error("WebDriver error: {0}")]
    WebDriver(String),

    /// A partition task panicked or was cancelled
    #[error("Partition task aborted: {0}")]
    Task(String),

    /// No persisted job under this identifier
    #[error("Job not found: {0}")]
    NotFound(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error for a named field.
    pub fn validation(field: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.to_string(),
        }
    }

    /// Create a fallback fetch error for a partition.
    pub fn fallback(partition: i32, message: impl fmt::Display) -> Self {
        Self::FallbackFetch {
            partition,
            message: message.to_string(),
        }
    }

    /// Create a WebDriver protocol error.
    pub fn webdriver(message: impl fmt::Display) -> Self {
        Self::WebDriver(message.to_string())
    }

    /// Whether the primary strategy may retry after this error.
    ///
    /// Only transport and status failures are retryable; anything raised
    /// while decoding a successful response is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_decode(),
            Self::HttpStatus { .. } => true,
            _ => false,
        }
    }
}
