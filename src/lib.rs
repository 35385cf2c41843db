//! Team Scraper: a person-record harvester for organization staff pages
//!
//! This crate drives a scriptable browser through a configured staff or team
//! page, gets past interactive bot-protection challenges where a human can help,
//! follows one of several pagination idioms, and streams one `PersonRecord`
//! per person to an incremental sink.

pub mod browser;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod pagination;
pub mod protection;
pub mod state;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Team Scraper operations
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Output error: {0}")]
    Sink(#[from] SinkError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Bot protection blocked the crawl at {url}")]
    ProtectionBlocked { url: String },

    #[error("No items matched '{selector}' on the first page and no pagination is configured")]
    EmptyFirstPage {
        selector: String,
        artifact: Option<PathBuf>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Missing required option: {0}")]
    Missing(&'static str),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Errors surfaced from the browser automation boundary
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Timed out after {timeout_ms}ms loading {url}")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Browser context lost: {0}")]
    ContextLost(String),

    #[error("Page operation '{operation}' failed: {message}")]
    Operation { operation: String, message: String },

    #[error("Operation '{0}' is not supported by this browser engine")]
    Unsupported(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BrowserError {
    /// Builds an `Operation` error from any displayable cause
    pub fn operation(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::Operation {
            operation: operation.to_string(),
            message: cause.to_string(),
        }
    }
}

/// Errors raised by record sinks
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Output file is locked by another program: {0}")]
    Locked(String),

    #[error("Failed to write record: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type alias for Team Scraper operations
pub type Result<T> = std::result::Result<T, ScraperError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

/// Result type alias for browser operations
pub type BrowserResult<T> = std::result::Result<T, BrowserError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, Coordinator, CrawlReport, ProgressEvent};
pub use extract::PersonRecord;
pub use state::ProtectionState;
pub use url::normalize_url;
