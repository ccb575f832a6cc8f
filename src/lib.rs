//! Filmlist crawler: a parallel, rate-limited broadcaster catalogue crawler
//!
//! This crate crawls broadcaster websites and APIs and merges everything it
//! finds into one deduplicated catalogue of films. The per-source traversal
//! shape is plugged in as a [`crawler::Pipeline`]; the core takes care of
//! splitting work across a shared worker pool, throttling requests per source,
//! classifying failures, and enforcing a global time budget.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod sources;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("There is no registered crawler for the source \"{0}\"")]
    NoCrawler(model::Source),

    #[error("Failed to start the worker pool: {0}")]
    WorkerPool(std::io::Error),

    #[error("The worker pool has been shut down")]
    PoolShutdown,

    #[error("Crawl stage of {crawler} failed: {message}")]
    Stage {
        crawler: model::Source,
        message: String,
    },

    #[error("Invalid feed definition for {crawler}: {message}")]
    Feed {
        crawler: model::Source,
        message: String,
    },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

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

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, CrawlerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlManager, CrawlTask, Pipeline, SourceCrawler};
pub use model::{Catalogue, CrawlUnit, Film, Source, SourceConfig};
