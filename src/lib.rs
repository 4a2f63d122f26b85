//! Pagewalk: a resumable paginated scraper
//!
//! This crate walks paginated listings, asks caller-supplied extractors for item
//! URLs, item payloads and next-page references, and persists everything into a
//! deduplicated store keyed by URL. Items that lack a payload can be enriched
//! later by the info-fill pass, and stored payloads can be hydrated by following
//! a URL they embed.

pub mod config;
pub mod crawler;
pub mod diagnostics;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Pagewalk operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No extractor configured for the {pass}: set {needs}")]
    MissingExtractor {
        pass: state::Pass,
        needs: &'static str,
    },

    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Browser session error: {0}")]
    Session(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

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

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Result type alias for Pagewalk operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{ExtractorSet, FetchResult, Fetcher, NextPage, Scraper, Target};
pub use diagnostics::{CrawlEvent, DiagnosticSink};
pub use storage::{InfoFilter, Item, RecordStore};
