//! Configuration module for Pagewalk
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use pagewalk::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("pagewalk.toml")).unwrap();
//! println!("Items live in table: {}", config.database.table);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserConfig, Config, DatabaseConfig, EntryRules, ExtractConfig, FieldRule, HydrateConfig,
    ScraperConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::is_sql_identifier;
