use crate::config::types::{
    BrowserConfig, Config, DatabaseConfig, ExtractConfig, FieldRule, HydrateConfig, ScraperConfig,
};
use crate::ConfigError;
use scraper::Selector;
use std::collections::BTreeMap;

/// Store backends understood by the configuration
pub(crate) const STORE_BACKENDS: &[&str] = &["sqlite", "postgres"];

/// Fetch backends understood by the configuration
pub(crate) const FETCH_BACKENDS: &[&str] = &["http", "browser"];

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scraper_config(&config.scraper)?;
    validate_database_config(&config.database)?;
    validate_browser_config(&config.browser)?;
    validate_extract_config(&config.extract)?;
    if let Some(hydrate) = &config.hydrate {
        validate_hydrate_config(hydrate)?;
    }
    Ok(())
}

/// Validates scraper configuration
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if let Some(delay) = config.request_delay {
        if !delay.is_finite() || delay <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "request-delay must be greater than 0 seconds, got {}",
                delay
            )));
        }
    }

    if !FETCH_BACKENDS.contains(&config.fetcher.as_str()) {
        return Err(ConfigError::Validation(format!(
            "fetcher must be one of {:?}, got '{}'",
            FETCH_BACKENDS, config.fetcher
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates record store configuration
fn validate_database_config(config: &DatabaseConfig) -> Result<(), ConfigError> {
    match config.backend.as_str() {
        "sqlite" => {
            if config.path.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::Validation(
                    "database path must be set for the sqlite backend".to_string(),
                ));
            }
        }
        "postgres" => {
            if config.url.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::Validation(
                    "database url must be set for the postgres backend".to_string(),
                ));
            }
        }
        other => {
            return Err(ConfigError::Validation(format!(
                "database backend must be one of {:?}, got '{}'",
                STORE_BACKENDS, other
            )));
        }
    }

    if !is_sql_identifier(&config.table) {
        return Err(ConfigError::Validation(format!(
            "table must be a plain identifier (letters, digits, underscores), got '{}'",
            config.table
        )));
    }

    Ok(())
}

/// Validates browser configuration
fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.profile_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "profile-name cannot be empty".to_string(),
        ));
    }

    if config.window_width == 0 || config.window_height == 0 {
        return Err(ConfigError::Validation(format!(
            "window size must be non-zero, got {}x{}",
            config.window_width, config.window_height
        )));
    }

    Ok(())
}

/// Validates extraction rules
fn validate_extract_config(config: &ExtractConfig) -> Result<(), ConfigError> {
    if config.next_page_link.is_some() && config.next_page_click.is_some() {
        return Err(ConfigError::Validation(
            "next-page-link and next-page-click are mutually exclusive".to_string(),
        ));
    }

    for selector in [
        &config.item_links,
        &config.next_page_link,
        &config.next_page_click,
    ]
    .into_iter()
    .flatten()
    {
        validate_selector(selector)?;
    }

    if let Some(entries) = &config.entries {
        validate_selector(&entries.container)?;
        validate_selector(&entries.link)?;
        validate_fields(&entries.fields)?;
    }

    validate_fields(&config.info)
}

/// Validates hydration configuration
fn validate_hydrate_config(config: &HydrateConfig) -> Result<(), ConfigError> {
    if config.key.trim().is_empty() {
        return Err(ConfigError::Validation(
            "hydrate key cannot be empty".to_string(),
        ));
    }

    validate_fields(&config.info)
}

fn validate_fields(fields: &BTreeMap<String, FieldRule>) -> Result<(), ConfigError> {
    for (name, rule) in fields {
        if name.is_empty() {
            return Err(ConfigError::Validation(
                "info field names cannot be empty".to_string(),
            ));
        }
        validate_selector(rule.selector())?;
    }
    Ok(())
}

fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector {
            selector: selector.to_string(),
            message: e.to_string(),
        })
}

/// Returns true if `name` can be interpolated into SQL as a table name
pub fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
