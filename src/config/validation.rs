use crate::config::types::{Config, CrawlConfig, DriverConfig, InputConfig, OutputConfig};
use crate::ConfigError;
use chrono::NaiveDate;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_driver_config(&config.driver)?;
    validate_input_config(&config.input)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawl configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.platform.is_empty() {
        return Err(ConfigError::Validation("platform cannot be empty".to_string()));
    }

    if !config
        .platform
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "platform must contain only alphanumeric characters, hyphens, or underscores, got '{}'",
            config.platform
        )));
    }

    if config.mode.is_empty() {
        return Err(ConfigError::Validation("mode cannot be empty".to_string()));
    }

    if config.keyword.trim().is_empty() {
        return Err(ConfigError::Validation("keyword cannot be empty".to_string()));
    }

    let start = parse_date_opt("start-date", config.start_date.as_deref())?;
    let end = parse_date_opt("end-date", config.end_date.as_deref())?;
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(ConfigError::Validation(format!(
                "start-date {} is after end-date {}",
                start, end
            )));
        }
    }

    let base = Url::parse(&config.explore_base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid explore-base-url: {}", e)))?;
    if base.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "explore-base-url '{}' must use HTTPS scheme",
            config.explore_base_url
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.block_markers.is_empty()
        || config.block_markers.iter().any(|marker| marker.is_empty())
    {
        return Err(ConfigError::Validation(
            "block-markers must contain at least one non-empty marker".to_string(),
        ));
    }

    Ok(())
}

/// Validates driver configuration
fn validate_driver_config(config: &DriverConfig) -> Result<(), ConfigError> {
    let endpoint = Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid driver endpoint: {}", e)))?;

    if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "driver endpoint '{}' must use http or https",
            config.endpoint
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    Ok(())
}

/// Validates input configuration
fn validate_input_config(config: &InputConfig) -> Result<(), ConfigError> {
    if config.posts_path.is_empty() {
        return Err(ConfigError::Validation(
            "posts-path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.data_dir.is_empty() {
        return Err(ConfigError::Validation(
            "data-dir cannot be empty".to_string(),
        ));
    }

    if config.ledger_path.is_empty() {
        return Err(ConfigError::Validation(
            "ledger-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Parses an optional `YYYY-MM-DD` date string
fn parse_date_opt(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, ConfigError> {
    match value {
        None => Ok(None),
        Some("") => Ok(None),
        Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                ConfigError::Validation(format!(
                    "{} must be formatted YYYY-MM-DD, got '{}'",
                    field, text
                ))
            }),
    }
}
