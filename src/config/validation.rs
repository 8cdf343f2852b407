use crate::config::types::{Config, DatabaseConfig, ScraperConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_database_config(&config.database)?;
    validate_scraper_config(&config.scraper)?;
    Ok(())
}

/// Validates database configuration
fn validate_database_config(config: &DatabaseConfig) -> Result<(), ConfigError> {
    let path = config.database_path();
    if path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "connection-string cannot be empty".to_string(),
        ));
    }

    // Every worker opens its own session, so they must all reach the same file
    if path.as_os_str() == ":memory:" {
        return Err(ConfigError::Validation(
            "in-memory databases cannot be shared between sessions".to_string(),
        ));
    }

    match (&config.username, &config.password) {
        (Some(_), None) => Err(ConfigError::Validation(
            "username is set but password is missing".to_string(),
        )),
        (None, Some(_)) => Err(ConfigError::Validation(
            "password is set but username is missing".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Validates scraper configuration
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    let root = Url::parse(&config.root_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid root-url '{}': {}", config.root_url, e)))?;

    if root.scheme() != "http" && root.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "root-url '{}' must use http or https",
            config.root_url
        )));
    }

    if root.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "root-url '{}' has no host",
            config.root_url
        )));
    }

    if config.parallelism < 1 || config.parallelism > 100 {
        return Err(ConfigError::Validation(format!(
            "parallelism must be between 1 and 100, got {}",
            config.parallelism
        )));
    }

    if config.connection_workers < 1 || config.connection_workers > 256 {
        return Err(ConfigError::Validation(format!(
            "connection-workers must be between 1 and 256, got {}",
            config.connection_workers
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}
