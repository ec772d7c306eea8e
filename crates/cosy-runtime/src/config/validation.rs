//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{AppConfig, CosyConfig, LogOutput, LoggingConfig, RateLimitConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &CosyConfig) -> ConfigResult<()> {
    validate_app_config(&config.app)?;
    validate_logging_config(&config.logging)?;
    validate_rate_limit_config(&config.rate_limit)?;
    Ok(())
}

fn validate_app_config(app: &AppConfig) -> ConfigResult<()> {
    if app.port == 0 {
        return Err(ConfigError::InvalidPort(app.port));
    }

    if app.host.trim().is_empty() {
        return Err(ConfigError::validation("Host must not be empty"));
    }

    if app.name.trim().is_empty() {
        return Err(ConfigError::validation("Application name must not be empty"));
    }

    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "File log output requires logging.file_path",
        ));
    }

    if let Some(module) = logging.filters.keys().find(|m| m.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Invalid log filter module: {module:?}"
        )));
    }

    Ok(())
}

fn validate_rate_limit_config(rate_limit: &RateLimitConfig) -> ConfigResult<()> {
    if rate_limit.max == 0 {
        return Err(ConfigError::validation(
            "Rate limit max must be greater than 0",
        ));
    }

    if rate_limit.window_secs == 0 {
        return Err(ConfigError::validation(
            "Rate limit window must be greater than 0",
        ));
    }

    Ok(())
}
