//! Configuration validation

use tracing::debug;

use crate::error::{ConfigError, Result};

use super::types::Config;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    debug!("validating configuration");
    validate_registry(config)?;
    validate_timing(config)?;
    validate_crates(config)?;
    debug!("configuration validation passed");
    Ok(())
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

fn validate_registry(config: &Config) -> Result<()> {
    if config.registry.as_deref().is_some_and(|r| r.trim().is_empty()) {
        return Err(invalid("registry", "registry name cannot be empty").into());
    }

    if let Some(index_url) = &config.index_url {
        let url = index_url.trim_start_matches("sparse+");
        if let Err(e) = url::Url::parse(url) {
            return Err(invalid("index_url", format!("not a valid URL: {}", e)).into());
        }
    }

    if config
        .registry_token
        .as_deref()
        .is_some_and(|t| t.trim().is_empty())
    {
        return Err(invalid("registry_token", "token cannot be empty").into());
    }

    Ok(())
}

fn validate_timing(config: &Config) -> Result<()> {
    if config.publish_timeout_secs == 0 {
        return Err(invalid("publish_timeout_secs", "must be greater than zero").into());
    }

    if config.retry.max_attempts == 0 {
        return Err(invalid("retry.max_attempts", "at least one attempt is required").into());
    }

    if config.retry.initial_delay_ms > config.retry.max_delay_ms {
        return Err(invalid(
            "retry.initial_delay_ms",
            "must not exceed retry.max_delay_ms",
        )
        .into());
    }

    if config.poll.initial_interval_ms == 0 {
        return Err(invalid("poll.initial_interval_ms", "must be greater than zero").into());
    }

    if config.poll.initial_interval_ms > config.poll.max_interval_ms {
        return Err(invalid(
            "poll.initial_interval_ms",
            "must not exceed poll.max_interval_ms",
        )
        .into());
    }

    Ok(())
}

fn validate_crates(config: &Config) -> Result<()> {
    for (i, name) in config.exclude_crates.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(invalid(
                format!("exclude_crates[{}]", i),
                "crate name cannot be empty",
            )
            .into());
        }
    }

    for (name, features) in &config.features {
        if features.iter().any(|f| f.trim().is_empty()) {
            return Err(invalid(
                format!("features.{}", name),
                "feature names cannot be empty",
            )
            .into());
        }
    }

    Ok(())
}
