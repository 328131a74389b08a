// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::PgkeepConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &PgkeepConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.general.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "general.log_level `{}` must be one of {}",
            config.general.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    if config.database.user.trim().is_empty() {
        errors.push(ConfigError::validation("database.user must not be empty"));
    }
    if config.database.name.trim().is_empty() {
        errors.push(ConfigError::validation("database.name must not be empty"));
    }
    if let Some(service) = &config.database.compose_service
        && service.trim().is_empty()
    {
        errors.push(ConfigError::validation(
            "database.compose_service must not be empty when set",
        ));
    }

    if config.backup.dir.trim().is_empty() {
        errors.push(ConfigError::validation("backup.dir must not be empty"));
    }

    for (key, days) in [
        ("hourly_days", config.retention.hourly_days),
        ("daily_days", config.retention.daily_days),
        ("weekly_days", config.retention.weekly_days),
    ] {
        if days < 1 {
            errors.push(ConfigError::validation(format!(
                "retention.{key} must be at least 1, got {days}"
            )));
        }
    }

    // Object store credentials are all-or-nothing.
    let store = &config.object_store;
    let any_set = store.access_key.is_some() || store.secret_key.is_some() || store.bucket.is_some();
    if any_set && !store.is_configured() {
        errors.push(ConfigError::validation(
            "object_store requires access_key, secret_key and bucket together",
        ));
    }

    if config.ssh.port == 0 {
        errors.push(ConfigError::validation("ssh.port must not be 0"));
    }
    if config.ssh.connect_timeout_secs < 1 {
        errors.push(ConfigError::validation(
            "ssh.connect_timeout_secs must be at least 1",
        ));
    }
    if config.ssh.command_timeout_secs < 1 {
        errors.push(ConfigError::validation(
            "ssh.command_timeout_secs must be at least 1",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
