// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for pgkeep.
//!
//! TOML files and `PGKEEP_*` environment variables are merged with Figment
//! into one immutable [`PgkeepConfig`], validated once at startup. Unknown
//! keys are rejected (`deny_unknown_fields`) and rendered as miette
//! diagnostics with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use pgkeep_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("backups in {}", config.backup.dir);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::PgkeepConfig;

/// Load configuration from the standard hierarchy and validate it.
pub fn load_and_validate() -> Result<PgkeepConfig, Vec<ConfigError>> {
    finish(loader::load_config(), collect_toml_sources())
}

/// Load configuration from an explicit file (plus env overrides) and validate it.
pub fn load_and_validate_from(path: &Path) -> Result<PgkeepConfig, Vec<ConfigError>> {
    let sources = read_source(path).into_iter().collect();
    finish(loader::load_config_from_path(path), sources)
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<PgkeepConfig, Vec<ConfigError>> {
    let sources = vec![("<inline>".to_string(), toml_content.to_string())];
    finish(loader::load_config_from_str(toml_content), sources)
}

fn finish(
    loaded: Result<PgkeepConfig, figment::Error>,
    sources: Vec<(String, String)>,
) -> Result<PgkeepConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources)),
    }
}

/// Collect the contents of every config file in the hierarchy for error spans.
fn collect_toml_sources() -> Vec<(String, String)> {
    let local = std::env::current_dir()
        .map(|d| d.join(loader::LOCAL_CONFIG_FILE))
        .unwrap_or_else(|_| loader::LOCAL_CONFIG_FILE.into());

    [
        Some(local),
        loader::user_config_path(),
        Some(loader::SYSTEM_CONFIG_PATH.into()),
    ]
    .into_iter()
    .flatten()
    .filter_map(|path| read_source(&path))
    .collect()
}

fn read_source(path: &Path) -> Option<(String, String)> {
    std::fs::read_to_string(path)
        .ok()
        .map(|content| (path.display().to_string(), content))
}
