// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `./pgkeep.toml` > `~/.config/pgkeep/pgkeep.toml` > `/etc/pgkeep/pgkeep.toml`,
//! with environment variable overrides via the `PGKEEP_` prefix on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::PgkeepConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/pgkeep/pgkeep.toml";

/// Config file in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "pgkeep.toml";

/// Top-level sections, used to map `PGKEEP_<SECTION>_<KEY>` to `section.key`.
///
/// `object_store` contains an underscore, so prefixes are matched whole
/// rather than split on `_`.
const SECTIONS: &[&str] = &[
    "general",
    "database",
    "backup",
    "retention",
    "object_store",
    "ssh",
    "app",
];

/// Load configuration from the standard file hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/pgkeep/pgkeep.toml`
/// 3. `~/.config/pgkeep/pgkeep.toml`
/// 4. `./pgkeep.toml`
/// 5. `PGKEEP_*` environment variables
pub fn load_config() -> Result<PgkeepConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<PgkeepConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PgkeepConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file (`--config`) with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PgkeepConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PgkeepConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment for the standard hierarchy without extracting it.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new()
        .merge(Serialized::defaults(PgkeepConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH));
    if let Some(user_config) = user_config_path() {
        figment = figment.merge(Toml::file(user_config));
    }
    figment.merge(Toml::file(LOCAL_CONFIG_FILE)).merge(env_provider())
}

/// `~/.config/pgkeep/pgkeep.toml`, when a config dir exists on this platform.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pgkeep").join("pgkeep.toml"))
}

/// Environment provider: `PGKEEP_DATABASE_USER` -> `database.user`,
/// `PGKEEP_OBJECT_STORE_SECRET_KEY` -> `object_store.secret_key`.
fn env_provider() -> Env {
    Env::prefixed("PGKEEP_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a prefix-stripped env key onto its dotted config path.
///
/// Figment hands over keys in their original case, so matching is done on
/// the lowercased key.
pub fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(field) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{field}");
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("database_user"), "database.user");
        assert_eq!(map_env_key("object_store_secret_key"), "object_store.secret_key");
        assert_eq!(map_env_key("ssh_remote_app_dir"), "ssh.remote_app_dir");
        assert_eq!(map_env_key("retention_hourly_days"), "retention.hourly_days");
        assert_eq!(map_env_key("general_log_level"), "general.log_level");
    }

    #[test]
    fn env_keys_are_matched_case_insensitively() {
        assert_eq!(map_env_key("DATABASE_USER"), "database.user");
        assert_eq!(map_env_key("OBJECT_STORE_ACCESS_KEY"), "object_store.access_key");
        assert_eq!(map_env_key("Ssh_Port"), "ssh.port");
    }

    #[test]
    fn unknown_env_keys_pass_through() {
        assert_eq!(map_env_key("mystery"), "mystery");
    }
}
