// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for pgkeep.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;
use std::time::Duration;

use pgkeep_core::{BackupClass, RetentionPolicy};
use serde::{Deserialize, Serialize};

/// Top-level pgkeep configuration.
///
/// Built once at startup from TOML files and `PGKEEP_*` environment
/// variables, then passed by reference to every component.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PgkeepConfig {
    /// Logging and general behavior.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Target database credentials and access method.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Local backup storage layout.
    #[serde(default)]
    pub backup: BackupConfig,

    /// Per-class retention windows.
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Optional off-host object storage.
    #[serde(default)]
    pub object_store: ObjectStoreConfig,

    /// Remote shell settings for migration and decommission.
    #[serde(default)]
    pub ssh: SshConfig,

    /// The application stack that depends on the database.
    #[serde(default)]
    pub app: AppConfig,
}

/// General settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Database access configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Role used by `pg_dump` and `psql`.
    #[serde(default = "default_db_user")]
    pub user: String,

    /// Database name.
    #[serde(default = "default_db_name")]
    pub name: String,

    /// Password exported as `PGPASSWORD`. `None` relies on trust/peer auth.
    #[serde(default)]
    pub password: Option<String>,

    /// Compose service running PostgreSQL. When set, tools run through
    /// `docker compose exec -T <service>`; when `None`, they run directly
    /// against `host`/`port`.
    #[serde(default = "default_compose_service")]
    pub compose_service: Option<String>,

    /// Server host for direct access.
    #[serde(default = "default_db_host")]
    pub host: String,

    /// Server port for direct access.
    #[serde(default = "default_db_port")]
    pub port: u16,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            user: default_db_user(),
            name: default_db_name(),
            password: None,
            compose_service: default_compose_service(),
            host: default_db_host(),
            port: default_db_port(),
        }
    }
}

fn default_db_user() -> String {
    "postgres".to_string()
}

fn default_db_name() -> String {
    "app".to_string()
}

fn default_compose_service() -> Option<String> {
    Some("db".to_string())
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

/// Local backup storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackupConfig {
    /// Root directory; artifacts live in `<dir>/<class>/`.
    #[serde(default = "default_backup_dir")]
    pub dir: String,

    /// Scratch directory for downloads and migration hops.
    /// Defaults to `<dir>/staging`.
    #[serde(default)]
    pub staging_dir: Option<String>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: default_backup_dir(),
            staging_dir: None,
        }
    }
}

impl BackupConfig {
    /// Resolved staging directory.
    pub fn staging_path(&self) -> PathBuf {
        match &self.staging_dir {
            Some(dir) => PathBuf::from(dir),
            None => PathBuf::from(&self.dir).join("staging"),
        }
    }
}

fn default_backup_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("pgkeep").join("backups"))
        .unwrap_or_else(|| PathBuf::from("backups"))
        .to_string_lossy()
        .to_string()
}

/// Retention windows, in days.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    #[serde(default = "default_hourly_days")]
    pub hourly_days: u32,

    #[serde(default = "default_daily_days")]
    pub daily_days: u32,

    #[serde(default = "default_weekly_days")]
    pub weekly_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            hourly_days: default_hourly_days(),
            daily_days: default_daily_days(),
            weekly_days: default_weekly_days(),
        }
    }
}

impl RetentionConfig {
    pub fn policy(&self) -> RetentionPolicy {
        RetentionPolicy::from_days(self.hourly_days, self.daily_days, self.weekly_days)
    }
}

fn default_hourly_days() -> u32 {
    BackupClass::Hourly.default_retention_days()
}

fn default_daily_days() -> u32 {
    BackupClass::Daily.default_retention_days()
}

fn default_weekly_days() -> u32 {
    BackupClass::Weekly.default_retention_days()
}

/// S3-compatible object store configuration.
///
/// Upload and remote retention are enabled only when `access_key`,
/// `secret_key` and `bucket` are all set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectStoreConfig {
    #[serde(default)]
    pub access_key: Option<String>,

    #[serde(default)]
    pub secret_key: Option<String>,

    #[serde(default)]
    pub bucket: Option<String>,

    /// Region used to derive the endpoint host.
    #[serde(default = "default_region")]
    pub region: String,

    /// Explicit endpoint host, overriding the region-derived one.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            access_key: None,
            secret_key: None,
            bucket: None,
            region: default_region(),
            endpoint: None,
        }
    }
}

impl ObjectStoreConfig {
    /// `(bucket, access_key, secret_key)` when all three are set.
    pub fn credentials(&self) -> Option<(&str, &str, &str)> {
        match (
            self.bucket.as_deref(),
            self.access_key.as_deref(),
            self.secret_key.as_deref(),
        ) {
            (Some(bucket), Some(access), Some(secret)) => Some((bucket, access, secret)),
            _ => None,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials().is_some()
    }

    /// Endpoint host: explicit `endpoint`, else `<region>.digitaloceanspaces.com`.
    pub fn endpoint_host(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("{}.digitaloceanspaces.com", self.region),
        }
    }
}

fn default_region() -> String {
    "fra1".to_string()
}

/// Remote shell configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SshConfig {
    /// Login used when a host is given without `user@`.
    #[serde(default = "default_ssh_user")]
    pub user: String,

    /// Private key passed to `ssh -i` / `scp -i`.
    #[serde(default)]
    pub identity_file: Option<String>,

    /// Port used when a host is given without `:port`.
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Upper bound on any single remote command or transfer.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Application directory on remote hosts (holds the compose file).
    #[serde(default)]
    pub remote_app_dir: Option<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: default_ssh_user(),
            identity_file: None,
            port: default_ssh_port(),
            connect_timeout_secs: default_connect_timeout_secs(),
            command_timeout_secs: default_command_timeout_secs(),
            remote_app_dir: None,
        }
    }
}

impl SshConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

fn default_ssh_user() -> String {
    "root".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_command_timeout_secs() -> u64 {
    3600
}

/// Application stack configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Local directory holding the compose file. `None` uses the current directory.
    #[serde(default)]
    pub compose_dir: Option<String>,

    /// Compose services stopped during a restore.
    #[serde(default = "default_services")]
    pub services: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            compose_dir: None,
            services: default_services(),
        }
    }
}

fn default_services() -> Vec<String> {
    vec!["web".to_string(), "worker".to_string()]
}
