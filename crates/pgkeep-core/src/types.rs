// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the backup, restore and migration layers.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::PgkeepError;

/// Timestamp layout embedded in artifact file names.
const ARTIFACT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// File extension of every dump artifact (gzip-compressed plain SQL).
pub const ARTIFACT_EXTENSION: &str = ".sql.gz";

// --- Backup classes and retention ---

/// Retention tier of a backup. Every artifact belongs to exactly one class.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BackupClass {
    Hourly,
    Daily,
    Weekly,
}

impl BackupClass {
    /// All classes, shortest retention first.
    pub const ALL: [BackupClass; 3] = [BackupClass::Hourly, BackupClass::Daily, BackupClass::Weekly];

    /// Parse a class name, rejecting anything outside `hourly|daily|weekly`.
    pub fn parse(value: &str) -> Result<Self, PgkeepError> {
        Self::from_str(value).map_err(|_| {
            PgkeepError::InvalidArgument(format!(
                "invalid backup class `{value}` (expected hourly, daily or weekly)"
            ))
        })
    }

    /// Default retention window in days.
    pub fn default_retention_days(self) -> u32 {
        match self {
            BackupClass::Hourly => 1,
            BackupClass::Daily => 7,
            BackupClass::Weekly => 30,
        }
    }
}

/// Mapping from backup class to how long its artifacts are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub hourly: TimeDelta,
    pub daily: TimeDelta,
    pub weekly: TimeDelta,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from_days(
            BackupClass::Hourly.default_retention_days(),
            BackupClass::Daily.default_retention_days(),
            BackupClass::Weekly.default_retention_days(),
        )
    }
}

impl RetentionPolicy {
    /// Build a policy from per-class windows expressed in days.
    pub fn from_days(hourly: u32, daily: u32, weekly: u32) -> Self {
        Self {
            hourly: TimeDelta::days(i64::from(hourly)),
            daily: TimeDelta::days(i64::from(daily)),
            weekly: TimeDelta::days(i64::from(weekly)),
        }
    }

    /// Retention window for a class.
    pub fn window(&self, class: BackupClass) -> TimeDelta {
        match class {
            BackupClass::Hourly => self.hourly,
            BackupClass::Daily => self.daily,
            BackupClass::Weekly => self.weekly,
        }
    }

    /// Whether an artifact created at `created_at` is strictly older than its window.
    pub fn is_expired(&self, class: BackupClass, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - created_at > self.window(class)
    }
}

// --- Artifacts ---

/// Where an artifact lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    /// A file on the local filesystem.
    Local(PathBuf),
    /// An object-store key of the form `<class>/<filename>`.
    Remote(String),
}

impl fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactLocation::Local(path) => write!(f, "{}", path.display()),
            ArtifactLocation::Remote(key) => write!(f, "{key}"),
        }
    }
}

/// A compressed database dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub class: BackupClass,
    pub created_at: DateTime<Utc>,
    pub location: ArtifactLocation,
    pub size_bytes: u64,
    pub checksum_valid: bool,
}

impl BackupArtifact {
    /// File name for an artifact of `class` created at `created_at`.
    ///
    /// Example: `backup_daily_20260114_030000.sql.gz`.
    pub fn file_name_for(class: BackupClass, created_at: DateTime<Utc>) -> String {
        format!(
            "backup_{class}_{}{ARTIFACT_EXTENSION}",
            created_at.format(ARTIFACT_TIMESTAMP_FORMAT)
        )
    }

    /// Recover class and creation time from an artifact file name (or key).
    ///
    /// Anything before the last `/` is ignored. Returns `None` for names that
    /// were not produced by [`BackupArtifact::file_name_for`].
    pub fn parse_file_name(name: &str) -> Option<(BackupClass, DateTime<Utc>)> {
        let base = name.rsplit('/').next()?;
        let stem = base.strip_prefix("backup_")?.strip_suffix(ARTIFACT_EXTENSION)?;
        let (class, stamp) = stem.split_once('_')?;
        let class = BackupClass::from_str(class).ok()?;
        let created = NaiveDateTime::parse_from_str(stamp, ARTIFACT_TIMESTAMP_FORMAT).ok()?;
        Some((class, created.and_utc()))
    }

    /// Describe an existing local file as an artifact, if its name parses.
    pub fn from_local_path(path: &Path, size_bytes: u64) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let (class, created_at) = Self::parse_file_name(name)?;
        Some(Self {
            class,
            created_at,
            location: ArtifactLocation::Local(path.to_path_buf()),
            size_bytes,
            checksum_valid: false,
        })
    }

    /// Object-store key for this artifact: `<class>/<filename>`.
    pub fn object_key(&self) -> String {
        format!(
            "{}/{}",
            self.class,
            Self::file_name_for(self.class, self.created_at)
        )
    }

    /// Local path, if the artifact is stored locally.
    pub fn local_path(&self) -> Option<&Path> {
        match &self.location {
            ArtifactLocation::Local(path) => Some(path),
            ArtifactLocation::Remote(_) => None,
        }
    }
}

// --- Selectors ---

/// What the operator asked `restore` to act on, parsed once at the CLI boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// No argument: list available backups, restore nothing.
    List,
    /// Newest artifact of a class (`latest` means `latest:daily`).
    Latest(BackupClass),
    /// An object-store URI (`s3://bucket/key`), downloaded before use.
    RemoteUri(String),
    /// A literal local path.
    LocalPath(PathBuf),
}

impl Selector {
    /// Parse the optional positional argument of `restore`.
    pub fn parse(input: Option<&str>) -> Result<Self, PgkeepError> {
        let input = match input.map(str::trim) {
            None | Some("") => return Ok(Selector::List),
            Some(s) => s,
        };

        if input == "latest" {
            return Ok(Selector::Latest(BackupClass::Daily));
        }
        if let Some(class) = input.strip_prefix("latest:") {
            return Ok(Selector::Latest(BackupClass::parse(class)?));
        }
        if input.starts_with("s3://") {
            return Ok(Selector::RemoteUri(input.to_string()));
        }
        Ok(Selector::LocalPath(PathBuf::from(input)))
    }
}

// --- Remote endpoints ---

/// A host reachable over SSH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub host: String,
    pub user: String,
    pub port: u16,
    /// Private key passed to `ssh -i`. `None` defers to the SSH agent.
    pub identity_file: Option<PathBuf>,
    /// Directory holding the deployed application and its compose file.
    pub app_dir: Option<String>,
}

impl RemoteEndpoint {
    /// Parse `[user@]host[:port]`, filling in defaults for missing parts.
    pub fn parse(spec: &str, default_user: &str, default_port: u16) -> Result<Self, PgkeepError> {
        let spec = spec.trim();
        let (user, rest) = match spec.split_once('@') {
            Some((user, rest)) => (user.to_string(), rest),
            None => (default_user.to_string(), spec),
        };
        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    PgkeepError::InvalidArgument(format!("invalid port in host `{spec}`"))
                })?;
                (host.to_string(), port)
            }
            None => (rest.to_string(), default_port),
        };

        if host.is_empty() || user.is_empty() || host.chars().any(char::is_whitespace) {
            return Err(PgkeepError::InvalidArgument(format!(
                "invalid host `{spec}` (expected [user@]host[:port])"
            )));
        }

        Ok(Self {
            host,
            user,
            port,
            identity_file: None,
            app_dir: None,
        })
    }

    pub fn with_identity_file(mut self, path: Option<PathBuf>) -> Self {
        self.identity_file = path;
        self
    }

    pub fn with_app_dir(mut self, dir: Option<String>) -> Self {
        self.app_dir = dir;
        self
    }

    /// `user@host`, as understood by `ssh` and `scp`.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

impl fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.destination())
    }
}

// --- Commands ---

/// Where a command executes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Target {
    #[default]
    Local,
    Remote(RemoteEndpoint),
}

/// A fully described external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment. Values are never logged.
    pub env: Vec<(String, String)>,
    pub target: Target,
    pub workdir: Option<String>,
    /// Non-zero exit is logged as a warning instead of failing the caller.
    pub best_effort: bool,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            target: Target::Local,
            workdir: None,
            best_effort: false,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn on(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    pub fn in_dir(mut self, dir: Option<String>) -> Self {
        self.workdir = dir;
        self
    }

    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program and arguments joined by spaces, for logs and error messages.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Target::Local => write!(f, "{}", self.command_line()),
            Target::Remote(endpoint) => write!(f, "[{endpoint}] {}", self.command_line()),
        }
    }
}

/// Result of running a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Non-zero exit of a command that was not marked best-effort.
    pub fatal: bool,
}

impl Outcome {
    /// Build an outcome, deciding fatality from the spec's best-effort flag.
    pub fn from_exit(spec: &CommandSpec, exit_code: i32, stdout: String, stderr: String) -> Self {
        Self {
            command: spec.to_string(),
            exit_code,
            stdout,
            stderr,
            fatal: exit_code != 0 && !spec.best_effort,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turn a fatal outcome into `RemoteCommandFailed`; pass everything else through.
    pub fn into_result(self) -> Result<Outcome, PgkeepError> {
        if self.fatal {
            return Err(PgkeepError::RemoteCommandFailed {
                command: self.command,
                exit_code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            });
        }
        Ok(self)
    }
}
