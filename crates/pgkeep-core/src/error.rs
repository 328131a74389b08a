// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for pgkeep.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

/// The primary error type used across all pgkeep components.
#[derive(Debug, Error)]
pub enum PgkeepError {
    /// Bad backup class, selector or host specification.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A dump artifact failed the streaming decompression check, or is empty.
    #[error("integrity check failed for {path}: {reason}")]
    IntegrityCheckFailed { path: String, reason: String },

    /// Selector resolution found no existing, non-empty artifact.
    #[error("backup not found: {0}")]
    BackupNotFound(String),

    /// Copying an artifact between hosts failed.
    #[error("transfer failed: {message}")]
    TransferFailed {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A fail-fast command exited non-zero.
    #[error("command `{command}` failed with exit code {exit_code}: {stderr}")]
    RemoteCommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// A command exceeded its bounded wait and was killed.
    #[error("command `{command}` timed out after {duration:?}")]
    RemoteTimeout { command: String, duration: Duration },

    /// Local filesystem errors.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Configuration errors discovered after loading.
    #[error("configuration error: {0}")]
    Config(String),

    /// Object store errors (upload, download, listing, deletion).
    #[error("object store error: {0}")]
    ObjectStore(String),
}

impl PgkeepError {
    /// Wrap an I/O error with the path it occurred at.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Wrap any error raised while moving an artifact between hosts.
    pub fn transfer(message: impl Into<String>, source: PgkeepError) -> Self {
        Self::TransferFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Stable classification string printed with every user-facing failure.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid-argument",
            Self::IntegrityCheckFailed { .. } => "integrity-check-failed",
            Self::BackupNotFound(_) => "backup-not-found",
            Self::TransferFailed { .. } => "transfer-failed",
            Self::RemoteCommandFailed { .. } => "remote-command-failed",
            Self::RemoteTimeout { .. } => "remote-timeout",
            Self::Io { .. } => "io",
            Self::Config(_) => "config",
            Self::ObjectStore(_) => "object-store",
        }
    }
}
