// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Host trait: a machine that runs the application database.

use std::path::Path;

use async_trait::async_trait;

use crate::error::PgkeepError;

/// A machine holding the PostgreSQL instance and the application stack.
///
/// Paths passed to the file operations are interpreted on that machine.
/// `download` and `upload` move files between the host and the machine
/// pgkeep runs on.
#[async_trait]
pub trait Host: Send + Sync {
    /// Human-readable name for logs (`local` or `user@host`).
    fn label(&self) -> String;

    /// Dump the database compressed at creation time into `path`.
    async fn dump_to(&self, path: &Path) -> Result<(), PgkeepError>;

    /// Apply a compressed dump at `path` to the database.
    async fn apply_dump(&self, path: &Path) -> Result<(), PgkeepError>;

    /// Number of tables in the `public` schema.
    async fn count_tables(&self) -> Result<u64, PgkeepError>;

    /// Stop dependent application services. Never fails on already-stopped services.
    async fn stop_services(&self) -> Result<(), PgkeepError>;

    /// Start dependent application services.
    async fn start_services(&self) -> Result<(), PgkeepError>;

    /// Take the whole application stack down.
    async fn stop_stack(&self) -> Result<(), PgkeepError>;

    /// Size of a file, `None` if it does not exist.
    async fn file_size(&self, path: &Path) -> Result<Option<u64>, PgkeepError>;

    /// Streaming decompression check of a compressed dump.
    async fn verify_artifact(&self, path: &Path) -> Result<(), PgkeepError>;

    async fn remove_file(&self, path: &Path) -> Result<(), PgkeepError>;

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), PgkeepError>;

    /// Copy `remote` on this host to `local` on the controlling machine.
    async fn download(&self, remote: &Path, local: &Path) -> Result<(), PgkeepError>;

    /// Copy `local` on the controlling machine to `remote` on this host.
    async fn upload(&self, local: &Path, remote: &Path) -> Result<(), PgkeepError>;
}
