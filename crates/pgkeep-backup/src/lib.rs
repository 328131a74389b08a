// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backup and restore engines for pgkeep.
//!
//! The engines hold the policy (staging, verification, upload, retention,
//! safety gates) and talk to the database machine only through the
//! [`pgkeep_core::Host`] trait. [`DbHost`] is the production host: it turns
//! each operation into `pg_dump`/`psql`/`docker compose` invocations on the
//! local machine or over SSH.

pub mod artifact;
pub mod catalog;
pub mod engine;
pub mod host;
pub mod retention;
pub mod store;

pub use engine::backup::{dump_verified, BackupEngine, BackupReport};
pub use engine::restore::{apply_artifact, Resolution, RestoreEngine, RestoreOutcome, RestoreResult};
pub use host::{DbHost, DbSettings};
pub use store::S3CmdStore;
