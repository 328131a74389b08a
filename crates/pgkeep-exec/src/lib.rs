// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command execution for pgkeep.
//!
//! [`ProcessRunner`] is the production [`pgkeep_core::CommandRunner`]: it
//! spawns processes locally or wraps them in `ssh` for remote targets,
//! captures or streams their output, and enforces bounded waits. The
//! [`ssh`] module holds the quoting and `ssh`/`scp` argument builders.

pub mod process;
pub mod ssh;

pub use process::ProcessRunner;
pub use ssh::SshOptions;
