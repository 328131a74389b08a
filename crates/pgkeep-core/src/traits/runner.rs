// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command runner trait: the leaf every external tool invocation goes through.

use std::io::{Read, Write};

use async_trait::async_trait;

use crate::error::PgkeepError;
use crate::types::{CommandSpec, Outcome};

/// Executes external processes locally or on a remote host.
///
/// Implementations return `Err` only when the process could not be run at
/// all (spawn failure, timeout). A non-zero exit is reported through
/// [`Outcome::fatal`], which callers turn into an error with
/// [`Outcome::into_result`] or the `*_checked` helpers.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion, capturing stdout and stderr.
    async fn run(&self, spec: &CommandSpec) -> Result<Outcome, PgkeepError>;

    /// Run with stdout streamed into `sink` instead of captured.
    async fn run_to_writer(
        &self,
        spec: &CommandSpec,
        sink: &mut (dyn Write + Send),
    ) -> Result<Outcome, PgkeepError>;

    /// Run with stdin fed from `source` until EOF.
    async fn run_from_reader(
        &self,
        spec: &CommandSpec,
        source: &mut (dyn Read + Send),
    ) -> Result<Outcome, PgkeepError>;

    /// [`CommandRunner::run`], failing on a fatal outcome.
    async fn run_checked(&self, spec: &CommandSpec) -> Result<Outcome, PgkeepError> {
        self.run(spec).await?.into_result()
    }
}
