// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock command runner for checking how commands are composed.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use pgkeep_core::{CommandRunner, CommandSpec, Outcome, PgkeepError};

#[derive(Debug, Clone, Default)]
struct Response {
    exit_code: i32,
    stdout: String,
    stderr: String,
}

/// Records every [`CommandSpec`] it is handed and answers with a canned
/// outcome per program. Programs without a response exit 0 silently.
#[derive(Default)]
pub struct RecordingRunner {
    responses: Mutex<HashMap<String, Response>>,
    specs: Mutex<Vec<CommandSpec>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer future invocations of `program` with this outcome.
    pub fn respond(&self, program: &str, exit_code: i32, stdout: &str, stderr: &str) {
        lock(&self.responses).insert(
            program.to_string(),
            Response {
                exit_code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        );
    }

    /// Every spec run so far, in order.
    pub fn specs(&self) -> Vec<CommandSpec> {
        lock(&self.specs).clone()
    }

    fn record(&self, spec: &CommandSpec) -> Outcome {
        lock(&self.specs).push(spec.clone());
        let response = lock(&self.responses)
            .get(&spec.program)
            .cloned()
            .unwrap_or_default();
        Outcome::from_exit(spec, response.exit_code, response.stdout, response.stderr)
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<Outcome, PgkeepError> {
        Ok(self.record(spec))
    }

    async fn run_to_writer(
        &self,
        spec: &CommandSpec,
        sink: &mut (dyn Write + Send),
    ) -> Result<Outcome, PgkeepError> {
        let mut outcome = self.record(spec);
        sink.write_all(outcome.stdout.as_bytes())
            .map_err(|e| PgkeepError::io("<sink>", e))?;
        outcome.stdout.clear();
        Ok(outcome)
    }

    async fn run_from_reader(
        &self,
        spec: &CommandSpec,
        source: &mut (dyn Read + Send),
    ) -> Result<Outcome, PgkeepError> {
        io::copy(source, &mut io::sink()).map_err(|e| PgkeepError::io("<source>", e))?;
        Ok(self.record(spec))
    }
}
