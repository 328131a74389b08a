// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-backed command runner.
//!
//! Every invocation is logged before it starts. Remote targets are wrapped
//! in `ssh` and always run under a bounded wait; a command that exceeds it
//! is killed (`kill_on_drop`) and reported as `RemoteTimeout`. Environment
//! for a remote command is written to its stdin, never to its arguments.

use std::future::Future;
use std::io::{Read, Write};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use pgkeep_core::{CommandRunner, CommandSpec, Outcome, PgkeepError, Target};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, error, info, warn};

use crate::ssh::{self, SshOptions};

/// Chunk size for streaming dumps through a process.
const STREAM_CHUNK: usize = 64 * 1024;

/// Runs commands as child processes, locally or over `ssh`.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    ssh: SshOptions,
}

impl ProcessRunner {
    pub fn new(ssh: SshOptions) -> Self {
        Self { ssh }
    }

    fn command(&self, spec: &CommandSpec) -> Command {
        let mut cmd = match &spec.target {
            Target::Local => {
                let mut cmd = Command::new(&spec.program);
                cmd.args(&spec.args);
                cmd.envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
                if let Some(dir) = &spec.workdir {
                    cmd.current_dir(dir);
                }
                cmd
            }
            Target::Remote(endpoint) => {
                let mut cmd = Command::new("ssh");
                cmd.args(ssh::ssh_args(endpoint, &self.ssh, spec));
                cmd
            }
        };
        let stdin = if remote_env(spec) { Stdio::piped() } else { Stdio::null() };
        cmd.kill_on_drop(true)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    /// Explicit timeout, else the SSH default for remote targets, else none.
    fn deadline(&self, spec: &CommandSpec) -> Option<Duration> {
        spec.timeout.or(match spec.target {
            Target::Remote(_) => Some(self.ssh.command_timeout),
            Target::Local => None,
        })
    }

    async fn bounded<T>(
        &self,
        spec: &CommandSpec,
        work: impl Future<Output = Result<T, PgkeepError>>,
    ) -> Result<T, PgkeepError> {
        match self.deadline(spec) {
            Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
                error!(command = %spec, timeout = ?limit, "command timed out");
                PgkeepError::RemoteTimeout {
                    command: spec.to_string(),
                    duration: limit,
                }
            })?,
            None => work.await,
        }
    }

    fn spawn(&self, mut cmd: Command, spec: &CommandSpec) -> Result<Child, PgkeepError> {
        cmd.spawn().map_err(|e| spawn_error(spec, e))
    }
}

fn remote_env(spec: &CommandSpec) -> bool {
    matches!(spec.target, Target::Remote(_)) && !spec.env.is_empty()
}

/// Lines the remote shell reads into its environment before running the command.
fn env_input(spec: &CommandSpec) -> Result<Vec<u8>, PgkeepError> {
    if remote_env(spec) {
        ssh::env_preamble(spec)
    } else {
        Ok(Vec::new())
    }
}

async fn write_stdin(
    stdin: &mut ChildStdin,
    spec: &CommandSpec,
    bytes: &[u8],
) -> Result<(), PgkeepError> {
    match stdin.write_all(bytes).await {
        Ok(()) => Ok(()),
        // The child exited early; its status tells why.
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(e) => Err(PgkeepError::io(format!("`{}` stdin", spec.program), e)),
    }
}

/// Send the preamble and close stdin.
async fn send_preamble(child: &mut Child, spec: &CommandSpec, preamble: &[u8]) -> Result<(), PgkeepError> {
    if let Some(mut stdin) = child.stdin.take() {
        write_stdin(&mut stdin, spec, preamble).await?;
        let _ = stdin.shutdown().await;
    }
    Ok(())
}

fn spawn_error(spec: &CommandSpec, e: std::io::Error) -> PgkeepError {
    PgkeepError::io(format!("spawning `{}`", spec.program), e)
}

fn exit_code(status: ExitStatus) -> i32 {
    // Killed by a signal: no code.
    status.code().unwrap_or(-1)
}

fn announce(spec: &CommandSpec) {
    info!(command = %spec, best_effort = spec.best_effort, "running command");
}

fn report(outcome: &Outcome) {
    if outcome.fatal {
        error!(
            command = %outcome.command,
            exit_code = outcome.exit_code,
            stderr = %outcome.stderr.trim(),
            "command failed"
        );
    } else if !outcome.success() {
        warn!(
            command = %outcome.command,
            exit_code = outcome.exit_code,
            stderr = %outcome.stderr.trim(),
            "best-effort command failed, continuing"
        );
    } else {
        debug!(command = %outcome.command, "command succeeded");
    }
}

async fn read_all(mut stream: impl AsyncRead + Unpin) -> String {
    let mut buf = Vec::new();
    // A read error only truncates the diagnostic text.
    let _ = stream.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

fn missing_pipe(spec: &CommandSpec, which: &str) -> PgkeepError {
    PgkeepError::io(
        format!("`{}` {which}", spec.program),
        std::io::Error::other("pipe not captured"),
    )
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<Outcome, PgkeepError> {
        announce(spec);
        let preamble = env_input(spec)?;
        let cmd = self.command(spec);
        let outcome = self
            .bounded(spec, async {
                let mut child = self.spawn(cmd, spec)?;
                send_preamble(&mut child, spec, &preamble).await?;
                let output = child
                    .wait_with_output()
                    .await
                    .map_err(|e| spawn_error(spec, e))?;
                Ok(Outcome::from_exit(
                    spec,
                    exit_code(output.status),
                    String::from_utf8_lossy(&output.stdout).into_owned(),
                    String::from_utf8_lossy(&output.stderr).into_owned(),
                ))
            })
            .await?;
        report(&outcome);
        Ok(outcome)
    }

    async fn run_to_writer(
        &self,
        spec: &CommandSpec,
        sink: &mut (dyn Write + Send),
    ) -> Result<Outcome, PgkeepError> {
        announce(spec);
        let preamble = env_input(spec)?;
        let cmd = self.command(spec);
        let outcome = self
            .bounded(spec, async {
                let mut child = self.spawn(cmd, spec)?;
                send_preamble(&mut child, spec, &preamble).await?;
                let mut stdout = child.stdout.take().ok_or_else(|| missing_pipe(spec, "stdout"))?;
                let stderr = child.stderr.take().ok_or_else(|| missing_pipe(spec, "stderr"))?;

                let copy = async {
                    let mut buf = vec![0u8; STREAM_CHUNK];
                    let result = async {
                        loop {
                            let n = stdout
                                .read(&mut buf)
                                .await
                                .map_err(|e| PgkeepError::io(format!("`{}` stdout", spec.program), e))?;
                            if n == 0 {
                                break;
                            }
                            sink.write_all(&buf[..n])
                                .map_err(|e| PgkeepError::io("output sink", e))?;
                        }
                        sink.flush().map_err(|e| PgkeepError::io("output sink", e))
                    }
                    .await;
                    if result.is_err() {
                        let _ = child.start_kill();
                    }
                    result
                };
                let (copied, stderr) = tokio::join!(copy, read_all(stderr));
                copied?;

                let status = child.wait().await.map_err(|e| spawn_error(spec, e))?;
                Ok(Outcome::from_exit(spec, exit_code(status), String::new(), stderr))
            })
            .await?;
        report(&outcome);
        Ok(outcome)
    }

    async fn run_from_reader(
        &self,
        spec: &CommandSpec,
        source: &mut (dyn Read + Send),
    ) -> Result<Outcome, PgkeepError> {
        announce(spec);
        let preamble = env_input(spec)?;
        let mut cmd = self.command(spec);
        cmd.stdin(Stdio::piped());
        let outcome = self
            .bounded(spec, async {
                let mut child = self.spawn(cmd, spec)?;
                let mut stdin = child.stdin.take().ok_or_else(|| missing_pipe(spec, "stdin"))?;
                let stdout = child.stdout.take().ok_or_else(|| missing_pipe(spec, "stdout"))?;
                let stderr = child.stderr.take().ok_or_else(|| missing_pipe(spec, "stderr"))?;

                let feed = async {
                    let mut buf = vec![0u8; STREAM_CHUNK];
                    let result = async {
                        write_stdin(&mut stdin, spec, &preamble).await?;
                        loop {
                            let n = source
                                .read(&mut buf)
                                .map_err(|e| PgkeepError::io("input source", e))?;
                            if n == 0 {
                                return Ok(());
                            }
                            match stdin.write_all(&buf[..n]).await {
                                Ok(()) => {}
                                // The child exited early; its status tells why.
                                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
                                Err(e) => {
                                    return Err(PgkeepError::io(
                                        format!("`{}` stdin", spec.program),
                                        e,
                                    ));
                                }
                            }
                        }
                    }
                    .await;
                    // Kill before the pipe closes so a half-fed child never sees a clean EOF.
                    if result.is_err() {
                        let _ = child.start_kill();
                    }
                    let _ = stdin.shutdown().await;
                    drop(stdin);
                    result
                };
                let (fed, stdout, stderr) = tokio::join!(feed, read_all(stdout), read_all(stderr));
                fed?;

                let status = child.wait().await.map_err(|e| spawn_error(spec, e))?;
                Ok(Outcome::from_exit(spec, exit_code(status), stdout, stderr))
            })
            .await?;
        report(&outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").args(["-c", script])
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let runner = ProcessRunner::default();
        let outcome = runner.run(&sh("echo hello; echo oops >&2")).await.unwrap();
        assert!(outcome.success());
        assert!(!outcome.fatal);
        assert_eq!(outcome.stdout.trim(), "hello");
        assert_eq!(outcome.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn nonzero_exit_is_fatal_by_default() {
        let runner = ProcessRunner::default();
        let outcome = runner.run(&sh("echo broken >&2; exit 3")).await.unwrap();
        assert_eq!(outcome.exit_code, 3);
        assert!(outcome.fatal);

        let err = runner.run_checked(&sh("exit 3")).await.unwrap_err();
        assert!(matches!(err, PgkeepError::RemoteCommandFailed { exit_code: 3, .. }));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn best_effort_failure_is_not_fatal() {
        let runner = ProcessRunner::default();
        let outcome = runner.run(&sh("exit 1").best_effort()).await.unwrap();
        assert!(!outcome.fatal);
        assert!(runner.run_checked(&sh("exit 1").best_effort()).await.is_ok());
        assert!(logs_contain("best-effort command failed"));
    }

    #[tokio::test]
    async fn env_and_workdir_are_applied() {
        let dir = std::env::temp_dir();
        let runner = ProcessRunner::default();
        let spec = sh("echo $PGKEEP_TEST_VALUE; pwd")
            .env("PGKEEP_TEST_VALUE", "42")
            .in_dir(Some(dir.display().to_string()));
        let outcome = runner.run_checked(&spec).await.unwrap();
        let mut lines = outcome.stdout.lines();
        assert_eq!(lines.next(), Some("42"));
        assert!(lines.next().is_some());
    }

    #[tokio::test]
    async fn missing_program_is_an_error() {
        let runner = ProcessRunner::default();
        let err = runner
            .run(&CommandSpec::new("pgkeep-definitely-not-installed"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "io");
    }

    #[tokio::test]
    async fn timeout_kills_the_command() {
        let runner = ProcessRunner::default();
        let spec = sh("sleep 5").timeout(Some(Duration::from_millis(100)));
        let started = std::time::Instant::now();
        let err = runner.run(&spec).await.unwrap_err();
        assert!(matches!(err, PgkeepError::RemoteTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn streams_stdout_into_writer() {
        let runner = ProcessRunner::default();
        let mut sink = Vec::new();
        let outcome = runner
            .run_to_writer(&sh("printf 'line1\\nline2\\n'"), &mut sink)
            .await
            .unwrap();
        assert!(outcome.success());
        assert_eq!(String::from_utf8(sink).unwrap(), "line1\nline2\n");
    }

    #[tokio::test]
    async fn feeds_stdin_from_reader() {
        let runner = ProcessRunner::default();
        let mut source: &[u8] = b"alpha\nbeta\ngamma\n";
        let outcome = runner
            .run_from_reader(&sh("wc -l"), &mut source)
            .await
            .unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.stdout.trim(), "3");
    }

    /// The line handed to a remote login shell picks its environment up
    /// from stdin and leaves the rest of the stream to the command.
    #[tokio::test]
    async fn remote_env_arrives_through_stdin() {
        let runner = ProcessRunner::default();
        let remote = CommandSpec::new("sh")
            .args(["-c", "printf '%s|' \"$PGKEEP_SECRET\"; cat"])
            .env("PGKEEP_SECRET", "s3 cr'et");
        let line = ssh::remote_command_line(&remote);
        assert!(!line.contains("s3 cr"));

        let mut input = ssh::env_preamble(&remote).unwrap();
        input.extend_from_slice(b"payload\n");
        let mut source: &[u8] = &input;
        let outcome = runner
            .run_from_reader(&sh(&line), &mut source)
            .await
            .unwrap();
        assert!(outcome.success(), "{}", outcome.stderr);
        assert_eq!(outcome.stdout, "s3 cr'et|payload\n");
    }

    #[tokio::test]
    async fn early_exit_while_feeding_reports_status() {
        let runner = ProcessRunner::default();
        let big = vec![b'x'; 4 * 1024 * 1024];
        let mut source: &[u8] = &big;
        let outcome = runner
            .run_from_reader(&sh("exit 7"), &mut source)
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, 7);
        assert!(outcome.fatal);
    }
}
