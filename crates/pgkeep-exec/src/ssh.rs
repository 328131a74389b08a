// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ssh` and `scp` argument construction.

use std::path::Path;
use std::time::Duration;

use pgkeep_core::{CommandSpec, PgkeepError, RemoteEndpoint};

/// Connection settings shared by every remote invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SshOptions {
    pub connect_timeout_secs: u64,
    /// Bounded wait applied to remote commands that set no timeout of their own.
    pub command_timeout: Duration,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            command_timeout: Duration::from_secs(3600),
        }
    }
}

/// Quote one word for a POSIX shell.
pub fn quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=@%+,".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// The command line executed by the remote login shell.
///
/// `ssh` forwards neither the working directory nor the environment. The
/// directory is folded in as a `cd`. Environment values would be visible in
/// the process list on both machines if they were put on the command line,
/// so each one is read from stdin instead, in order, one per line (see
/// [`env_preamble`]).
pub fn remote_command_line(spec: &CommandSpec) -> String {
    let mut parts = Vec::new();
    if let Some(dir) = &spec.workdir {
        parts.push(format!("cd {} &&", quote(dir)));
    }
    for (key, _) in &spec.env {
        parts.push(format!("IFS= read -r {key} && export {key} &&"));
    }
    parts.push(quote(&spec.program));
    parts.extend(spec.args.iter().map(|a| quote(a)));
    parts.join(" ")
}

/// Bytes to write to the remote shell's stdin before anything else: the
/// environment values of `spec`, one per line.
pub fn env_preamble(spec: &CommandSpec) -> Result<Vec<u8>, PgkeepError> {
    let mut preamble = Vec::new();
    for (key, value) in &spec.env {
        if value.contains(['\n', '\r']) {
            return Err(PgkeepError::InvalidArgument(format!(
                "environment value for {key} contains a line break and cannot be sent to a remote host"
            )));
        }
        preamble.extend_from_slice(value.as_bytes());
        preamble.push(b'\n');
    }
    Ok(preamble)
}

fn common_options(endpoint: &RemoteEndpoint, options: &SshOptions) -> Vec<String> {
    let mut args = vec![
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", options.connect_timeout_secs),
    ];
    if let Some(key) = &endpoint.identity_file {
        args.push("-i".to_string());
        args.push(key.display().to_string());
    }
    args
}

/// Arguments for `ssh` running `spec` on `endpoint`.
pub fn ssh_args(endpoint: &RemoteEndpoint, options: &SshOptions, spec: &CommandSpec) -> Vec<String> {
    let mut args = common_options(endpoint, options);
    args.push("-p".to_string());
    args.push(endpoint.port.to_string());
    args.push(endpoint.destination());
    args.push("--".to_string());
    args.push(remote_command_line(spec));
    args
}

fn scp(endpoint: &RemoteEndpoint, options: &SshOptions, from: String, to: String) -> CommandSpec {
    CommandSpec::new("scp")
        .args(common_options(endpoint, options))
        .args(["-P".to_string(), endpoint.port.to_string(), "-q".to_string()])
        .args([from, to])
        .timeout(Some(options.command_timeout))
}

/// `scp` copying `remote` on `endpoint` to `local`.
pub fn scp_download(
    endpoint: &RemoteEndpoint,
    options: &SshOptions,
    remote: &Path,
    local: &Path,
) -> CommandSpec {
    scp(
        endpoint,
        options,
        format!("{}:{}", endpoint.destination(), remote.display()),
        local.display().to_string(),
    )
}

/// `scp` copying `local` to `remote` on `endpoint`.
pub fn scp_upload(
    endpoint: &RemoteEndpoint,
    options: &SshOptions,
    local: &Path,
    remote: &Path,
) -> CommandSpec {
    scp(
        endpoint,
        options,
        local.display().to_string(),
        format!("{}:{}", endpoint.destination(), remote.display()),
    )
}
