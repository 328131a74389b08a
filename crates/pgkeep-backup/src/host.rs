// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The production [`Host`]: a PostgreSQL database reached through
//! `pg_dump`/`psql`, either on this machine or on a remote one over SSH.
//!
//! Database tools run inside the compose service when one is configured
//! (`docker compose exec -T <service> ...`), otherwise directly against
//! `host:port`. Remote dumps are compressed on the remote side with `gzip`
//! so they can be checked and copied as files; local dumps are compressed
//! in-process while streaming.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use pgkeep_config::PgkeepConfig;
use pgkeep_core::{CommandRunner, CommandSpec, Host, PgkeepError, RemoteEndpoint, Target};
use pgkeep_exec::ssh::{self, quote, SshOptions};
use tracing::{debug, info};

use crate::artifact;

/// `pg_dump` flags: plain SQL that drops objects before recreating them.
const DUMP_ARGS: [&str; 4] = ["--clean", "--if-exists", "--no-owner", "--no-privileges"];

/// Counts tables in the public schema.
const COUNT_TABLES_SQL: &str = "SELECT count(*) FROM information_schema.tables \
     WHERE table_schema = 'public' AND table_type = 'BASE TABLE'";

/// How to reach the database and the services that depend on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbSettings {
    pub user: String,
    pub name: String,
    pub password: Option<String>,
    /// Compose service running PostgreSQL; `None` talks to `host:port` directly.
    pub compose_service: Option<String>,
    pub host: String,
    pub port: u16,
    /// Directory holding the compose file. Commands run from here.
    pub compose_dir: Option<String>,
    /// Application services stopped around a restore.
    pub services: Vec<String>,
}

impl DbSettings {
    /// Settings for the database on this machine.
    pub fn local(config: &PgkeepConfig) -> Self {
        Self {
            user: config.database.user.clone(),
            name: config.database.name.clone(),
            password: config.database.password.clone(),
            compose_service: config.database.compose_service.clone(),
            host: config.database.host.clone(),
            port: config.database.port,
            compose_dir: config.app.compose_dir.clone(),
            services: config.app.services.clone(),
        }
    }

    /// Settings for a database deployed on `endpoint` with the same layout.
    pub fn remote(config: &PgkeepConfig, endpoint: &RemoteEndpoint) -> Self {
        Self {
            compose_dir: endpoint
                .app_dir
                .clone()
                .or_else(|| config.ssh.remote_app_dir.clone()),
            ..Self::local(config)
        }
    }
}

/// A database host driven through a [`CommandRunner`].
pub struct DbHost {
    runner: Arc<dyn CommandRunner>,
    target: Target,
    db: DbSettings,
    ssh: SshOptions,
}

impl DbHost {
    /// The database on this machine.
    pub fn local(runner: Arc<dyn CommandRunner>, db: DbSettings) -> Self {
        Self {
            runner,
            target: Target::Local,
            db,
            ssh: SshOptions::default(),
        }
    }

    /// The database on `endpoint`.
    pub fn remote(
        runner: Arc<dyn CommandRunner>,
        endpoint: RemoteEndpoint,
        db: DbSettings,
        ssh: SshOptions,
    ) -> Self {
        Self {
            runner,
            target: Target::Remote(endpoint),
            db,
            ssh,
        }
    }

    fn endpoint(&self) -> Option<&RemoteEndpoint> {
        match &self.target {
            Target::Remote(endpoint) => Some(endpoint),
            Target::Local => None,
        }
    }

    /// A command on this host, run from the compose directory.
    fn command(&self, program: &str) -> CommandSpec {
        CommandSpec::new(program)
            .on(self.target.clone())
            .in_dir(self.db.compose_dir.clone())
    }

    /// `pg_dump`/`psql` invocation with connection arguments, without a target
    /// or credentials.
    fn db_tool(&self, tool: &str) -> CommandSpec {
        let spec = match &self.db.compose_service {
            Some(service) => {
                let mut spec = CommandSpec::new("docker").args(["compose", "exec", "-T"]);
                if self.db.password.is_some() {
                    spec = spec.args(["-e", "PGPASSWORD"]);
                }
                spec.args([service.as_str(), tool])
            }
            None => CommandSpec::new(tool).args([
                "-h".to_string(),
                self.db.host.clone(),
                "-p".to_string(),
                self.db.port.to_string(),
            ]),
        };
        spec.args(["-U", self.db.user.as_str()])
    }

    /// Pass the password through the environment so it never shows up in a
    /// command line. Remote hosts receive it on the ssh session's stdin.
    fn authenticated(&self, spec: CommandSpec) -> CommandSpec {
        match &self.db.password {
            Some(password) => spec.env("PGPASSWORD", password.as_str()),
            None => spec,
        }
    }

    fn dump_command(&self) -> CommandSpec {
        self.db_tool("pg_dump")
            .args(DUMP_ARGS)
            .args(["-d", self.db.name.as_str()])
    }

    fn apply_command(&self) -> CommandSpec {
        self.db_tool("psql").args([
            "-v",
            "ON_ERROR_STOP=1",
            "--single-transaction",
            "-q",
            "-d",
            self.db.name.as_str(),
        ])
    }

    /// `bash -c "set -o pipefail; <line>"` on this host.
    fn pipeline(&self, line: String) -> CommandSpec {
        self.command("bash")
            .args(["-c".to_string(), format!("set -o pipefail; {line}")])
    }

    fn compose(&self, verb: &str) -> CommandSpec {
        self.command("docker").args(["compose", verb])
    }

    fn path_arg(path: &Path) -> String {
        path.display().to_string()
    }
}

#[async_trait]
impl Host for DbHost {
    fn label(&self) -> String {
        match self.endpoint() {
            Some(endpoint) => endpoint.to_string(),
            None => "local".to_string(),
        }
    }

    async fn dump_to(&self, path: &Path) -> Result<(), PgkeepError> {
        info!(host = %self.label(), path = %path.display(), "dumping database");
        if self.endpoint().is_some() {
            let line = format!(
                "{} | gzip -c > {}",
                ssh::remote_command_line(&self.dump_command()),
                quote(&Self::path_arg(path))
            );
            let spec = self.authenticated(self.pipeline(line));
            self.runner.run_checked(&spec).await?;
            return Ok(());
        }

        let spec = self
            .authenticated(self.dump_command())
            .in_dir(self.db.compose_dir.clone());
        let mut encoder = artifact::create_gzip(path)?;
        let outcome = self.runner.run_to_writer(&spec, &mut encoder).await;
        let finished = artifact::finish_gzip(encoder, path);
        outcome?.into_result()?;
        let size = finished?;
        debug!(path = %path.display(), size, "dump written");
        Ok(())
    }

    async fn apply_dump(&self, path: &Path) -> Result<(), PgkeepError> {
        info!(host = %self.label(), path = %path.display(), "applying dump");
        if self.endpoint().is_some() {
            let line = format!(
                "gunzip -c {} | {}",
                quote(&Self::path_arg(path)),
                ssh::remote_command_line(&self.apply_command())
            );
            let spec = self.authenticated(self.pipeline(line));
            self.runner.run_checked(&spec).await?;
            return Ok(());
        }

        let spec = self
            .authenticated(self.apply_command())
            .in_dir(self.db.compose_dir.clone());
        let mut reader = artifact::open_dump(path)?;
        self.runner
            .run_from_reader(&spec, &mut reader)
            .await?
            .into_result()?;
        Ok(())
    }

    async fn count_tables(&self) -> Result<u64, PgkeepError> {
        let query = self
            .db_tool("psql")
            .args(["-tAq", "-d", self.db.name.as_str(), "-c", COUNT_TABLES_SQL]);
        let spec = self
            .authenticated(query)
            .on(self.target.clone())
            .in_dir(self.db.compose_dir.clone());
        let outcome = self.runner.run_checked(&spec).await?;
        let raw = outcome.stdout.trim();
        raw.parse::<u64>()
            .map_err(|_| PgkeepError::RemoteCommandFailed {
                command: outcome.command.clone(),
                exit_code: outcome.exit_code,
                stderr: format!("unexpected table count output `{raw}`"),
            })
    }

    async fn stop_services(&self) -> Result<(), PgkeepError> {
        if self.db.services.is_empty() {
            return Ok(());
        }
        let spec = self.compose("stop").args(self.db.services.iter().cloned()).best_effort();
        self.runner.run(&spec).await?;
        Ok(())
    }

    async fn start_services(&self) -> Result<(), PgkeepError> {
        if self.db.services.is_empty() {
            return Ok(());
        }
        let spec = self
            .compose("up")
            .arg("-d")
            .args(self.db.services.iter().cloned())
            .best_effort();
        self.runner.run(&spec).await?;
        Ok(())
    }

    async fn stop_stack(&self) -> Result<(), PgkeepError> {
        self.runner.run_checked(&self.compose("down")).await?;
        Ok(())
    }

    async fn file_size(&self, path: &Path) -> Result<Option<u64>, PgkeepError> {
        if self.endpoint().is_none() {
            return artifact::file_size(path);
        }
        let spec = self
            .command("stat")
            .args(["-c", "%s"])
            .arg(Self::path_arg(path))
            .best_effort();
        let outcome = self.runner.run(&spec).await?;
        if !outcome.success() {
            return Ok(None);
        }
        Ok(outcome.stdout.trim().parse::<u64>().ok())
    }

    async fn verify_artifact(&self, path: &Path) -> Result<(), PgkeepError> {
        if self.endpoint().is_none() {
            artifact::verify_gzip(path)?;
            return Ok(());
        }
        let spec = self.command("gzip").arg("-t").arg(Self::path_arg(path)).best_effort();
        let outcome = self.runner.run(&spec).await?;
        if outcome.success() {
            Ok(())
        } else {
            Err(PgkeepError::IntegrityCheckFailed {
                path: format!("{}:{}", self.label(), path.display()),
                reason: outcome.stderr.trim().to_string(),
            })
        }
    }

    async fn remove_file(&self, path: &Path) -> Result<(), PgkeepError> {
        if self.endpoint().is_none() {
            return match std::fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(PgkeepError::io(path, e)),
            };
        }
        let spec = self.command("rm").arg("-f").arg(Self::path_arg(path));
        self.runner.run_checked(&spec).await?;
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), PgkeepError> {
        if self.endpoint().is_none() {
            return std::fs::rename(from, to).map_err(|e| PgkeepError::io(to, e));
        }
        let spec = self
            .command("mv")
            .arg("-f")
            .args([Self::path_arg(from), Self::path_arg(to)]);
        self.runner.run_checked(&spec).await?;
        Ok(())
    }

    async fn download(&self, remote: &Path, local: &Path) -> Result<(), PgkeepError> {
        let Some(endpoint) = self.endpoint() else {
            std::fs::copy(remote, local).map_err(|e| PgkeepError::io(local, e))?;
            return Ok(());
        };
        let spec = ssh::scp_download(endpoint, &self.ssh, remote, local);
        self.runner.run_checked(&spec).await?;
        Ok(())
    }

    async fn upload(&self, local: &Path, remote: &Path) -> Result<(), PgkeepError> {
        let Some(endpoint) = self.endpoint() else {
            std::fs::copy(local, remote).map_err(|e| PgkeepError::io(remote, e))?;
            return Ok(());
        };
        let spec = ssh::scp_upload(endpoint, &self.ssh, local, remote);
        self.runner.run_checked(&spec).await?;
        Ok(())
    }
}
