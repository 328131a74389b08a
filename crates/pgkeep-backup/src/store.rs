// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! S3-compatible object store driven through `s3cmd`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pgkeep_config::PgkeepConfig;
use pgkeep_core::{CommandRunner, CommandSpec, ObjectEntry, ObjectStore, PgkeepError};
use tracing::debug;

/// Object store backed by the `s3cmd` CLI.
///
/// Credentials travel through the environment, never the argument list.
pub struct S3CmdStore {
    runner: Arc<dyn CommandRunner>,
    bucket: String,
    access_key: String,
    secret_key: String,
    endpoint: String,
    timeout: Duration,
}

impl S3CmdStore {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        bucket: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            bucket: bucket.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            endpoint: endpoint.into(),
            timeout: Duration::from_secs(3600),
        }
    }

    /// Build a store from `[object_store]`, or `None` when it is not fully configured.
    pub fn from_config(config: &PgkeepConfig, runner: Arc<dyn CommandRunner>) -> Option<Self> {
        let store = &config.object_store;
        let (bucket, access, secret) = store.credentials()?;
        Some(
            Self::new(runner, bucket, access, secret, store.endpoint_host())
                .with_timeout(config.ssh.command_timeout()),
        )
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, verb: &str) -> CommandSpec {
        CommandSpec::new("s3cmd")
            .arg(format!("--host={}", self.endpoint))
            .arg(format!("--host-bucket=%(bucket)s.{}", self.endpoint))
            .arg(verb)
            .env("AWS_ACCESS_KEY_ID", self.access_key.as_str())
            .env("AWS_SECRET_ACCESS_KEY", self.secret_key.as_str())
            .timeout(Some(self.timeout))
    }

    async fn execute(&self, spec: CommandSpec) -> Result<String, PgkeepError> {
        let outcome = self.runner.run(&spec).await?;
        if outcome.success() {
            return Ok(outcome.stdout);
        }
        Err(PgkeepError::ObjectStore(format!(
            "`{}` exited with {}: {}",
            outcome.command,
            outcome.exit_code,
            outcome.stderr.trim()
        )))
    }
}

/// Parse `s3cmd ls` output into entries relative to the bucket.
///
/// Object lines look like `2026-01-14 03:00   1234   s3://bucket/daily/x.sql.gz`;
/// `DIR` lines are skipped.
pub fn parse_listing(bucket: &str, output: &str) -> Vec<ObjectEntry> {
    let prefix = format!("s3://{bucket}/");
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [_date, _time, size, uri] = fields.as_slice() else {
                return None;
            };
            let size_bytes = size.parse::<u64>().ok()?;
            let key = uri.strip_prefix(&prefix)?;
            Some(ObjectEntry {
                key: key.to_string(),
                size_bytes,
            })
        })
        .collect()
}

#[async_trait]
impl ObjectStore for S3CmdStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, local: &Path, key: &str) -> Result<(), PgkeepError> {
        let spec = self
            .command("put")
            .arg(local.display().to_string())
            .arg(self.uri(key));
        self.execute(spec).await?;
        debug!(key, "object uploaded");
        Ok(())
    }

    async fn get(&self, key: &str, local: &Path) -> Result<(), PgkeepError> {
        let spec = self
            .command("get")
            .arg("--force")
            .arg(self.uri(key))
            .arg(local.display().to_string());
        self.execute(spec).await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, PgkeepError> {
        let spec = self.command("ls").arg(self.uri(prefix));
        let output = self.execute(spec).await?;
        Ok(parse_listing(&self.bucket, &output))
    }

    async fn delete(&self, key: &str) -> Result<(), PgkeepError> {
        let spec = self.command("del").arg(self.uri(key));
        self.execute(spec).await?;
        Ok(())
    }
}
