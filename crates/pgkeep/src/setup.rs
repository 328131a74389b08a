// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builds runners, hosts and the object store from the loaded configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pgkeep_backup::{DbHost, DbSettings, S3CmdStore};
use pgkeep_config::PgkeepConfig;
use pgkeep_core::{CommandRunner, Host, ObjectStore, PgkeepError, RemoteEndpoint};
use pgkeep_exec::{ProcessRunner, SshOptions};

pub fn ssh_options(config: &PgkeepConfig) -> SshOptions {
    SshOptions {
        connect_timeout_secs: config.ssh.connect_timeout_secs,
        command_timeout: Duration::from_secs(config.ssh.command_timeout_secs),
    }
}

pub fn runner(config: &PgkeepConfig) -> Arc<dyn CommandRunner> {
    Arc::new(ProcessRunner::new(ssh_options(config)))
}

/// The database on this machine.
pub fn local_host(config: &PgkeepConfig, runner: Arc<dyn CommandRunner>) -> Arc<dyn Host> {
    Arc::new(DbHost::local(runner, DbSettings::local(config)))
}

/// Parse `[user@]host[:port]` with the `[ssh]` defaults applied.
pub fn endpoint(config: &PgkeepConfig, destination: &str) -> Result<RemoteEndpoint, PgkeepError> {
    Ok(RemoteEndpoint::parse(destination, &config.ssh.user, config.ssh.port)?
        .with_identity_file(config.ssh.identity_file.as_ref().map(PathBuf::from))
        .with_app_dir(config.ssh.remote_app_dir.clone()))
}

/// The database on a host reached over SSH.
pub fn remote_host(
    config: &PgkeepConfig,
    runner: Arc<dyn CommandRunner>,
    destination: &str,
) -> Result<Arc<dyn Host>, PgkeepError> {
    let endpoint = endpoint(config, destination)?;
    let settings = DbSettings::remote(config, &endpoint);
    Ok(Arc::new(DbHost::remote(runner, endpoint, settings, ssh_options(config))))
}

/// The configured object store, if credentials are complete.
pub fn object_store(config: &PgkeepConfig, runner: Arc<dyn CommandRunner>) -> Option<Arc<dyn ObjectStore>> {
    S3CmdStore::from_config(config, runner).map(|store| Arc::new(store) as Arc<dyn ObjectStore>)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_uses_ssh_defaults() {
        let mut config = PgkeepConfig::default();
        config.ssh.user = "deploy".into();
        config.ssh.port = 2222;
        config.ssh.identity_file = Some("/keys/id_ed25519".into());
        config.ssh.remote_app_dir = Some("/opt/shop".into());

        let ep = endpoint(&config, "10.0.0.4").unwrap();
        assert_eq!(ep.destination(), "deploy@10.0.0.4");
        assert_eq!(ep.port, 2222);
        assert_eq!(ep.identity_file, Some(PathBuf::from("/keys/id_ed25519")));
        assert_eq!(ep.app_dir.as_deref(), Some("/opt/shop"));

        let ep = endpoint(&config, "root@10.0.0.5:22").unwrap();
        assert_eq!(ep.destination(), "root@10.0.0.5");
        assert_eq!(ep.port, 22);
    }

    #[test]
    fn bad_host_is_invalid_argument() {
        let err = endpoint(&PgkeepConfig::default(), "root@").unwrap_err();
        assert_eq!(err.kind(), "invalid-argument");
    }

    #[test]
    fn no_store_without_credentials() {
        let config = PgkeepConfig::default();
        assert!(object_store(&config, runner(&config)).is_none());
    }
}
