// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! pgkeep - backups, restores and migrations for a Dockerized PostgreSQL database.
//!
//! This is the binary entry point.

mod backup;
mod cron;
mod migrate;
mod prompt;
mod restore;
mod setup;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pgkeep_core::PgkeepError;

/// pgkeep - backups, restores and migrations for a Dockerized PostgreSQL database.
#[derive(Parser, Debug)]
#[command(name = "pgkeep", version, about, long_about = None)]
struct Cli {
    /// Load this config file (plus PGKEEP_* overrides) instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a verified backup of the local database.
    Backup {
        /// Retention class: hourly, daily or weekly.
        class: String,
    },
    /// Restore a backup into the local database. Lists backups without a selector.
    Restore {
        /// `latest`, `latest:<class>`, `s3://bucket/key` or a file path.
        selector: Option<String>,
        /// Skip the confirmation prompt.
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Check a backup's integrity without restoring it.
    Verify {
        /// `latest`, `latest:<class>`, `s3://bucket/key` or a file path.
        selector: String,
    },
    /// Copy the database from one host to another over SSH.
    Migrate {
        /// Source host, `[user@]host[:port]`.
        #[arg(long)]
        source: String,
        /// Destination host, `[user@]host[:port]`.
        #[arg(long)]
        dest: String,
        /// Skip both confirmation prompts.
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Take a final backup of a host and stop its application stack.
    Decommission {
        /// Host to retire, `[user@]host[:port]`.
        #[arg(long)]
        host: String,
        /// Stop the stack without taking a final backup.
        #[arg(long)]
        skip_final_backup: bool,
        /// Skip the confirmation prompt.
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Print crontab entries for scheduled backups.
    Cron,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => pgkeep_config::load_and_validate_from(path),
        None => pgkeep_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            pgkeep_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.general.log_level);
    let use_color = !cli.plain && std::io::stdout().is_terminal();

    let result = match cli.command {
        Commands::Backup { class } => backup::run_backup(&config, &class, use_color).await,
        Commands::Restore { selector, yes } => {
            restore::run_restore(&config, selector.as_deref(), yes, use_color).await
        }
        Commands::Verify { selector } => restore::run_verify(&config, &selector, use_color).await,
        Commands::Migrate { source, dest, yes } => {
            migrate::run_migrate(&config, &source, &dest, yes, use_color).await
        }
        Commands::Decommission {
            host,
            skip_final_backup,
            yes,
        } => migrate::run_decommission(&config, &host, skip_final_backup, yes, use_color).await,
        Commands::Cron => cron::run_cron(&config),
    };

    if let Err(e) = result {
        eprintln!("{}", format_error(&e, !cli.plain && std::io::stderr().is_terminal()));
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pgkeep={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

/// `error[<kind>]: <message>`, followed by the chain of causes.
fn format_error(err: &PgkeepError, use_color: bool) -> String {
    let head = format!("error[{}]", err.kind());
    let head = if use_color {
        use colored::Colorize;
        head.red().bold().to_string()
    } else {
        head
    };

    let mut out = format!("{head}: {err}");
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        out.push_str(&format!("\n  caused by: {cause}"));
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_migrate_flags() {
        let cli = Cli::try_parse_from([
            "pgkeep", "migrate", "--source", "root@old", "--dest", "root@new", "--yes",
        ])
        .unwrap();
        match cli.command {
            Commands::Migrate { source, dest, yes } => {
                assert_eq!(source, "root@old");
                assert_eq!(dest, "root@new");
                assert!(yes);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from(["pgkeep", "restore", "--plain", "--config", "/etc/x.toml"]).unwrap();
        assert!(cli.plain);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/x.toml")));
        assert!(matches!(cli.command, Commands::Restore { selector: None, yes: false }));
    }

    #[test]
    fn errors_are_classified() {
        let err = PgkeepError::transfer(
            "upload to root@new failed",
            PgkeepError::RemoteCommandFailed {
                command: "scp".into(),
                exit_code: 1,
                stderr: "lost connection".into(),
            },
        );
        let text = format_error(&err, false);
        assert!(text.starts_with("error[transfer-failed]: transfer failed: upload to root@new failed"));
        assert!(text.contains("caused by: command `scp` failed with exit code 1: lost connection"));
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = pgkeep_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.general.log_level, "info");
    }
}
