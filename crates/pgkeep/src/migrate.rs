// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pgkeep migrate` and `pgkeep decommission` command implementation.

use std::path::PathBuf;

use pgkeep_config::PgkeepConfig;
use pgkeep_core::PgkeepError;
use pgkeep_migrate::{
    DecommissionOutcome, DecommissionReport, Decommissioner, MigrationOutcome, Migrator, Verification,
};

use crate::{prompt, setup};

/// Run `pgkeep migrate --source <host> --dest <host>`.
pub async fn run_migrate(
    config: &PgkeepConfig,
    source: &str,
    dest: &str,
    assume_yes: bool,
    use_color: bool,
) -> Result<(), PgkeepError> {
    let source_ep = setup::endpoint(config, source)?;
    let dest_ep = setup::endpoint(config, dest)?;
    if source_ep.host == dest_ep.host && source_ep.port == dest_ep.port {
        return Err(PgkeepError::InvalidArgument(format!(
            "source and destination are the same host ({})",
            source_ep.host
        )));
    }

    let runner = setup::runner(config);
    let migrator = Migrator::new(
        setup::remote_host(config, runner.clone(), source)?,
        setup::remote_host(config, runner, dest)?,
        config.backup.staging_path(),
    );

    let report = migrator.run(prompt::confirmer(assume_yes).as_ref()).await?;
    match report.outcome {
        MigrationOutcome::Cancelled => println!("Migration cancelled."),
        MigrationOutcome::Completed(verification) => {
            println!("{}", verification_summary(&verification, use_color));
        }
    }
    Ok(())
}

fn verification_summary(verification: &Verification, use_color: bool) -> String {
    let counts = format!(
        "source {} tables, destination {} tables",
        verification.source_table_count, verification.dest_table_count
    );
    let (status, detail) = if verification.matched {
        ("Migration complete", counts)
    } else {
        (
            "Migration complete with differences",
            format!("{counts}. Check the destination before switching traffic."),
        )
    };

    if !use_color {
        return format!("{status}: {detail}");
    }
    use colored::Colorize;
    let status = if verification.matched {
        status.green()
    } else {
        status.yellow()
    };
    format!("{status}: {detail}")
}

/// Run `pgkeep decommission --host <host>`.
pub async fn run_decommission(
    config: &PgkeepConfig,
    host: &str,
    skip_final_backup: bool,
    assume_yes: bool,
    use_color: bool,
) -> Result<(), PgkeepError> {
    let runner = setup::runner(config);
    let decommissioner = Decommissioner::new(
        setup::remote_host(config, runner, host)?,
        PathBuf::from(&config.backup.dir),
    )
    .skip_final_backup(skip_final_backup);

    match decommissioner.run(prompt::confirmer(assume_yes).as_ref()).await? {
        DecommissionOutcome::Cancelled => println!("Decommission cancelled."),
        DecommissionOutcome::Completed(report) => {
            println!("{}", decommission_summary(&report, use_color));
        }
    }
    Ok(())
}

fn decommission_summary(report: &DecommissionReport, use_color: bool) -> String {
    let mut lines = Vec::new();
    match &report.final_backup {
        Some(artifact) => lines.push(format!("Final backup: {}", artifact.location)),
        None => lines.push("Final backup: skipped".to_string()),
    }
    lines.push(format!("Application stack on {} stopped.", report.host));

    let advice = format!(
        "Keep {} for {} days before deleting it, in case anything was missed.",
        report.host, report.grace_period_days
    );
    if use_color {
        use colored::Colorize;
        lines.push(advice.yellow().to_string());
    } else {
        lines.push(advice);
    }
    lines.join("\n")
}
