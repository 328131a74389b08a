// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pgkeep backup` command implementation.

use std::path::PathBuf;

use pgkeep_backup::{BackupEngine, BackupReport};
use pgkeep_config::PgkeepConfig;
use pgkeep_core::{BackupClass, PgkeepError};

use crate::setup;

/// Run `pgkeep backup <class>`.
///
/// The class is validated before any command runs.
pub async fn run_backup(config: &PgkeepConfig, class: &str, use_color: bool) -> Result<(), PgkeepError> {
    let class = BackupClass::parse(class)?;

    let runner = setup::runner(config);
    let engine = BackupEngine::new(
        setup::local_host(config, runner.clone()),
        PathBuf::from(&config.backup.dir),
        config.retention.policy(),
    )
    .with_store(setup::object_store(config, runner));

    let report = engine.create_backup(class).await?;
    println!("{}", summary(&report, use_color));
    Ok(())
}

fn summary(report: &BackupReport, use_color: bool) -> String {
    let artifact = &report.artifact;
    let mut lines = vec![format!(
        "Backup created: {} ({} bytes)",
        artifact.location, artifact.size_bytes
    )];
    if report.uploaded {
        lines.push(format!("  uploaded as {}", artifact.object_key()));
    }
    let swept = report.swept_local.len() + report.swept_remote.len();
    if swept > 0 {
        lines.push(format!("  removed {swept} expired backup(s)"));
    }

    if use_color {
        use colored::Colorize;
        lines[0] = lines[0].green().to_string();
    }
    lines.join("\n")
}
