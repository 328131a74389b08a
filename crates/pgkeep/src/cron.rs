// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pgkeep cron`: crontab entries for the backup schedule.

use std::path::{Path, PathBuf};

use pgkeep_config::PgkeepConfig;
use pgkeep_core::{BackupClass, PgkeepError};

/// Schedule per class, in crontab syntax.
fn schedule(class: BackupClass) -> &'static str {
    match class {
        BackupClass::Hourly => "0 * * * *",
        BackupClass::Daily => "0 3 * * *",
        BackupClass::Weekly => "0 4 * * 0",
    }
}

/// Crontab lines invoking `binary`, appending output to `log`.
pub fn crontab(binary: &Path, log: &Path) -> Vec<String> {
    let mut lines = vec!["# pgkeep backup schedule".to_string()];
    lines.extend(BackupClass::ALL.iter().map(|&class| {
        format!(
            "{} {} backup {class} >> {} 2>&1",
            schedule(class),
            binary.display(),
            log.display()
        )
    }));
    lines
}

/// Run `pgkeep cron`. Prints only; nothing is installed.
pub fn run_cron(config: &PgkeepConfig) -> Result<(), PgkeepError> {
    let binary = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("pgkeep"));
    let log = Path::new(&config.backup.dir).join("pgkeep-cron.log");
    for line in crontab(&binary, &log) {
        println!("{line}");
    }
    Ok(())
}
