// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retiring a host: take a last backup, then stop its application stack.
//!
//! Nothing is deleted on the host. Removing the machine itself is left to
//! the operator once the grace period has passed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pgkeep_backup::{artifact, catalog, dump_verified};
use pgkeep_core::{ArtifactLocation, BackupArtifact, BackupClass, Confirmer, Host, PgkeepError};
use tracing::{info, warn};
use uuid::Uuid;

/// Days to keep a decommissioned host before deleting it.
pub const GRACE_PERIOD_DAYS: u32 = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecommissionReport {
    pub host: String,
    /// The weekly artifact taken before shutdown, unless skipped.
    pub final_backup: Option<BackupArtifact>,
    pub grace_period_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecommissionOutcome {
    Cancelled,
    Completed(DecommissionReport),
}

/// Shuts down one host after securing its data locally.
pub struct Decommissioner {
    host: Arc<dyn Host>,
    backup_dir: PathBuf,
    skip_final_backup: bool,
}

impl Decommissioner {
    pub fn new(host: Arc<dyn Host>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            host,
            backup_dir: backup_dir.into(),
            skip_final_backup: false,
        }
    }

    pub fn skip_final_backup(mut self, skip: bool) -> Self {
        self.skip_final_backup = skip;
        self
    }

    pub async fn run(&self, confirmer: &dyn Confirmer) -> Result<DecommissionOutcome, PgkeepError> {
        self.run_at(confirmer, Utc::now()).await
    }

    /// [`Decommissioner::run`] with an explicit clock for the artifact name.
    pub async fn run_at(
        &self,
        confirmer: &dyn Confirmer,
        now: DateTime<Utc>,
    ) -> Result<DecommissionOutcome, PgkeepError> {
        let label = self.host.label();
        let prompt = if self.skip_final_backup {
            format!("Stop the application stack on {label} without a final backup?")
        } else {
            format!("Back up {label} and stop its application stack?")
        };
        if !confirmer.confirm(&prompt)? {
            info!(host = %label, "decommission cancelled");
            return Ok(DecommissionOutcome::Cancelled);
        }

        let final_backup = if self.skip_final_backup {
            warn!(host = %label, "skipping final backup");
            None
        } else {
            Some(self.final_backup(now).await?)
        };

        self.host.stop_stack().await?;
        info!(host = %label, "application stack stopped");

        Ok(DecommissionOutcome::Completed(DecommissionReport {
            host: label,
            final_backup,
            grace_period_days: GRACE_PERIOD_DAYS,
        }))
    }

    /// Dump on the host, copy into `<backup_dir>/weekly/`, verify, publish.
    async fn final_backup(&self, now: DateTime<Utc>) -> Result<BackupArtifact, PgkeepError> {
        let remote = Path::new("/tmp").join(format!(
            "pgkeep-final-{}.sql.gz",
            Uuid::new_v4().simple()
        ));
        let class = BackupClass::Weekly;
        let class_dir = catalog::class_dir(&self.backup_dir, class);
        std::fs::create_dir_all(&class_dir).map_err(|e| PgkeepError::io(&class_dir, e))?;
        let path = class_dir.join(BackupArtifact::file_name_for(class, now));
        let staging = artifact::partial_path(&path);

        let result = async {
            dump_verified(self.host.as_ref(), &remote).await?;
            self.host
                .download(&remote, &staging)
                .await
                .map_err(|e| PgkeepError::transfer(format!("download from {} failed", self.host.label()), e))?;
            artifact::verify_gzip(&staging)?;
            std::fs::rename(&staging, &path).map_err(|e| PgkeepError::io(&path, e))?;
            artifact::file_size(&path)
        }
        .await;

        if let Err(e) = self.host.remove_file(&remote).await {
            warn!(host = %self.host.label(), path = %remote.display(), error = %e, "failed to remove export");
        }
        let size_bytes = match result {
            Ok(size) => size.unwrap_or(0),
            Err(e) => {
                if let Err(cleanup) = std::fs::remove_file(&staging) {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %staging.display(), error = %cleanup, "failed to remove partial copy");
                    }
                }
                return Err(e);
            }
        };

        info!(path = %path.display(), size_bytes, "final backup stored");
        Ok(BackupArtifact {
            class,
            created_at: now,
            location: ArtifactLocation::Local(path),
            size_bytes,
            checksum_valid: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pgkeep_test_utils::{FakeHost, ScriptedConfirmer};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn backs_up_then_stops_stack() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(FakeHost::remote("root@old").with_table("users", 5));

        let outcome = Decommissioner::new(host.clone(), dir.path())
            .run_at(&ScriptedConfirmer::new([true]), now())
            .await
            .unwrap();

        let DecommissionOutcome::Completed(report) = outcome else {
            panic!("confirmed decommission must complete");
        };
        let backup = report.final_backup.unwrap();
        let expected = dir.path().join("weekly/backup_weekly_20260601_093000.sql.gz");
        assert_eq!(backup.local_path(), Some(expected.as_path()));
        artifact::verify_gzip(&expected).unwrap();
        assert_eq!(host.events().last().map(String::as_str), Some("stop_stack"));
        assert_eq!(host.row_count("users"), Some(5));
        assert_eq!(report.grace_period_days, GRACE_PERIOD_DAYS);
    }

    #[tokio::test]
    async fn declining_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(FakeHost::remote("root@old"));
        let outcome = Decommissioner::new(host.clone(), dir.path())
            .run(&ScriptedConfirmer::new([false]))
            .await
            .unwrap();
        assert_eq!(outcome, DecommissionOutcome::Cancelled);
        assert!(host.events().is_empty());
    }

    #[tokio::test]
    async fn skipping_the_backup_only_stops_the_stack() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(FakeHost::remote("root@old"));
        let outcome = Decommissioner::new(host.clone(), dir.path())
            .skip_final_backup(true)
            .run(&ScriptedConfirmer::new([true]))
            .await
            .unwrap();
        let DecommissionOutcome::Completed(report) = outcome else {
            panic!("confirmed decommission must complete");
        };
        assert!(report.final_backup.is_none());
        assert_eq!(host.events(), vec!["stop_stack"]);
    }

    #[tokio::test]
    async fn failed_backup_keeps_the_stack_running() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(FakeHost::remote("root@old").with_table("users", 5));
        host.fail_downloads(true);

        let err = Decommissioner::new(host.clone(), dir.path())
            .run(&ScriptedConfirmer::new([true]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "transfer-failed");
        assert!(!host.events().iter().any(|e| e == "stop_stack"));
        assert_eq!(std::fs::read_dir(dir.path().join("weekly")).unwrap().count(), 0);
    }
}
