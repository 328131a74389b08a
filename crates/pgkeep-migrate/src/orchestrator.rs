// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source-to-destination migration.
//!
//! ```text
//! Confirm -> BackupOnSource -> TransferArtifact -> RestoreOnDestination -> Verify -> Cleanup
//!    \-> Cancelled
//! ```
//!
//! The export travels source -> local staging -> destination as a file and
//! is verified at each hop. The destination database is not touched until
//! the artifact has arrived intact.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pgkeep_backup::artifact;
use pgkeep_backup::{apply_artifact, dump_verified};
use pgkeep_core::{Confirmer, Host, PgkeepError};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::session::{MigrationOutcome, MigrationReport, MigrationSession, MigrationState, Verification};

/// Migrates the database of one host onto another.
pub struct Migrator {
    source: Arc<dyn Host>,
    dest: Arc<dyn Host>,
    staging_dir: PathBuf,
    id: String,
}

impl Migrator {
    pub fn new(source: Arc<dyn Host>, dest: Arc<dyn Host>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            dest,
            staging_dir: staging_dir.into(),
            id: Uuid::new_v4().simple().to_string(),
        }
    }

    /// Use a fixed identifier instead of a random one.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    fn file_name(&self) -> String {
        format!("pgkeep-migrate-{}.sql.gz", self.id)
    }

    /// Path of the export on the source and destination hosts.
    pub fn remote_path(&self) -> PathBuf {
        Path::new("/tmp").join(self.file_name())
    }

    /// Path of the export in local staging.
    pub fn local_path(&self) -> PathBuf {
        self.staging_dir.join(self.file_name())
    }

    /// Run the migration. Both confirmations are asked before anything runs.
    pub async fn run(&self, confirmer: &dyn Confirmer) -> Result<MigrationReport, PgkeepError> {
        let mut session = MigrationSession::new(self.id.clone());
        session.advance(MigrationState::Confirm);

        let reviewed = confirmer.confirm(&format!(
            "Migrate the database from {} to {}? Data on {} will be replaced. Have you reviewed this migration?",
            self.source.label(),
            self.dest.label(),
            self.dest.label()
        ))?;
        if !reviewed || !confirmer.confirm("Proceed with the migration?")? {
            session.advance(MigrationState::Cancelled);
            info!(migration = %session.id(), "migration cancelled");
            return Ok(session.finish(MigrationOutcome::Cancelled));
        }

        let result = self.execute(&mut session).await;
        if let Err(e) = &result {
            error!(
                migration = %session.id(),
                state = %session.state().unwrap_or(MigrationState::Confirm),
                error = %e,
                "migration failed"
            );
        }

        session.advance(MigrationState::Cleanup);
        self.cleanup().await;

        let verification = result?;
        session.advance(MigrationState::Done);
        Ok(session.finish(MigrationOutcome::Completed(verification)))
    }

    async fn execute(&self, session: &mut MigrationSession) -> Result<Verification, PgkeepError> {
        let remote = self.remote_path();

        session.advance(MigrationState::BackupOnSource);
        let size = dump_verified(self.source.as_ref(), &remote).await?;
        info!(host = %self.source.label(), path = %remote.display(), size, "source exported");

        session.advance(MigrationState::TransferArtifact);
        self.transfer(&remote, size).await?;

        session.advance(MigrationState::RestoreOnDestination);
        apply_artifact(self.dest.as_ref(), &remote).await?;

        session.advance(MigrationState::Verify);
        let verification = Verification::new(
            self.source.count_tables().await?,
            self.dest.count_tables().await?,
        );
        if verification.matched {
            info!(tables = verification.dest_table_count, "table counts match");
        } else {
            warn!(
                source_tables = verification.source_table_count,
                dest_tables = verification.dest_table_count,
                "table counts differ after migration"
            );
        }
        Ok(verification)
    }

    /// source -> local staging -> destination, checking size and integrity at each hop.
    async fn transfer(&self, remote: &Path, size: u64) -> Result<(), PgkeepError> {
        let local = self.local_path();
        std::fs::create_dir_all(&self.staging_dir)
            .map_err(|e| PgkeepError::transfer("cannot create staging directory", PgkeepError::io(&self.staging_dir, e)))?;

        self.source
            .download(remote, &local)
            .await
            .map_err(|e| PgkeepError::transfer(format!("download from {} failed", self.source.label()), e))?;
        match artifact::file_size(&local) {
            Ok(Some(local_size)) if local_size == size => {}
            Ok(other) => {
                return Err(PgkeepError::TransferFailed {
                    message: format!(
                        "local copy has {} bytes, source export has {size}",
                        other.unwrap_or(0)
                    ),
                    source: None,
                });
            }
            Err(e) => return Err(PgkeepError::transfer("cannot inspect local copy", e)),
        }
        artifact::verify_gzip(&local)
            .map_err(|e| PgkeepError::transfer("local copy is corrupt", e))?;

        self.dest
            .upload(&local, remote)
            .await
            .map_err(|e| PgkeepError::transfer(format!("upload to {} failed", self.dest.label()), e))?;
        match self.dest.file_size(remote).await {
            Ok(Some(dest_size)) if dest_size == size => Ok(()),
            Ok(other) => Err(PgkeepError::TransferFailed {
                message: format!(
                    "copy on {} has {} bytes, expected {size}",
                    self.dest.label(),
                    other.unwrap_or(0)
                ),
                source: None,
            }),
            Err(e) => Err(PgkeepError::transfer("cannot inspect destination copy", e)),
        }
    }

    /// Remove every temporary copy. Failures are logged and skipped.
    async fn cleanup(&self) {
        let remote = self.remote_path();
        let local = self.local_path();

        if let Err(e) = std::fs::remove_file(&local) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %local.display(), error = %e, "failed to remove staged export");
            }
        }
        for host in [&self.dest, &self.source] {
            if let Err(e) = host.remove_file(&remote).await {
                warn!(host = %host.label(), path = %remote.display(), error = %e, "failed to remove export");
            }
        }
    }
}
