// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Selector resolution, verification and restore of local artifacts.
//!
//! Artifacts fetched from the object store land in the staging directory
//! and are removed once they have been verified or restored.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pgkeep_core::{
    ArtifactLocation, BackupArtifact, BackupClass, Confirmer, Host, ObjectStore, PgkeepError,
    Selector,
};
use tracing::{debug, info, warn};

use crate::catalog::{self, Listing};

/// What a selector resolved to.
#[derive(Debug)]
pub enum Resolution {
    /// No selector: show what exists.
    Listing(Listing),
    /// A local, non-empty artifact ready to verify or restore.
    Artifact(BackupArtifact),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreResult {
    pub artifact: BackupArtifact,
    /// Tables in the public schema after the restore.
    pub table_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The operator declined; nothing was touched.
    Cancelled,
    Restored(RestoreResult),
}

/// Apply a dump at `path` on `host` with its services stopped.
///
/// Integrity is re-checked after the services are down and before the
/// database is touched. Services are restarted whatever happens; stop and
/// start failures are only logged.
pub async fn apply_artifact(host: &dyn Host, path: &Path) -> Result<(), PgkeepError> {
    if let Err(e) = host.stop_services().await {
        warn!(host = %host.label(), error = %e, "failed to stop services");
    }

    let applied = match host.verify_artifact(path).await {
        Ok(()) => host.apply_dump(path).await,
        Err(e) => Err(e),
    };

    if let Err(e) = host.start_services().await {
        warn!(host = %host.label(), error = %e, "failed to start services");
    }
    applied
}

/// Restores artifacts into the local database.
pub struct RestoreEngine {
    host: Arc<dyn Host>,
    store: Option<Arc<dyn ObjectStore>>,
    backup_dir: PathBuf,
    staging_dir: PathBuf,
}

impl RestoreEngine {
    pub fn new(host: Arc<dyn Host>, backup_dir: impl Into<PathBuf>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            host,
            store: None,
            backup_dir: backup_dir.into(),
            staging_dir: staging_dir.into(),
        }
    }

    pub fn with_store(mut self, store: Option<Arc<dyn ObjectStore>>) -> Self {
        self.store = store;
        self
    }

    /// Turn a selector into a listing or a local artifact.
    ///
    /// Remote artifacts are downloaded into the staging directory first.
    pub async fn resolve(&self, selector: &Selector) -> Result<Resolution, PgkeepError> {
        let artifact = match selector {
            Selector::List => {
                let listing = catalog::listing(&self.backup_dir, self.store.as_deref()).await;
                return Ok(Resolution::Listing(listing));
            }
            Selector::Latest(class) => self.resolve_latest(*class).await?,
            Selector::RemoteUri(uri) => {
                let store = self.store.as_deref().ok_or_else(|| {
                    PgkeepError::InvalidArgument(format!(
                        "cannot fetch {uri}: no object store configured"
                    ))
                })?;
                let key = store.key_from_uri(uri).ok_or_else(|| {
                    PgkeepError::InvalidArgument(format!(
                        "{uri} is not in bucket `{}`",
                        store.bucket()
                    ))
                })?;
                self.download(store, key).await?
            }
            Selector::LocalPath(path) => local_artifact(path)?,
        };
        Ok(Resolution::Artifact(artifact))
    }

    /// Resolve a selector that must name an artifact.
    pub async fn resolve_artifact(&self, selector: &Selector) -> Result<BackupArtifact, PgkeepError> {
        match self.resolve(selector).await? {
            Resolution::Artifact(artifact) => Ok(artifact),
            Resolution::Listing(_) => Err(PgkeepError::InvalidArgument(
                "a backup selector is required".to_string(),
            )),
        }
    }

    async fn resolve_latest(&self, class: BackupClass) -> Result<BackupArtifact, PgkeepError> {
        if let Some(artifact) = catalog::newest_local(&self.backup_dir, class) {
            return Ok(artifact);
        }
        let not_found = || PgkeepError::BackupNotFound(format!("no {class} backups"));
        let Some(store) = self.store.as_deref() else {
            return Err(not_found());
        };

        let remote = catalog::list_remote(store, class).await?;
        let newest = remote.into_iter().next().ok_or_else(not_found)?;
        info!(class = %class, key = %newest.location, "no local backup, using remote copy");
        self.download(store, &newest.location.to_string()).await
    }

    async fn download(&self, store: &dyn ObjectStore, key: &str) -> Result<BackupArtifact, PgkeepError> {
        std::fs::create_dir_all(&self.staging_dir)
            .map_err(|e| PgkeepError::io(&self.staging_dir, e))?;
        let name = key.rsplit('/').next().unwrap_or(key);
        let local = self.staging_dir.join(name);

        if let Err(e) = store.get(key, &local).await {
            self.discard_staged(&local);
            return Err(PgkeepError::BackupNotFound(format!("{}: {e}", store.uri(key))));
        }
        local_artifact(&local).inspect_err(|_| self.discard_staged(&local))
    }

    /// Remove `path` if it is a download in the staging directory.
    fn discard_staged(&self, path: &Path) {
        if !path.starts_with(&self.staging_dir) {
            return;
        }
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "staged download removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove staged download"),
        }
    }

    /// Streaming integrity check of the selected artifact.
    pub async fn verify(&self, selector: &Selector) -> Result<BackupArtifact, PgkeepError> {
        let mut artifact = self.resolve_artifact(selector).await?;
        let path = local_path(&artifact)?;
        let verified = self.host.verify_artifact(&path).await;
        self.discard_staged(&path);
        verified?;
        artifact.checksum_valid = true;
        info!(path = %path.display(), size_bytes = artifact.size_bytes, "backup verified");
        Ok(artifact)
    }

    /// Restore `artifact` into the local database after confirmation.
    pub async fn restore(
        &self,
        artifact: &BackupArtifact,
        confirmer: &dyn Confirmer,
    ) -> Result<RestoreOutcome, PgkeepError> {
        let path = local_path(artifact)?;
        let outcome = self.confirm_and_apply(artifact, &path, confirmer).await;
        self.discard_staged(&path);
        outcome
    }

    async fn confirm_and_apply(
        &self,
        artifact: &BackupArtifact,
        path: &Path,
        confirmer: &dyn Confirmer,
    ) -> Result<RestoreOutcome, PgkeepError> {
        let prompt = format!(
            "Restore {} into the {} database? Current data will be replaced.",
            path.display(),
            self.host.label()
        );
        if !confirmer.confirm(&prompt)? {
            info!(path = %path.display(), "restore cancelled");
            return Ok(RestoreOutcome::Cancelled);
        }

        apply_artifact(self.host.as_ref(), path).await?;
        let table_count = self.host.count_tables().await?;
        info!(path = %path.display(), table_count, "restore complete");

        let mut artifact = artifact.clone();
        artifact.checksum_valid = true;
        Ok(RestoreOutcome::Restored(RestoreResult {
            artifact,
            table_count,
        }))
    }
}

fn local_path(artifact: &BackupArtifact) -> Result<PathBuf, PgkeepError> {
    match &artifact.location {
        ArtifactLocation::Local(path) => Ok(path.clone()),
        ArtifactLocation::Remote(key) => Err(PgkeepError::InvalidArgument(format!(
            "{key} must be downloaded before use"
        ))),
    }
}

/// Describe an existing, non-empty local file as an artifact.
///
/// Names that do not follow the artifact layout are accepted as `daily`
/// with the file's modification time.
fn local_artifact(path: &Path) -> Result<BackupArtifact, PgkeepError> {
    let meta = match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta,
        _ => {
            return Err(PgkeepError::BackupNotFound(format!(
                "{} does not exist",
                path.display()
            )));
        }
    };
    if meta.len() == 0 {
        return Err(PgkeepError::BackupNotFound(format!(
            "{} is empty",
            path.display()
        )));
    }

    if let Some(artifact) = BackupArtifact::from_local_path(path, meta.len()) {
        return Ok(artifact);
    }
    let created_at = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());
    Ok(BackupArtifact {
        class: BackupClass::Daily,
        created_at,
        location: ArtifactLocation::Local(path.to_path_buf()),
        size_bytes: meta.len(),
        checksum_valid: false,
    })
}
