// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backup creation: dump, verify, publish, upload, sweep.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pgkeep_core::{
    ArtifactLocation, BackupArtifact, BackupClass, Host, ObjectStore, PgkeepError,
    RetentionPolicy,
};
use tracing::{info, warn};

use crate::artifact::partial_path;
use crate::{catalog, retention};

/// What a successful backup did.
#[derive(Debug, Clone)]
pub struct BackupReport {
    pub artifact: BackupArtifact,
    /// Whether the artifact reached the object store.
    pub uploaded: bool,
    pub swept_local: Vec<PathBuf>,
    pub swept_remote: Vec<String>,
}

/// Dump `host`'s database into `path` on that host.
///
/// The dump is written to `<path>.partial`, checked for emptiness and
/// integrity, then renamed into place. On any failure the partial file is
/// removed, so `path` either holds a verified artifact or does not exist.
/// Returns the compressed size.
pub async fn dump_verified(host: &dyn Host, path: &Path) -> Result<u64, PgkeepError> {
    let staging = partial_path(path);

    let result = async {
        host.dump_to(&staging).await?;
        let size = match host.file_size(&staging).await? {
            Some(size) if size > 0 => size,
            _ => {
                return Err(PgkeepError::IntegrityCheckFailed {
                    path: path.display().to_string(),
                    reason: "dump is empty".to_string(),
                });
            }
        };
        host.verify_artifact(&staging).await?;
        host.rename(&staging, path).await?;
        Ok(size)
    }
    .await;

    if let Err(e) = &result {
        warn!(host = %host.label(), path = %staging.display(), error = %e, "discarding partial dump");
        if let Err(cleanup) = host.remove_file(&staging).await {
            warn!(path = %staging.display(), error = %cleanup, "failed to remove partial dump");
        }
    }
    result
}

/// Creates backups of one database host into the local backup directory.
pub struct BackupEngine {
    host: Arc<dyn Host>,
    store: Option<Arc<dyn ObjectStore>>,
    backup_dir: PathBuf,
    retention: RetentionPolicy,
}

impl BackupEngine {
    pub fn new(host: Arc<dyn Host>, backup_dir: impl Into<PathBuf>, retention: RetentionPolicy) -> Self {
        Self {
            host,
            store: None,
            backup_dir: backup_dir.into(),
            retention,
        }
    }

    /// Upload artifacts to `store` and sweep it after each backup.
    pub fn with_store(mut self, store: Option<Arc<dyn ObjectStore>>) -> Self {
        self.store = store;
        self
    }

    pub async fn create_backup(&self, class: BackupClass) -> Result<BackupReport, PgkeepError> {
        self.create_backup_at(class, Utc::now()).await
    }

    /// [`BackupEngine::create_backup`] with an explicit clock.
    pub async fn create_backup_at(
        &self,
        class: BackupClass,
        now: DateTime<Utc>,
    ) -> Result<BackupReport, PgkeepError> {
        let class_dir = catalog::class_dir(&self.backup_dir, class);
        std::fs::create_dir_all(&class_dir).map_err(|e| PgkeepError::io(&class_dir, e))?;

        let path = class_dir.join(BackupArtifact::file_name_for(class, now));
        info!(class = %class, path = %path.display(), "creating backup");
        let size_bytes = dump_verified(self.host.as_ref(), &path).await?;

        let artifact = BackupArtifact {
            class,
            created_at: now,
            location: ArtifactLocation::Local(path.clone()),
            size_bytes,
            checksum_valid: true,
        };
        info!(class = %class, path = %path.display(), size_bytes, "backup verified");

        let key = artifact.object_key();
        let uploaded = match &self.store {
            Some(store) => match store.put(&path, &key).await {
                Ok(()) => {
                    info!(uri = %store.uri(&key), "backup uploaded");
                    true
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "upload failed, backup kept locally");
                    false
                }
            },
            None => false,
        };

        let swept_local = retention::sweep_local(&self.backup_dir, class, &self.retention, now, &path);
        let swept_remote = match &self.store {
            Some(store) => {
                retention::sweep_remote(store.as_ref(), class, &self.retention, now, &key).await
            }
            None => Vec::new(),
        };

        Ok(BackupReport {
            artifact,
            uploaded,
            swept_local,
            swept_remote,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};
    use pgkeep_test_utils::{FakeHost, MemoryStore};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 14, 3, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn backup_produces_verified_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(FakeHost::local().with_table("users", 10));
        let engine = BackupEngine::new(host, dir.path(), RetentionPolicy::default());

        let report = engine.create_backup_at(BackupClass::Daily, now()).await.unwrap();

        let expected = dir.path().join("daily/backup_daily_20260114_030000.sql.gz");
        assert_eq!(report.artifact.local_path(), Some(expected.as_path()));
        assert!(report.artifact.checksum_valid);
        assert!(report.artifact.size_bytes > 0);
        assert!(!report.uploaded);
        crate::artifact::verify_gzip(&expected).unwrap();
        assert!(!partial_path(&expected).exists());
    }

    #[tokio::test]
    async fn empty_dump_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(FakeHost::local().with_table("users", 1));
        host.produce_empty_dumps(true);
        let engine = BackupEngine::new(host, dir.path(), RetentionPolicy::default());

        let err = engine.create_backup_at(BackupClass::Hourly, now()).await.unwrap_err();
        assert_eq!(err.kind(), "integrity-check-failed");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("hourly")).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn corrupt_dump_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(FakeHost::local().with_table("users", 1));
        host.produce_corrupt_dumps(true);
        let engine = BackupEngine::new(host, dir.path(), RetentionPolicy::default());

        let err = engine.create_backup_at(BackupClass::Weekly, now()).await.unwrap_err();
        assert!(matches!(err, PgkeepError::IntegrityCheckFailed { .. }));
        assert_eq!(std::fs::read_dir(dir.path().join("weekly")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn upload_and_remote_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new("b"));
        let stale = format!(
            "daily/{}",
            BackupArtifact::file_name_for(BackupClass::Daily, now() - TimeDelta::days(10))
        );
        store.insert(&stale, b"old");

        let host = Arc::new(FakeHost::local().with_table("users", 1));
        let engine = BackupEngine::new(host, dir.path(), RetentionPolicy::default())
            .with_store(Some(store.clone()));
        let report = engine.create_backup_at(BackupClass::Daily, now()).await.unwrap();

        assert!(report.uploaded);
        assert_eq!(report.swept_remote, vec![stale]);
        assert_eq!(store.keys(), vec!["daily/backup_daily_20260114_030000.sql.gz".to_string()]);
    }

    #[tokio::test]
    async fn upload_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new("b"));
        store.fail_puts(true);
        let host = Arc::new(FakeHost::local().with_table("users", 1));
        let engine = BackupEngine::new(host, dir.path(), RetentionPolicy::default())
            .with_store(Some(store.clone()));

        let report = engine.create_backup_at(BackupClass::Daily, now()).await.unwrap();
        assert!(!report.uploaded);
        assert!(report.artifact.local_path().unwrap().exists());
    }

    #[tokio::test]
    async fn local_sweep_runs_after_backup() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(FakeHost::local().with_table("users", 1));
        let engine = BackupEngine::new(host, dir.path(), RetentionPolicy::default());

        let first = engine
            .create_backup_at(BackupClass::Hourly, now() - TimeDelta::hours(30))
            .await
            .unwrap();
        let second = engine.create_backup_at(BackupClass::Hourly, now()).await.unwrap();

        let first_path = first.artifact.local_path().unwrap().to_path_buf();
        assert_eq!(second.swept_local, vec![first_path.clone()]);
        assert!(!first_path.exists());
    }
}
