// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retention sweeps. Failures are logged and skipped; a sweep never fails
//! the backup that triggered it.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use pgkeep_core::{BackupArtifact, BackupClass, ObjectStore, RetentionPolicy};
use tracing::{info, warn};

use crate::artifact::PARTIAL_SUFFIX;
use crate::catalog;

/// Delete local artifacts of `class` strictly older than the class window.
///
/// `.partial` files left behind by interrupted runs expire the same way.
/// `keep` is never deleted. Returns the deleted paths.
pub fn sweep_local(
    backup_dir: &Path,
    class: BackupClass,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
    keep: &Path,
) -> Vec<PathBuf> {
    let mut deleted = Vec::new();
    for artifact in catalog::list_local(backup_dir, class) {
        let Some(path) = artifact.local_path() else {
            continue;
        };
        if path == keep || !policy.is_expired(class, artifact.created_at, now) {
            continue;
        }
        match std::fs::remove_file(path) {
            Ok(()) => {
                info!(path = %path.display(), "expired backup removed");
                deleted.push(path.to_path_buf());
            }
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove expired backup"),
        }
    }

    for (path, created_at) in leftover_partials(backup_dir, class) {
        if !policy.is_expired(class, created_at, now) {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "stale partial file removed");
                deleted.push(path);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial file"),
        }
    }
    deleted
}

/// `.partial` files in the class directory with the time they were started:
/// the timestamp in the name, else the modification time.
fn leftover_partials(backup_dir: &Path, class: BackupClass) -> Vec<(PathBuf, DateTime<Utc>)> {
    let Ok(entries) = std::fs::read_dir(catalog::class_dir(backup_dir, class)) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            let stem = path.file_name()?.to_str()?.strip_suffix(PARTIAL_SUFFIX)?;
            let created_at = match BackupArtifact::parse_file_name(stem) {
                Some((_, at)) => at,
                None => entry.metadata().ok()?.modified().ok()?.into(),
            };
            Some((path, created_at))
        })
        .collect()
}

/// Delete remote objects under `<class>/` strictly older than the class window.
///
/// Keys that do not parse as artifact names are left alone, as is `keep`.
/// Returns the deleted keys.
pub async fn sweep_remote(
    store: &dyn ObjectStore,
    class: BackupClass,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
    keep: &str,
) -> Vec<String> {
    let artifacts = match catalog::list_remote(store, class).await {
        Ok(artifacts) => artifacts,
        Err(e) => {
            warn!(class = %class, error = %e, "remote retention sweep skipped");
            return Vec::new();
        }
    };

    let mut deleted = Vec::new();
    for artifact in artifacts {
        let key = artifact.location.to_string();
        if key == keep || !policy.is_expired(class, artifact.created_at, now) {
            continue;
        }
        match store.delete(&key).await {
            Ok(()) => {
                info!(key = %key, "expired remote backup removed");
                deleted.push(key);
            }
            Err(e) => warn!(key = %key, error = %e, "failed to remove expired remote backup"),
        }
    }
    deleted
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};
    use pgkeep_test_utils::MemoryStore;

    use crate::artifact::partial_path;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn write(dir: &Path, class: BackupClass, at: DateTime<Utc>) -> PathBuf {
        let class_dir = catalog::class_dir(dir, class);
        std::fs::create_dir_all(&class_dir).unwrap();
        let path = class_dir.join(BackupArtifact::file_name_for(class, at));
        std::fs::write(&path, b"dump").unwrap();
        path
    }

    #[test]
    fn local_sweep_removes_only_strictly_expired() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RetentionPolicy::default();
        let expired = write(dir.path(), BackupClass::Hourly, now() - TimeDelta::hours(25));
        let boundary = write(dir.path(), BackupClass::Hourly, now() - TimeDelta::days(1));
        let fresh = write(dir.path(), BackupClass::Hourly, now() - TimeDelta::hours(2));
        let other_class = write(dir.path(), BackupClass::Daily, now() - TimeDelta::days(3));
        let current = write(dir.path(), BackupClass::Hourly, now());

        let deleted = sweep_local(dir.path(), BackupClass::Hourly, &policy, now(), &current);

        assert_eq!(deleted, vec![expired.clone()]);
        assert!(!expired.exists());
        assert!(boundary.exists());
        assert!(fresh.exists());
        assert!(other_class.exists());
        assert!(current.exists());
    }

    #[test]
    fn local_sweep_never_deletes_the_kept_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RetentionPolicy::from_days(1, 1, 1);
        let old = write(dir.path(), BackupClass::Weekly, now() - TimeDelta::days(90));
        let deleted = sweep_local(dir.path(), BackupClass::Weekly, &policy, now(), &old);
        assert!(deleted.is_empty());
        assert!(old.exists());
    }

    #[test]
    fn local_sweep_removes_stale_partials() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RetentionPolicy::default();
        let interrupted = |at: DateTime<Utc>| {
            let finished = write(dir.path(), BackupClass::Daily, at);
            let partial = partial_path(&finished);
            std::fs::rename(&finished, &partial).unwrap();
            partial
        };
        let stale = interrupted(now() - TimeDelta::days(9));
        let in_progress = interrupted(now());
        let current = write(dir.path(), BackupClass::Daily, now() - TimeDelta::hours(1));

        let deleted = sweep_local(dir.path(), BackupClass::Daily, &policy, now(), &current);

        assert_eq!(deleted, vec![stale.clone()]);
        assert!(!stale.exists());
        assert!(in_progress.exists());
        assert!(current.exists());
    }

    #[tokio::test]
    async fn remote_sweep_deletes_expired_keys() {
        let store = MemoryStore::new("b");
        let old = format!(
            "daily/{}",
            BackupArtifact::file_name_for(BackupClass::Daily, now() - TimeDelta::days(8))
        );
        let recent = format!(
            "daily/{}",
            BackupArtifact::file_name_for(BackupClass::Daily, now() - TimeDelta::days(6))
        );
        store.insert(&old, b"x");
        store.insert(&recent, b"x");
        store.insert("daily/manual-copy.sql.gz", b"x");

        let deleted =
            sweep_remote(&store, BackupClass::Daily, &RetentionPolicy::default(), now(), "").await;

        assert_eq!(deleted, vec![old]);
        assert_eq!(store.keys(), vec![recent, "daily/manual-copy.sql.gz".to_string()]);
    }

    #[tokio::test]
    async fn remote_sweep_survives_listing_failure() {
        let store = MemoryStore::new("b");
        store.fail_lists(true);
        let deleted =
            sweep_remote(&store, BackupClass::Daily, &RetentionPolicy::default(), now(), "").await;
        assert!(deleted.is_empty());
    }
}
