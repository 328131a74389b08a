// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovery of existing artifacts, locally and in the object store.

use std::path::{Path, PathBuf};

use pgkeep_core::{ArtifactLocation, BackupArtifact, BackupClass, ObjectStore, PgkeepError};
use tracing::warn;

/// Everything `restore` without a selector shows.
#[derive(Debug, Default)]
pub struct Listing {
    /// Local artifacts per class, newest first.
    pub local: Vec<(BackupClass, Vec<BackupArtifact>)>,
    /// Remote artifacts of every class, newest first. Empty when no store is configured.
    pub remote: Vec<BackupArtifact>,
    /// Why the remote listing is missing, if it failed.
    pub remote_error: Option<String>,
}

impl Listing {
    pub fn is_empty(&self) -> bool {
        self.local.iter().all(|(_, artifacts)| artifacts.is_empty()) && self.remote.is_empty()
    }
}

/// `<backup_dir>/<class>/`.
pub fn class_dir(backup_dir: &Path, class: BackupClass) -> PathBuf {
    backup_dir.join(class.to_string())
}

/// Artifacts of `class` under `<backup_dir>/<class>/`, newest first.
///
/// Files whose names do not parse as artifacts (including `.partial`
/// leftovers) are ignored. A missing directory is an empty catalog.
pub fn list_local(backup_dir: &Path, class: BackupClass) -> Vec<BackupArtifact> {
    let dir = class_dir(backup_dir, class);
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot read backup directory");
            return Vec::new();
        }
    };

    let mut artifacts: Vec<BackupArtifact> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            BackupArtifact::from_local_path(&entry.path(), meta.len())
        })
        .filter(|artifact| artifact.class == class)
        .collect();
    newest_first(&mut artifacts);
    artifacts
}

/// Newest non-empty local artifact of `class`.
pub fn newest_local(backup_dir: &Path, class: BackupClass) -> Option<BackupArtifact> {
    list_local(backup_dir, class)
        .into_iter()
        .find(|artifact| artifact.size_bytes > 0)
}

/// Artifacts of `class` in the object store, newest first.
pub async fn list_remote(
    store: &dyn ObjectStore,
    class: BackupClass,
) -> Result<Vec<BackupArtifact>, PgkeepError> {
    let entries = store.list(&format!("{class}/")).await?;
    let mut artifacts: Vec<BackupArtifact> = entries
        .into_iter()
        .filter_map(|entry| {
            let (parsed_class, created_at) = BackupArtifact::parse_file_name(&entry.key)?;
            (parsed_class == class).then(|| BackupArtifact {
                class,
                created_at,
                location: ArtifactLocation::Remote(entry.key),
                size_bytes: entry.size_bytes,
                checksum_valid: false,
            })
        })
        .collect();
    newest_first(&mut artifacts);
    Ok(artifacts)
}

/// Local artifacts for every class, plus the remote catalog when a store is given.
pub async fn listing(backup_dir: &Path, store: Option<&dyn ObjectStore>) -> Listing {
    let local = BackupClass::ALL
        .iter()
        .map(|&class| (class, list_local(backup_dir, class)))
        .collect();

    let mut listing = Listing {
        local,
        ..Listing::default()
    };

    if let Some(store) = store {
        for class in BackupClass::ALL {
            match list_remote(store, class).await {
                Ok(artifacts) => listing.remote.extend(artifacts),
                Err(e) => {
                    warn!(class = %class, error = %e, "remote listing failed");
                    listing.remote_error = Some(e.to_string());
                    break;
                }
            }
        }
        newest_first(&mut listing.remote);
    }
    listing
}

fn newest_first(artifacts: &mut [BackupArtifact]) {
    artifacts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pgkeep_test_utils::MemoryStore;

    use super::*;

    fn touch(dir: &Path, class: BackupClass, day: u32, body: &[u8]) {
        let ts = Utc.with_ymd_and_hms(2026, 1, day, 3, 0, 0).unwrap();
        let sub = class_dir(dir, class);
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(sub.join(BackupArtifact::file_name_for(class, ts)), body).unwrap();
    }

    #[test]
    fn local_listing_is_newest_first_and_ignores_strays() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), BackupClass::Hourly, 3, b"x");
        touch(dir.path(), BackupClass::Hourly, 5, b"x");
        touch(dir.path(), BackupClass::Hourly, 4, b"x");
        let hourly = dir.path().join("hourly");
        std::fs::write(hourly.join("notes.txt"), b"x").unwrap();
        std::fs::write(hourly.join("backup_hourly_20260109_030000.sql.gz.partial"), b"x").unwrap();

        let days: Vec<u32> = list_local(dir.path(), BackupClass::Hourly)
            .iter()
            .map(|a| chrono::Datelike::day(&a.created_at))
            .collect();
        assert_eq!(days, vec![5, 4, 3]);
        assert!(list_local(dir.path(), BackupClass::Weekly).is_empty());
    }

    #[test]
    fn newest_local_skips_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), BackupClass::Daily, 1, b"data");
        touch(dir.path(), BackupClass::Daily, 2, b"");
        let newest = newest_local(dir.path(), BackupClass::Daily).unwrap();
        assert_eq!(chrono::Datelike::day(&newest.created_at), 1);
    }

    #[tokio::test]
    async fn remote_listing_filters_by_class() {
        let store = MemoryStore::new("bucket");
        store.insert("daily/backup_daily_20260101_030000.sql.gz", b"a");
        store.insert("daily/backup_daily_20260102_030000.sql.gz", b"b");
        store.insert("daily/readme.txt", b"c");
        store.insert("weekly/backup_weekly_20260101_040000.sql.gz", b"d");

        let daily = list_remote(&store, BackupClass::Daily).await.unwrap();
        assert_eq!(daily.len(), 2);
        assert_eq!(
            daily[0].location,
            ArtifactLocation::Remote("daily/backup_daily_20260102_030000.sql.gz".into())
        );

        let dir = tempfile::tempdir().unwrap();
        let all = listing(dir.path(), Some(&store as &dyn ObjectStore)).await;
        assert_eq!(all.remote.len(), 3);
        assert!(all.remote_error.is_none());
        assert!(all.local.iter().all(|(_, a)| a.is_empty()));
    }
}
