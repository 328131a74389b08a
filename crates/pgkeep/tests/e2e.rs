// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end flows across the backup, restore and migration engines.
//!
//! Every test builds its own fake hosts and scratch directories; tests are
//! independent and order-insensitive.

use std::sync::Arc;

use chrono::{TimeDelta, TimeZone, Utc};
use pgkeep_backup::{BackupEngine, RestoreEngine, RestoreOutcome};
use pgkeep_core::{BackupClass, Host, RetentionPolicy, Selector};
use pgkeep_migrate::{MigrationOutcome, Migrator};
use pgkeep_test_utils::{FakeHost, MemoryStore, ScriptedConfirmer};

// ---- Backup then restore ----

#[tokio::test]
async fn test_daily_backup_restores_three_tables() {
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(
        FakeHost::local()
            .with_table("users", 10)
            .with_table("orders", 30)
            .with_table("invoices", 2),
    );

    BackupEngine::new(host.clone(), dir.path(), RetentionPolicy::default())
        .create_backup(BackupClass::Daily)
        .await
        .unwrap();

    let engine = RestoreEngine::new(host.clone(), dir.path(), dir.path().join("staging"));
    let artifact = engine
        .resolve_artifact(&Selector::parse(Some("latest")).unwrap())
        .await
        .unwrap();
    let outcome = engine
        .restore(&artifact, &ScriptedConfirmer::new([true]))
        .await
        .unwrap();

    let RestoreOutcome::Restored(result) = outcome else {
        panic!("confirmed restore must run");
    };
    assert_eq!(result.table_count, 3);
    assert_eq!(host.count_tables().await.unwrap(), 3);
}

#[tokio::test]
async fn test_backup_is_verified_or_absent() {
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(FakeHost::local().with_table("users", 1));
    let engine = BackupEngine::new(host.clone(), dir.path(), RetentionPolicy::default());

    let ok = engine.create_backup(BackupClass::Hourly).await.unwrap();
    assert!(ok.artifact.size_bytes > 0);
    pgkeep_backup::artifact::verify_gzip(ok.artifact.local_path().unwrap()).unwrap();

    host.produce_corrupt_dumps(true);
    let err = engine
        .create_backup_at(BackupClass::Weekly, Utc::now())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "integrity-check-failed");
    assert!(pgkeep_backup::catalog::list_local(dir.path(), BackupClass::Weekly).is_empty());
}

// ---- Selectors ----

#[tokio::test]
async fn test_latest_hourly_picks_max_created_at() {
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(FakeHost::local().with_table("users", 1));
    let engine = BackupEngine::new(host.clone(), dir.path(), RetentionPolicy::default());
    let base = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();
    for hour in [3, 9, 6] {
        engine
            .create_backup_at(BackupClass::Hourly, base + TimeDelta::hours(hour))
            .await
            .unwrap();
    }

    let restore = RestoreEngine::new(host, dir.path(), dir.path().join("staging"));
    let newest = restore
        .resolve_artifact(&Selector::parse(Some("latest:hourly")).unwrap())
        .await
        .unwrap();
    assert_eq!(newest.created_at, base + TimeDelta::hours(9));

    let err = restore
        .resolve(&Selector::parse(Some("latest:weekly")).unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "backup-not-found");

    let err = Selector::parse(Some("latest:monthly")).unwrap_err();
    assert_eq!(err.kind(), "invalid-argument");
}

#[tokio::test]
async fn test_remote_uri_restores_from_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new("shop-backups"));
    let source = Arc::new(FakeHost::local().with_table("users", 8).with_table("carts", 1));
    let report = BackupEngine::new(source.clone(), dir.path().join("origin"), RetentionPolicy::default())
        .with_store(Some(store.clone()))
        .create_backup(BackupClass::Daily)
        .await
        .unwrap();
    assert!(report.uploaded);

    let target = Arc::new(FakeHost::local());
    let restore = RestoreEngine::new(target.clone(), dir.path().join("here"), dir.path().join("staging"))
        .with_store(Some(store));
    let uri = format!("s3://shop-backups/{}", report.artifact.object_key());
    let artifact = restore
        .resolve_artifact(&Selector::parse(Some(&uri)).unwrap())
        .await
        .unwrap();
    restore
        .restore(&artifact, &ScriptedConfirmer::new([true]))
        .await
        .unwrap();

    assert_eq!(target.tables(), source.tables());
}

// ---- Retention ----

#[tokio::test]
async fn test_retention_window_is_exact() {
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(FakeHost::local().with_table("users", 1));
    let engine = BackupEngine::new(host, dir.path(), RetentionPolicy::default());
    let now = Utc.with_ymd_and_hms(2026, 4, 30, 4, 0, 0).unwrap();

    let expired = now - TimeDelta::days(30) - TimeDelta::seconds(1);
    let boundary = now - TimeDelta::days(30);
    engine.create_backup_at(BackupClass::Weekly, expired).await.unwrap();
    engine.create_backup_at(BackupClass::Weekly, boundary).await.unwrap();
    engine.create_backup_at(BackupClass::Weekly, now).await.unwrap();

    let remaining: Vec<_> = pgkeep_backup::catalog::list_local(dir.path(), BackupClass::Weekly)
        .into_iter()
        .map(|a| a.created_at)
        .collect();
    assert_eq!(remaining, vec![now, boundary]);
}

// ---- Migration ----

#[tokio::test]
async fn test_migrate_users_into_empty_destination() {
    let staging = tempfile::tempdir().unwrap();
    let source = Arc::new(FakeHost::remote("root@old-droplet").with_table("users", 100));
    let dest = Arc::new(FakeHost::remote("root@new-droplet"));

    let report = Migrator::new(source.clone(), dest.clone(), staging.path())
        .run(&ScriptedConfirmer::new([true, true]))
        .await
        .unwrap();

    let MigrationOutcome::Completed(verification) = report.outcome else {
        panic!("confirmed migration must complete");
    };
    assert!(verification.matched);
    assert_eq!(dest.row_count("users"), Some(100));
    assert_eq!(source.row_count("users"), Some(100));
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_migration_transfer_failure_leaves_destination_unchanged() {
    let staging = tempfile::tempdir().unwrap();
    let source = Arc::new(FakeHost::remote("root@old").with_table("users", 100));
    let dest = Arc::new(FakeHost::remote("root@new").with_table("users", 4));
    dest.fail_uploads(true);
    let before = dest.tables();

    let err = Migrator::new(source, dest.clone(), staging.path())
        .run(&ScriptedConfirmer::new([true, true]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "transfer-failed");
    assert_eq!(dest.tables(), before);
}

// ---- Cancellation ----

#[tokio::test]
async fn test_declined_confirmations_have_no_side_effects() {
    let staging = tempfile::tempdir().unwrap();
    for answers in [vec![false], vec![true, false]] {
        let source = Arc::new(FakeHost::remote("root@old").with_table("users", 100));
        let dest = Arc::new(FakeHost::remote("root@new"));
        let report = Migrator::new(source.clone(), dest.clone(), staging.path())
            .run(&ScriptedConfirmer::new(answers))
            .await
            .unwrap();
        assert_eq!(report.outcome, MigrationOutcome::Cancelled);
        assert!(source.events().is_empty());
        assert!(dest.events().is_empty());
    }

    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(FakeHost::local().with_table("users", 2));
    let report = BackupEngine::new(host.clone(), dir.path(), RetentionPolicy::default())
        .create_backup(BackupClass::Daily)
        .await
        .unwrap();
    host.clear_events();
    let outcome = RestoreEngine::new(host.clone(), dir.path(), dir.path().join("staging"))
        .restore(&report.artifact, &ScriptedConfirmer::new([false]))
        .await
        .unwrap();
    assert_eq!(outcome, RestoreOutcome::Cancelled);
    assert!(host.events().is_empty());
}
