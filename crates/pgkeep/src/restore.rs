// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pgkeep restore` and `pgkeep verify` command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use pgkeep_backup::catalog::Listing;
use pgkeep_backup::{Resolution, RestoreEngine, RestoreOutcome};
use pgkeep_config::PgkeepConfig;
use pgkeep_core::{ObjectStore, PgkeepError, Selector};

use crate::{prompt, setup};

fn engine(config: &PgkeepConfig) -> (RestoreEngine, Option<Arc<dyn ObjectStore>>) {
    let runner = setup::runner(config);
    let store = setup::object_store(config, runner.clone());
    let engine = RestoreEngine::new(
        setup::local_host(config, runner),
        PathBuf::from(&config.backup.dir),
        config.backup.staging_path(),
    )
    .with_store(store.clone());
    (engine, store)
}

/// Run `pgkeep restore [selector]`.
///
/// Without a selector the available backups are listed and nothing is restored.
pub async fn run_restore(
    config: &PgkeepConfig,
    selector: Option<&str>,
    assume_yes: bool,
    use_color: bool,
) -> Result<(), PgkeepError> {
    let selector = Selector::parse(selector)?;
    let (engine, store) = engine(config);

    let artifact = match engine.resolve(&selector).await? {
        Resolution::Listing(listing) => {
            print!("{}", render_listing(&listing, store.as_deref(), use_color));
            return Ok(());
        }
        Resolution::Artifact(artifact) => artifact,
    };

    let confirmer = prompt::confirmer(assume_yes);
    match engine.restore(&artifact, confirmer.as_ref()).await? {
        RestoreOutcome::Cancelled => println!("Restore cancelled."),
        RestoreOutcome::Restored(result) => {
            let line = format!(
                "Restored {} ({} tables in public schema)",
                result.artifact.location, result.table_count
            );
            if use_color {
                use colored::Colorize;
                println!("{}", line.green());
            } else {
                println!("{line}");
            }
        }
    }
    Ok(())
}

/// Run `pgkeep verify <selector>`.
pub async fn run_verify(config: &PgkeepConfig, selector: &str, use_color: bool) -> Result<(), PgkeepError> {
    let selector = Selector::parse(Some(selector))?;
    let (engine, _) = engine(config);
    let artifact = engine.verify(&selector).await?;

    let status = if use_color {
        use colored::Colorize;
        "intact".green().to_string()
    } else {
        "intact".to_string()
    };
    println!("{} ({} bytes): {status}", artifact.location, artifact.size_bytes);
    Ok(())
}

fn render_listing(listing: &Listing, store: Option<&dyn ObjectStore>, use_color: bool) -> String {
    let heading = |text: &str| {
        if use_color {
            use colored::Colorize;
            text.bold().to_string()
        } else {
            text.to_string()
        }
    };

    let mut out = String::new();
    for (class, artifacts) in &listing.local {
        out.push_str(&heading(&format!("{class} (local)")));
        out.push('\n');
        if artifacts.is_empty() {
            out.push_str("  none\n");
        }
        for artifact in artifacts {
            out.push_str(&format!(
                "  {}  {:>12} bytes  {}\n",
                artifact.created_at.format("%Y-%m-%d %H:%M:%S"),
                artifact.size_bytes,
                artifact.location
            ));
        }
    }

    if let Some(store) = store {
        out.push_str(&heading("remote"));
        out.push('\n');
        if let Some(error) = &listing.remote_error {
            out.push_str(&format!("  unavailable: {error}\n"));
        } else if listing.remote.is_empty() {
            out.push_str("  none\n");
        }
        for artifact in &listing.remote {
            out.push_str(&format!(
                "  {}  {:>12} bytes  {}\n",
                artifact.created_at.format("%Y-%m-%d %H:%M:%S"),
                artifact.size_bytes,
                store.uri(&artifact.location.to_string())
            ));
        }
    }

    out.push_str("\nRestore with `pgkeep restore latest[:<class>]`, an s3:// URI or a path.\n");
    out
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::{TimeZone, Utc};
    use pgkeep_core::{ArtifactLocation, BackupArtifact, BackupClass};
    use pgkeep_test_utils::MemoryStore;

    use super::*;

    fn artifact(location: ArtifactLocation) -> BackupArtifact {
        BackupArtifact {
            class: BackupClass::Daily,
            created_at: Utc.with_ymd_and_hms(2026, 1, 14, 3, 0, 0).unwrap(),
            location,
            size_bytes: 512,
            checksum_valid: false,
        }
    }

    #[test]
    fn listing_renders_local_and_remote_sections() {
        let listing = Listing {
            local: vec![
                (BackupClass::Hourly, vec![]),
                (
                    BackupClass::Daily,
                    vec![artifact(ArtifactLocation::Local(PathBuf::from("/b/daily/a.sql.gz")))],
                ),
            ],
            remote: vec![artifact(ArtifactLocation::Remote("daily/a.sql.gz".into()))],
            remote_error: None,
        };
        let store = MemoryStore::new("shop");
        let text = render_listing(&listing, Some(&store as &dyn ObjectStore), false);

        assert!(text.contains("hourly (local)\n  none\n"));
        assert!(text.contains("2026-01-14 03:00:00           512 bytes  /b/daily/a.sql.gz"));
        assert!(text.contains("remote\n"));
        assert!(text.contains("s3://shop/daily/a.sql.gz"));
    }

    #[test]
    fn remote_section_is_omitted_without_store() {
        let listing = Listing::default();
        let text = render_listing(&listing, None, false);
        assert!(!text.contains("remote"));
    }

    #[tokio::test]
    async fn missing_backup_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PgkeepConfig::default();
        config.backup.dir = dir.path().display().to_string();

        let err = run_restore(&config, Some("latest:hourly"), true, false).await.unwrap_err();
        assert_eq!(err.kind(), "backup-not-found");

        let err = run_verify(&config, "/nonexistent/x.sql.gz", false).await.unwrap_err();
        assert_eq!(err.kind(), "backup-not-found");
    }
}
