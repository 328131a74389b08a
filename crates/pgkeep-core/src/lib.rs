// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for pgkeep.
//!
//! This crate provides the error taxonomy, the domain types shared by the
//! backup, restore and migration layers, and the seam traits (command
//! runner, host, object store, confirmer) that the other crates implement.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::PgkeepError;
pub use types::{
    ArtifactLocation, BackupArtifact, BackupClass, CommandSpec, Outcome, RemoteEndpoint,
    RetentionPolicy, Selector, Target,
};

pub use traits::{CommandRunner, Confirmer, Host, ObjectEntry, ObjectStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pgkeep_error_has_all_variants() {
        let errors = [
            PgkeepError::InvalidArgument("x".into()),
            PgkeepError::IntegrityCheckFailed {
                path: "/tmp/a".into(),
                reason: "truncated".into(),
            },
            PgkeepError::BackupNotFound("latest:daily".into()),
            PgkeepError::TransferFailed {
                message: "scp".into(),
                source: None,
            },
            PgkeepError::RemoteCommandFailed {
                command: "psql".into(),
                exit_code: 2,
                stderr: "boom".into(),
            },
            PgkeepError::RemoteTimeout {
                command: "ssh".into(),
                duration: std::time::Duration::from_secs(5),
            },
            PgkeepError::Io {
                path: "/tmp".into(),
                source: std::io::Error::other("test"),
            },
            PgkeepError::Config("bad".into()),
            PgkeepError::ObjectStore("denied".into()),
        ];

        let kinds: Vec<&str> = errors.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                "invalid-argument",
                "integrity-check-failed",
                "backup-not-found",
                "transfer-failed",
                "remote-command-failed",
                "remote-timeout",
                "io",
                "config",
                "object-store",
            ]
        );
    }

    #[test]
    fn all_traits_are_exported() {
        fn _assert_runner<T: CommandRunner>() {}
        fn _assert_host<T: Host>() {}
        fn _assert_store<T: ObjectStore>() {}
        fn _assert_confirmer<T: Confirmer>() {}
    }
}
