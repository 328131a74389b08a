// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Migration state tracking.

use strum::Display;
use tracing::info;

/// Steps of a migration, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum MigrationState {
    Confirm,
    BackupOnSource,
    TransferArtifact,
    RestoreOnDestination,
    Verify,
    Cleanup,
    Done,
    Cancelled,
}

/// Table counts compared after a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub source_table_count: u64,
    pub dest_table_count: u64,
    pub matched: bool,
}

impl Verification {
    pub fn new(source_table_count: u64, dest_table_count: u64) -> Self {
        Self {
            source_table_count,
            dest_table_count,
            matched: source_table_count == dest_table_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// A confirmation was declined; nothing ran.
    Cancelled,
    Completed(Verification),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub id: String,
    pub outcome: MigrationOutcome,
    /// Every state entered, in order.
    pub states: Vec<MigrationState>,
}

/// One migration run: its identifier and the states it went through.
#[derive(Debug)]
pub struct MigrationSession {
    id: String,
    states: Vec<MigrationState>,
}

impl MigrationSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            states: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The state most recently entered.
    pub fn state(&self) -> Option<MigrationState> {
        self.states.last().copied()
    }

    pub fn advance(&mut self, next: MigrationState) {
        info!(migration = %self.id, state = %next, "migration step");
        self.states.push(next);
    }

    pub fn finish(self, outcome: MigrationOutcome) -> MigrationReport {
        MigrationReport {
            id: self.id,
            outcome,
            states: self.states,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_matches_on_equal_counts() {
        assert!(Verification::new(4, 4).matched);
        assert!(!Verification::new(4, 3).matched);
    }

    #[test]
    fn session_records_states_in_order() {
        let mut session = MigrationSession::new("abc");
        assert_eq!(session.id(), "abc");
        assert_eq!(session.state(), None);
        session.advance(MigrationState::Confirm);
        session.advance(MigrationState::Cancelled);
        assert_eq!(session.state(), Some(MigrationState::Cancelled));

        let report = session.finish(MigrationOutcome::Cancelled);
        assert_eq!(report.id, "abc");
        assert_eq!(
            report.states,
            vec![MigrationState::Confirm, MigrationState::Cancelled]
        );
        assert_eq!(MigrationState::RestoreOnDestination.to_string(), "restore_on_destination");
    }
}
