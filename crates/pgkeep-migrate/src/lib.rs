// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Moving a database between hosts, and retiring a host.
//!
//! A migration is a linear sequence of steps driven by [`Migrator`]. Every
//! step before the destination is touched fails closed; once the source
//! export exists, temporary copies are removed on every exit path.

pub mod decommission;
pub mod orchestrator;
pub mod session;

pub use decommission::{DecommissionOutcome, DecommissionReport, Decommissioner};
pub use orchestrator::Migrator;
pub use session::{MigrationOutcome, MigrationReport, MigrationSession, MigrationState, Verification};
