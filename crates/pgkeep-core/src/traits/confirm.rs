// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Confirmation capability for operations that mutate a database.

use crate::error::PgkeepError;

/// Asks the operator for an explicit "proceed" acknowledgment.
///
/// Returns `Ok(false)` when the operator declines; that is a cancellation,
/// not a failure.
pub trait Confirmer: Send + Sync {
    fn confirm(&self, prompt: &str) -> Result<bool, PgkeepError>;
}
