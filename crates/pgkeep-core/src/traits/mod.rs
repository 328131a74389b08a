// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seam traits between the pgkeep layers.
//!
//! Async traits use `#[async_trait]` for dynamic dispatch compatibility, so
//! engines can hold `&dyn Host` / `&dyn ObjectStore` and tests can swap in
//! in-memory fakes.

pub mod confirm;
pub mod host;
pub mod runner;
pub mod store;

pub use confirm::Confirmer;
pub use host::Host;
pub use runner::CommandRunner;
pub use store::{ObjectEntry, ObjectStore};
