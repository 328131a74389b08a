// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for pgkeep.
//!
//! Fakes for every seam the engines depend on, so backup, restore and
//! migration flows run deterministically without PostgreSQL, SSH or an
//! object store.
//!
//! # Components
//!
//! - [`FakeHost`] - In-memory database host that writes real gzip dumps
//! - [`MemoryStore`] - Object store held in a map
//! - [`ScriptedConfirmer`] - Confirmer answering from a queue
//! - [`RecordingRunner`] - Command runner that records specs and replays canned outcomes

pub mod fake_host;
pub mod memory_store;
pub mod recording_runner;
pub mod scripted_confirmer;

pub use fake_host::FakeHost;
pub use memory_store::MemoryStore;
pub use recording_runner::RecordingRunner;
pub use scripted_confirmer::ScriptedConfirmer;
