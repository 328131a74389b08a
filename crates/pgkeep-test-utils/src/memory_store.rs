// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory object store.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use pgkeep_core::{ObjectEntry, ObjectStore, PgkeepError};

/// Object store keeping objects in a sorted map.
///
/// `put` and `list` can be made to fail to exercise the soft-failure paths;
/// `get` can be made to stop halfway, leaving a truncated file behind.
pub struct MemoryStore {
    bucket: String,
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    fail_puts: AtomicBool,
    fail_lists: AtomicBool,
    truncate_gets: AtomicBool,
}

impl MemoryStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: Mutex::new(BTreeMap::new()),
            fail_puts: AtomicBool::new(false),
            fail_lists: AtomicBool::new(false),
            truncate_gets: AtomicBool::new(false),
        }
    }

    fn objects(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, key: &str, bytes: &[u8]) {
        self.objects().insert(key.to_string(), bytes.to_vec());
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.objects().keys().cloned().collect()
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub fn truncate_gets(&self, truncate: bool) {
        self.truncate_gets.store(truncate, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, local: &Path, key: &str) -> Result<(), PgkeepError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(PgkeepError::ObjectStore(format!("upload of {key} refused")));
        }
        let bytes = std::fs::read(local).map_err(|e| PgkeepError::io(local, e))?;
        self.objects().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str, local: &Path) -> Result<(), PgkeepError> {
        let bytes = self
            .objects()
            .get(key)
            .cloned()
            .ok_or_else(|| PgkeepError::ObjectStore(format!("NoSuchKey: {key}")))?;
        if self.truncate_gets.load(Ordering::SeqCst) {
            std::fs::write(local, &bytes[..bytes.len() / 2]).map_err(|e| PgkeepError::io(local, e))?;
            return Err(PgkeepError::ObjectStore(format!("download of {key} interrupted")));
        }
        std::fs::write(local, bytes).map_err(|e| PgkeepError::io(local, e))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, PgkeepError> {
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(PgkeepError::ObjectStore("listing refused".to_string()));
        }
        Ok(self
            .objects()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, bytes)| ObjectEntry {
                key: key.clone(),
                size_bytes: bytes.len() as u64,
            })
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<(), PgkeepError> {
        self.objects().remove(key);
        Ok(())
    }
}
