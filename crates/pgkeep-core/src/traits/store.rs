// SPDX-FileCopyrightText: 2026 pgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Object store trait for off-host backup copies.

use std::path::Path;

use async_trait::async_trait;

use crate::error::PgkeepError;

/// One object returned by a prefix listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Key relative to the bucket, e.g. `daily/backup_daily_20260101_030000.sql.gz`.
    pub key: String,
    pub size_bytes: u64,
}

/// Key-value blob store addressed by `bucket/<class>/<filename>`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket name, used to build and parse `s3://bucket/key` URIs.
    fn bucket(&self) -> &str;

    async fn put(&self, local: &Path, key: &str) -> Result<(), PgkeepError>;

    async fn get(&self, key: &str, local: &Path) -> Result<(), PgkeepError>;

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, PgkeepError>;

    async fn delete(&self, key: &str) -> Result<(), PgkeepError>;

    /// Full URI of a key in this store.
    fn uri(&self, key: &str) -> String {
        format!("s3://{}/{key}", self.bucket())
    }

    /// Key of a `s3://bucket/key` URI, if it points into this store's bucket.
    fn key_from_uri<'a>(&self, uri: &'a str) -> Option<&'a str> {
        let rest = uri.strip_prefix("s3://")?;
        let (bucket, key) = rest.split_once('/')?;
        (bucket == self.bucket() && !key.is_empty()).then_some(key)
    }
}
