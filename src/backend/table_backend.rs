//! Table Backend
//!
//! The backend contract implemented over one [`HashTable`] per partition.
//!
//! ## Responsibilities
//! - Derive the partition's table path and secure the root directory
//! - Encode composite (bucket, key) pairs into opaque table keys
//! - Express bucket listing and bucket folds as filtered full scans
//! - Answer capability queries from the static capability table

use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::Serialize;

use crate::capability;
use crate::config::BackendConfig;
use crate::error::{BackendError, Result};
use crate::table::{CompactionReport, HashTable, TableOptions};

use super::{Backend, BackendKey, BackendMessage, BucketListing, BucketSelector, CallbackRef};

/// Borrowed form of [`BackendKey`] for encoding; same field order
#[derive(Serialize)]
struct KeyRef<'a> {
    bucket: &'a [u8],
    key: &'a [u8],
}

fn encode_key(bucket: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    Ok(bincode::serialize(&KeyRef { bucket, key })?)
}

fn decode_key(raw: &[u8]) -> Result<BackendKey> {
    Ok(bincode::deserialize(raw)?)
}

/// Storage backend for one partition, backed by a persistent hash table
///
/// ## Concurrency Model
///
/// The backend adds no locking of its own. Every call goes straight to the
/// table, which serializes access with its internal lock. Folds hold that
/// lock for their whole run (`fold_will_block`), so a fold visitor must not
/// call back into the same backend.
#[derive(Debug)]
pub struct TableBackend {
    /// Partition this backend stores
    partition: u64,

    /// The partition's table
    table: HashTable,
}

impl TableBackend {
    /// Start the backend for `partition`
    ///
    /// On startup:
    /// 1. Resolve the root directory (missing → `MissingRoot`) and check the
    ///    sizing hints (inconsistent → `Config`)
    /// 2. Create it if needed (failure → `RootDirectory`)
    /// 3. Open or create `{root}/{partition}` with the configured sizing hints
    /// 4. Sync, so the freshly recovered table matches the disk
    ///
    /// Each of these failures is fatal (`BackendError::is_fatal`); the caller
    /// decides what to do with the node.
    pub fn start(partition: u64, config: &BackendConfig) -> Result<Self> {
        let root = config.root.as_deref().ok_or(BackendError::MissingRoot)?;
        config.validate()?;

        fs::create_dir_all(root).map_err(|source| BackendError::RootDirectory {
            path: root.to_path_buf(),
            source,
        })?;

        let path = Self::table_path(root, partition);
        let table = HashTable::open(&path, TableOptions::from(config))
            .and_then(|table| table.sync().map(|()| table))
            .map_err(|source| BackendError::TableOpen {
                path: path.clone(),
                source: Box::new(source),
            })?;

        tracing::info!(
            "Started table backend for partition {} at {} ({} keys)",
            partition,
            path.display(),
            table.size()?
        );

        Ok(Self { partition, table })
    }

    /// Table path for a partition: `{root}/{partition}`
    pub fn table_path(root: &Path, partition: u64) -> PathBuf {
        root.join(partition.to_string())
    }

    /// Rewrite the table file without dead records
    pub fn compact(&self) -> Result<CompactionReport> {
        self.table.compact()
    }

    /// Flush buffered writes and fsync
    pub fn sync(&self) -> Result<()> {
        self.table.sync()
    }

    /// Number of stored keys
    pub fn key_count(&self) -> Result<usize> {
        self.table.size()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The partition this backend stores
    pub fn partition(&self) -> u64 {
        self.partition
    }

    /// Path of the backing table file
    pub fn path(&self) -> &Path {
        self.table.path()
    }

    /// The underlying table
    pub fn table(&self) -> &HashTable {
        &self.table
    }
}

impl Backend for TableBackend {
    fn global_capability(flag: &str) -> bool {
        capability::lookup(flag)
    }

    fn capability(&self, _bucket: &[u8], flag: &str) -> bool {
        capability::lookup(flag)
    }

    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Bytes>> {
        let raw = encode_key(bucket, key)?;
        Ok(self.table.lookup(&raw)?.map(Bytes::from))
    }

    fn put(&self, bucket: &[u8], key: &[u8], value: &[u8]) -> Result<()> {
        let raw = encode_key(bucket, key)?;
        self.table.insert(&raw, value)
    }

    fn delete(&self, bucket: &[u8], key: &[u8]) -> Result<()> {
        let raw = encode_key(bucket, key)?;
        self.table.delete(&raw)
    }

    fn list(&self) -> Result<Vec<BackendKey>> {
        self.table
            .keys()?
            .iter()
            .map(|raw| decode_key(raw))
            .collect()
    }

    fn list_bucket(&self, selector: &BucketSelector) -> Result<BucketListing> {
        // No bucket index exists: every selector scans all keys
        if let BucketSelector::All = selector {
            return self.list().map(BucketListing::Entries);
        }

        let mut keys = Vec::new();
        for raw in self.table.keys()? {
            let BackendKey { bucket, key } = decode_key(&raw)?;
            if selector.matches(&bucket, &key) {
                keys.push(key);
            }
        }
        Ok(BucketListing::Keys(keys))
    }

    fn visit(
        &self,
        selector: &BucketSelector,
        visitor: &mut dyn FnMut(&[u8], &[u8], &[u8]),
    ) -> Result<()> {
        self.fold_bucket_keys(selector, (), |bucket, key, value, ()| {
            visitor(bucket, key, value)
        })
    }

    fn fold_bucket_keys<A, F>(&self, selector: &BucketSelector, init: A, mut visitor: F) -> Result<A>
    where
        F: FnMut(&[u8], &[u8], &[u8], A) -> A,
    {
        self.table.try_fold(init, |acc, raw, value| {
            let BackendKey { bucket, key } = decode_key(raw)?;
            if selector.matches(&bucket, &key) {
                Ok(visitor(&bucket, &key, value, acc))
            } else {
                Ok(acc)
            }
        })
    }

    fn is_empty(&self) -> Result<bool> {
        self.table.sync()?;
        Ok(self.table.size()? == 0)
    }

    fn stop(&self) -> Result<()> {
        self.table.close()?;
        tracing::debug!("Stopped table backend for partition {}", self.partition);
        Ok(())
    }

    fn drop_storage(&self) -> Result<()> {
        self.table.destroy()?;
        tracing::info!(
            "Dropped table backend for partition {} ({} removed)",
            self.partition,
            self.table.path().display()
        );
        Ok(())
    }

    fn callback(&self, reference: CallbackRef, message: &BackendMessage) -> Result<()> {
        // Nothing here depends on router topology or peer backends
        tracing::trace!(
            "Partition {} ignoring callback {:?}: {:?}",
            self.partition,
            reference,
            message
        );
        Ok(())
    }
}
