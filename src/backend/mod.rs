//! Backend Module
//!
//! The uniform storage contract a host node drives, and its implementation
//! over a persistent hash table.
//!
//! ## Keys
//! Every key is a composite of (bucket, local key), both opaque bytes.
//! Values are opaque blobs: the backend never interprets them.
//!
//! ## Traversal
//! `fold` is the only traversal primitive. Bucket-scoped listing and folding
//! are filters over a full table scan, O(total keys) whatever the selector.

mod table_backend;

pub use table_backend::TableBackend;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

// =============================================================================
// Keys and Selectors
// =============================================================================

/// A composite key: bucket plus local key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BackendKey {
    pub bucket: Vec<u8>,
    pub key: Vec<u8>,
}

impl BackendKey {
    pub fn new(bucket: impl Into<Vec<u8>>, key: impl Into<Vec<u8>>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

/// Predicate over a (bucket, local key) pair
pub type KeyPredicate = Arc<dyn Fn(&[u8], &[u8]) -> bool + Send + Sync>;

/// Which entries a listing or fold covers
#[derive(Clone)]
pub enum BucketSelector {
    /// Every bucket
    All,

    /// One bucket
    Bucket(Vec<u8>),

    /// Keys in `bucket` for which `predicate(bucket, key)` holds
    Filter {
        bucket: Vec<u8>,
        predicate: KeyPredicate,
    },
}

impl BucketSelector {
    /// Select a single bucket
    pub fn bucket(bucket: impl Into<Vec<u8>>) -> Self {
        BucketSelector::Bucket(bucket.into())
    }

    /// Select keys of `bucket` matching `predicate`
    pub fn filter<F>(bucket: impl Into<Vec<u8>>, predicate: F) -> Self
    where
        F: Fn(&[u8], &[u8]) -> bool + Send + Sync + 'static,
    {
        BucketSelector::Filter {
            bucket: bucket.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Whether the entry at (bucket, key) is selected
    pub fn matches(&self, bucket: &[u8], key: &[u8]) -> bool {
        match self {
            BucketSelector::All => true,
            BucketSelector::Bucket(selected) => selected.as_slice() == bucket,
            BucketSelector::Filter {
                bucket: selected,
                predicate,
            } => selected.as_slice() == bucket && predicate(bucket, key),
        }
    }
}

impl fmt::Debug for BucketSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketSelector::All => f.write_str("All"),
            BucketSelector::Bucket(bucket) => f.debug_tuple("Bucket").field(bucket).finish(),
            BucketSelector::Filter { bucket, .. } => f
                .debug_struct("Filter")
                .field("bucket", bucket)
                .finish_non_exhaustive(),
        }
    }
}

/// Result of a bucket listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketListing {
    /// Local keys of one bucket (concrete or filtered selector)
    Keys(Vec<Vec<u8>>),

    /// Full keys across all buckets (wildcard selector)
    Entries(Vec<BackendKey>),
}

impl BucketListing {
    pub fn len(&self) -> usize {
        match self {
            BucketListing::Keys(keys) => keys.len(),
            BucketListing::Entries(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Cross-Backend Messages
// =============================================================================

/// Caller-chosen reference attached to a callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackRef(pub u64);

/// Coordination messages a host may broadcast to every backend it drives
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BackendMessage {
    /// The set of backends behind a multi-backend router changed
    MembershipChanged { backends: Vec<String> },

    /// A message meant for one backend implementation
    Opaque { tag: String, payload: Bytes },
}

// =============================================================================
// Backend Contract
// =============================================================================

/// The storage contract a host node drives.
///
/// Implementations are blocking and `Send + Sync`; the host may call them
/// from several threads at once. No cross-key atomicity is provided.
pub trait Backend: Send + Sync {
    /// Host-global capability query, answered without an open table
    fn global_capability(flag: &str) -> bool
    where
        Self: Sized;

    /// Per-bucket capability query
    fn capability(&self, bucket: &[u8], flag: &str) -> bool;

    /// Look up a key: `Ok(None)` when absent, `Err` only on failure
    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Bytes>>;

    /// Insert or overwrite a key
    fn put(&self, bucket: &[u8], key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove a key; absent keys are not an error
    fn delete(&self, bucket: &[u8], key: &[u8]) -> Result<()>;

    /// Every key in every bucket, unordered
    fn list(&self) -> Result<Vec<BackendKey>>;

    /// Keys selected by `selector`, unordered
    fn list_bucket(&self, selector: &BucketSelector) -> Result<BucketListing>;

    /// Call `visitor(bucket, key, value)` for every selected entry.
    ///
    /// Object-safe form of [`Backend::fold_bucket_keys`].
    fn visit(
        &self,
        selector: &BucketSelector,
        visitor: &mut dyn FnMut(&[u8], &[u8], &[u8]),
    ) -> Result<()>;

    /// Fold over every entry: `acc = visitor(bucket, key, value, acc)`
    fn fold<A, F>(&self, init: A, visitor: F) -> Result<A>
    where
        Self: Sized,
        F: FnMut(&[u8], &[u8], &[u8], A) -> A,
    {
        self.fold_bucket_keys(&BucketSelector::All, init, visitor)
    }

    /// Fold over selected entries; unselected entries leave `acc` untouched
    fn fold_bucket_keys<A, F>(&self, selector: &BucketSelector, init: A, visitor: F) -> Result<A>
    where
        Self: Sized,
        F: FnMut(&[u8], &[u8], &[u8], A) -> A;

    /// Whether the backend holds no keys (buffered writes included)
    fn is_empty(&self) -> Result<bool>;

    /// Flush and close; later calls fail with `Closed`
    fn stop(&self) -> Result<()>;

    /// Close and delete all stored data
    fn drop_storage(&self) -> Result<()>;

    /// Receive a cross-backend coordination message
    fn callback(&self, reference: CallbackRef, message: &BackendMessage) -> Result<()>;
}
