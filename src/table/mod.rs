//! Table Module
//!
//! Persistent hash table: one append-only file per table, with an
//! in-memory index from key to the newest record for that key.
//!
//! ## Responsibilities
//! - Point lookups, upserts and deletes by opaque binary key
//! - Full traversal in index (hash) order, never sorted
//! - CRC32 checksums for corruption detection
//! - Torn-tail truncation on open
//! - Rewriting the file without dead records (compaction)
//! - At most one open handle per path in the process
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (8 bytes)                                        │
//! │   Magic: "TBKV" (4) | Version: u16 (2) | Padding (2)    │
//! ├─────────────────────────────────────────────────────────┤
//! │ Frame 1                                                 │
//! │ ┌─────────┬─────────┬─────────────────────────────────┐ │
//! │ │ CRC (4) │ Len (4) │ Payload (bincode TableRecord)   │ │
//! │ └─────────┴─────────┴─────────────────────────────────┘ │
//! ├─────────────────────────────────────────────────────────┤
//! │ Frame 2 ...                                             │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! A `Put` frame supersedes every earlier frame for its key; a `Delete`
//! frame removes the key. Superseded frames are dead bytes until compaction.

mod hash_table;
mod index;
mod record;
mod recovery;
mod registry;

pub use hash_table::HashTable;

use crate::config::{BackendConfig, SyncStrategy, DEFAULT_MAX_SLOTS, DEFAULT_MIN_SLOTS};

// =============================================================================
// Shared Constants (used by record, recovery, hash_table)
// =============================================================================

/// Magic bytes identifying a tablekv table file
pub(crate) const MAGIC: &[u8; 4] = b"TBKV";

/// Current table format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + Padding (2) = 8 bytes
pub(crate) const HEADER_SIZE: u64 = 8;

/// Compaction on close only runs once at least this many bytes are dead
pub(crate) const COMPACTION_MIN_DEAD_BYTES: u64 = 64 * 1024;

// =============================================================================
// Options and Reports
// =============================================================================

/// Options for opening a table
#[derive(Debug, Clone, Copy)]
pub struct TableOptions {
    /// Initial index capacity
    pub min_slots: usize,
    /// Advisory growth bound; checked against `min_slots` by config
    /// validation, never enforced on the index
    pub max_slots: usize,
    /// When writes are fsynced
    pub sync_strategy: SyncStrategy,
    /// Compact on close when dead bytes outweigh live bytes
    pub compact_on_close: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            min_slots: DEFAULT_MIN_SLOTS,
            max_slots: DEFAULT_MAX_SLOTS,
            sync_strategy: SyncStrategy::EveryNWrites { count: 100 },
            compact_on_close: true,
        }
    }
}

impl From<&BackendConfig> for TableOptions {
    fn from(config: &BackendConfig) -> Self {
        Self {
            min_slots: config.min_slots,
            max_slots: config.max_slots,
            sync_strategy: config.sync_strategy,
            compact_on_close: config.compact_on_close,
        }
    }
}

impl TableOptions {
    /// Capacity to pre-size the index with
    pub(crate) fn initial_capacity(&self) -> usize {
        self.min_slots
    }
}

/// What open-time recovery found in the table file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Frames replayed into the index
    pub records_replayed: u64,

    /// Bytes cut from the end of the file (torn or corrupted frames)
    pub bytes_truncated: u64,
}

/// Outcome of a compaction pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionReport {
    /// Live records copied into the new file
    pub records_kept: u64,

    /// File size before compaction
    pub bytes_before: u64,

    /// File size after compaction
    pub bytes_after: u64,
}

impl CompactionReport {
    /// Bytes returned to the filesystem
    pub fn bytes_reclaimed(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}
