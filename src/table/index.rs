//! In-memory table index
//!
//! Maps each live key to the frame holding its newest value, and keeps the
//! live/dead byte accounting that drives compaction.

use std::collections::HashMap;

/// Position of a frame in the table file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RecordLocation {
    /// Byte offset of the frame header
    pub offset: u64,
    /// Frame length including header
    pub len: u32,
}

/// Key → newest frame, plus byte accounting
#[derive(Debug)]
pub(crate) struct TableIndex {
    entries: HashMap<Vec<u8>, RecordLocation>,
    live_bytes: u64,
    dead_bytes: u64,
}

impl TableIndex {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            live_bytes: 0,
            dead_bytes: 0,
        }
    }

    pub(crate) fn get(&self, key: &[u8]) -> Option<RecordLocation> {
        self.entries.get(key).copied()
    }

    pub(crate) fn contains(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &RecordLocation)> {
        self.entries.iter()
    }

    /// Record a `Put` frame; the previous frame for the key becomes dead
    pub(crate) fn apply_put(&mut self, key: Vec<u8>, location: RecordLocation) {
        if let Some(old) = self.entries.insert(key, location) {
            self.retire(old.len);
        }
        self.live_bytes += u64::from(location.len);
    }

    /// Record a `Delete` frame of `frame_len` bytes; the frame itself is dead
    pub(crate) fn apply_delete(&mut self, key: &[u8], frame_len: u32) {
        if let Some(old) = self.entries.remove(key) {
            self.retire(old.len);
        }
        self.dead_bytes += u64::from(frame_len);
    }

    /// Replace all locations after the file was rewritten
    pub(crate) fn relocate(&mut self, entries: HashMap<Vec<u8>, RecordLocation>) {
        self.live_bytes = entries.values().map(|loc| u64::from(loc.len)).sum();
        self.dead_bytes = 0;
        self.entries = entries;
    }

    pub(crate) fn live_bytes(&self) -> u64 {
        self.live_bytes
    }

    pub(crate) fn dead_bytes(&self) -> u64 {
        self.dead_bytes
    }

    fn retire(&mut self, len: u32) {
        self.live_bytes -= u64::from(len);
        self.dead_bytes += u64::from(len);
    }
}
