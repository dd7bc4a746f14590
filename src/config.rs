//! Configuration for tablekv
//!
//! Centralized configuration with sensible defaults. The host hands each
//! backend a flat string map; [`BackendConfig::from_map`] reads the keys this
//! backend understands and ignores the rest.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{BackendError, Result};

/// Default initial slot count of a partition table
pub const DEFAULT_MIN_SLOTS: usize = 8192;

/// Default upper bound on slot growth of a partition table
pub const DEFAULT_MAX_SLOTS: usize = 16_777_216;

/// Configuration for a table backend instance
#[derive(Debug, Clone)]
pub struct BackendConfig {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for partition tables (required)
    /// Internal structure:
    ///   {root}/
    ///     ├── 0            (table for partition 0)
    ///     ├── 1            (table for partition 1)
    ///     └── ...
    pub root: Option<PathBuf>,

    // -------------------------------------------------------------------------
    // Table Configuration
    // -------------------------------------------------------------------------
    /// Initial number of index slots
    pub min_slots: usize,

    /// Advisory upper bound on index slots (not a key-count limit)
    pub max_slots: usize,

    /// Sync strategy: how often to fsync the table file
    pub sync_strategy: SyncStrategy,

    /// Rewrite the table without dead records when stopping, if worthwhile
    pub compact_on_close: bool,
}

/// Table sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced writes (balanced durability/performance)
    EveryNWrites { count: usize },

    /// fsync only on explicit sync, emptiness checks and close
    Manual,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            root: None,
            min_slots: DEFAULT_MIN_SLOTS,
            max_slots: DEFAULT_MAX_SLOTS,
            sync_strategy: SyncStrategy::EveryNWrites { count: 100 },
            compact_on_close: true,
        }
    }
}

impl BackendConfig {
    // =========================================================================
    // Map Keys
    // =========================================================================
    pub const ROOT_KEY: &'static str = "root";
    pub const MIN_SLOTS_KEY: &'static str = "min_slots";
    pub const MAX_SLOTS_KEY: &'static str = "max_slots";
    pub const SYNC_KEY: &'static str = "sync";
    pub const COMPACT_ON_CLOSE_KEY: &'static str = "compact_on_close";

    /// Create a new config builder
    pub fn builder() -> BackendConfigBuilder {
        BackendConfigBuilder::default()
    }

    /// Build a config from the host's configuration map
    ///
    /// `root` is required. Recognized optional keys:
    /// - `min_slots`, `max_slots`: positive integers
    /// - `sync`: `every_write`, `manual`, or a positive write count
    /// - `compact_on_close`: `true` or `false`
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();

        let root = map
            .get(Self::ROOT_KEY)
            .filter(|root| !root.is_empty())
            .ok_or(BackendError::MissingRoot)?;
        config.root = Some(PathBuf::from(root));

        if let Some(raw) = map.get(Self::MIN_SLOTS_KEY) {
            config.min_slots = parse_count(Self::MIN_SLOTS_KEY, raw)?;
        }
        if let Some(raw) = map.get(Self::MAX_SLOTS_KEY) {
            config.max_slots = parse_count(Self::MAX_SLOTS_KEY, raw)?;
        }
        if let Some(raw) = map.get(Self::SYNC_KEY) {
            config.sync_strategy = parse_sync_strategy(raw)?;
        }
        if let Some(raw) = map.get(Self::COMPACT_ON_CLOSE_KEY) {
            config.compact_on_close = raw.parse().map_err(|_| {
                BackendError::Config(format!(
                    "{} must be true or false, got {:?}",
                    Self::COMPACT_ON_CLOSE_KEY,
                    raw
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check sizing hints and sync settings for consistency
    pub fn validate(&self) -> Result<()> {
        if self.min_slots == 0 {
            return Err(BackendError::Config("min_slots must be positive".to_string()));
        }
        if self.min_slots > self.max_slots {
            return Err(BackendError::Config(format!(
                "min_slots ({}) exceeds max_slots ({})",
                self.min_slots, self.max_slots
            )));
        }
        if let SyncStrategy::EveryNWrites { count: 0 } = self.sync_strategy {
            return Err(BackendError::Config("sync write count must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_count(key: &str, raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(BackendError::Config(format!(
            "{} must be a positive integer, got {:?}",
            key, raw
        ))),
    }
}

fn parse_sync_strategy(raw: &str) -> Result<SyncStrategy> {
    match raw.trim() {
        "every_write" => Ok(SyncStrategy::EveryWrite),
        "manual" => Ok(SyncStrategy::Manual),
        other => parse_count(BackendConfig::SYNC_KEY, other)
            .map(|count| SyncStrategy::EveryNWrites { count }),
    }
}

/// Builder for BackendConfig
#[derive(Default)]
pub struct BackendConfigBuilder {
    config: BackendConfig,
}

impl BackendConfigBuilder {
    /// Set the root directory for partition tables
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.root = Some(path.into());
        self
    }

    /// Set the initial slot count
    pub fn min_slots(mut self, slots: usize) -> Self {
        self.config.min_slots = slots;
        self
    }

    /// Set the slot growth bound
    pub fn max_slots(mut self, slots: usize) -> Self {
        self.config.max_slots = slots;
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Enable or disable compaction on close
    pub fn compact_on_close(mut self, enabled: bool) -> Self {
        self.config.compact_on_close = enabled;
        self
    }

    pub fn build(self) -> BackendConfig {
        self.config
    }
}
