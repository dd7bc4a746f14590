//! # tablekv
//!
//! A pluggable key-value storage backend for a distributed storage node:
//! - Uniform backend contract (get/put/delete/list/fold/drop/capabilities)
//! - One persistent hash-table file per partition
//! - CRC-checked records with torn-tail recovery on open
//! - Static capability negotiation with the host
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Host Node                             │
//! │           (one backend per partition, via `Backend`)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     TableBackend                             │
//! │     (composite keys, bucket filters, capabilities)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ Table Index │          │ Table File  │
//!   │  (HashMap)  │          │  (Append)   │
//!   └─────────────┘          └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use tablekv::{Backend, BackendConfig, TableBackend};
//!
//! # fn main() -> tablekv::Result<()> {
//! let config = BackendConfig::builder().root("/var/lib/node/tables").build();
//! let backend = TableBackend::start(42, &config)?;
//!
//! backend.put(b"users", b"alice", b"{...}")?;
//! assert!(backend.get(b"users", b"alice")?.is_some());
//!
//! let entries = backend.fold(0usize, |_bucket, _key, _value, n| n + 1)?;
//! assert_eq!(entries, 1);
//!
//! backend.stop()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod capability;
pub mod table;
pub mod backend;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BackendError, Result};
pub use config::{BackendConfig, SyncStrategy};
pub use capability::Capability;
pub use backend::{
    Backend, BackendKey, BackendMessage, BucketListing, BucketSelector, CallbackRef,
    TableBackend,
};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tablekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
