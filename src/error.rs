//! Error types for tablekv
//!
//! Provides a unified error type for all backend and table operations.
//!
//! A missing key is never an error: lookups report it as `Ok(None)`.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using BackendError
pub type Result<T> = std::result::Result<T, BackendError>;

/// Unified error type for tablekv operations
#[derive(Debug, Error)]
pub enum BackendError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Startup Errors (fatal: the backend cannot secure its storage)
    // -------------------------------------------------------------------------
    #[error("Configuration error: no root directory configured")]
    MissingRoot,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot create root directory {}: {source}", path.display())]
    RootDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot open table {}: {source}", path.display())]
    TableOpen {
        path: PathBuf,
        #[source]
        source: Box<BackendError>,
    },

    // -------------------------------------------------------------------------
    // Table Errors
    // -------------------------------------------------------------------------
    #[error("Table already open: {}", .0.display())]
    AlreadyOpen(PathBuf),

    #[error("Table corruption detected: {0}")]
    TableCorruption(String),

    #[error("Table is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BackendError {
    /// Whether this error means the backend could not be started at all.
    ///
    /// The host owns process lifecycle and decides whether a fatal startup
    /// error halts the node or only takes the partition offline.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BackendError::MissingRoot
                | BackendError::Config(_)
                | BackendError::RootDirectory { .. }
                | BackendError::TableOpen { .. }
        )
    }
}

impl From<bincode::Error> for BackendError {
    fn from(err: bincode::Error) -> Self {
        BackendError::Serialization(err.to_string())
    }
}
