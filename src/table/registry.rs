//! Process-wide table path registry
//!
//! A table file may have only one open handle in the process. Opening takes a
//! [`PathClaim`]; dropping the claim frees the path.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{BackendError, Result};

static OPEN_PATHS: Mutex<BTreeSet<PathBuf>> = parking_lot::const_mutex(BTreeSet::new());

/// Exclusive claim on a table path, released on drop
#[derive(Debug)]
pub(crate) struct PathClaim {
    canonical: PathBuf,
}

impl PathClaim {
    /// Claim `path`, failing with `AlreadyOpen` if another handle holds it
    pub(crate) fn acquire(path: &Path) -> Result<Self> {
        let canonical = canonical_table_path(path)?;

        let mut open = OPEN_PATHS.lock();
        if !open.insert(canonical.clone()) {
            return Err(BackendError::AlreadyOpen(path.to_path_buf()));
        }
        Ok(Self { canonical })
    }
}

impl Drop for PathClaim {
    fn drop(&mut self) {
        OPEN_PATHS.lock().remove(&self.canonical);
    }
}

/// Canonical form of a table path whose file may not exist yet.
/// The parent directory must exist.
fn canonical_table_path(path: &Path) -> Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        BackendError::Config(format!("table path {} has no file name", path.display()))
    })?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok(fs::canonicalize(parent)?.join(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_claim_is_exclusive_until_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t");

        let claim = PathClaim::acquire(&path).unwrap();
        let alias = dir.path().join(".").join("t");
        assert!(matches!(
            PathClaim::acquire(&alias),
            Err(BackendError::AlreadyOpen(_))
        ));

        drop(claim);
        assert!(PathClaim::acquire(&alias).is_ok());
    }

    #[test]
    fn test_claim_needs_existing_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("t");

        assert!(matches!(PathClaim::acquire(&path), Err(BackendError::Io(_))));
    }
}
