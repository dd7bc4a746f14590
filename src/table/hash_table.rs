//! HashTable implementation
//!
//! Append-only table file with a HashMap index, guarded by one lock.
//!
//! ## Concurrency Model
//!
//! - One `parking_lot::Mutex` around the whole table state
//! - Every call takes the lock once (reads too, since they seek the file)
//! - `try_fold` holds the lock for the entire traversal: writers block
//!   until it finishes, and a visitor must not re-enter the same table

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::config::SyncStrategy;
use crate::error::{BackendError, Result};

use super::index::{RecordLocation, TableIndex};
use super::record::{self, RecordRef, TableRecord};
use super::recovery;
use super::registry::PathClaim;
use super::{
    CompactionReport, RecoveryReport, TableOptions, COMPACTION_MIN_DEAD_BYTES, HEADER_SIZE,
};

/// A persistent hash table stored in a single file
pub struct HashTable {
    /// Path of the table file
    path: PathBuf,

    /// Options the table was opened with
    options: TableOptions,

    /// Recovery stats from open
    recovery: RecoveryReport,

    /// Lifecycle state, holding the file handles while open
    state: Mutex<TableState>,
}

enum TableState {
    Open(OpenTable),
    Closed,
    Destroyed,
}

impl TableState {
    fn open_mut(&mut self) -> Result<&mut OpenTable> {
        match self {
            TableState::Open(table) => Ok(table),
            TableState::Closed | TableState::Destroyed => Err(BackendError::Closed),
        }
    }
}

/// File handles and index of an open table
struct OpenTable {
    /// Buffered appender positioned at `end`
    writer: BufWriter<File>,

    /// Separate handle for random reads
    reader: File,

    /// Key → newest frame
    index: TableIndex,

    /// Logical end of file, including bytes still in the write buffer
    end: u64,

    /// Writes since the last fsync
    unsynced_writes: usize,

    /// Keeps the path exclusively ours until dropped
    claim: PathClaim,
}

impl HashTable {
    /// Open or create a table at `path`
    ///
    /// Fails with `AlreadyOpen` if the path already has an open handle in
    /// this process, and with `TableCorruption` if the file is not a table.
    pub fn open(path: &Path, options: TableOptions) -> Result<Self> {
        let claim = PathClaim::acquire(path)?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let recovered = recovery::recover(&mut file, options.initial_capacity())?;
        if recovered.report.bytes_truncated > 0 {
            tracing::warn!(
                "Truncated {} bytes of torn or corrupted records from {}",
                recovered.report.bytes_truncated,
                path.display()
            );
        }

        let reader = File::open(path)?;
        let open = OpenTable {
            writer: BufWriter::new(file),
            reader,
            index: recovered.index,
            end: recovered.end,
            unsynced_writes: 0,
            claim,
        };

        tracing::debug!(
            "Opened table {}: {} keys, {} records replayed",
            path.display(),
            open.index.len(),
            recovered.report.records_replayed
        );

        Ok(Self {
            path: path.to_path_buf(),
            options,
            recovery: recovered.report,
            state: Mutex::new(TableState::Open(open)),
        })
    }

    // =========================================================================
    // Point Operations
    // =========================================================================

    /// Look up a key; `Ok(None)` if absent
    pub fn lookup(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut state = self.state.lock();
        let table = state.open_mut()?;

        let Some(location) = table.index.get(key) else {
            return Ok(None);
        };
        table.flush_buffer()?;
        read_value(&mut table.reader, location).map(Some)
    }

    /// Insert or overwrite a key
    pub fn insert(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let frame = record::encode_frame(&RecordRef::Put { key, value })?;

        let mut state = self.state.lock();
        let table = state.open_mut()?;

        let location = table.append(&frame)?;
        table.index.apply_put(key.to_vec(), location);
        table.after_write(self.options.sync_strategy)
    }

    /// Delete a key; deleting an absent key writes nothing and succeeds
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        let table = state.open_mut()?;

        if !table.index.contains(key) {
            return Ok(());
        }

        let frame = record::encode_frame(&RecordRef::Delete { key })?;
        let location = table.append(&frame)?;
        table.index.apply_delete(key, location.len);
        table.after_write(self.options.sync_strategy)
    }

    // =========================================================================
    // Whole-Table Operations
    // =========================================================================

    /// Number of live keys
    pub fn size(&self) -> Result<usize> {
        let mut state = self.state.lock();
        Ok(state.open_mut()?.index.len())
    }

    /// All live keys, in index order
    pub fn keys(&self) -> Result<Vec<Vec<u8>>> {
        let mut state = self.state.lock();
        let table = state.open_mut()?;
        Ok(table.index.iter().map(|(key, _)| key.clone()).collect())
    }

    /// Traverse every (key, value) pair in index order, threading an
    /// accumulator. The table lock is held until the traversal ends.
    pub fn try_fold<A, F>(&self, init: A, mut f: F) -> Result<A>
    where
        F: FnMut(A, &[u8], &[u8]) -> Result<A>,
    {
        let mut state = self.state.lock();
        let table = state.open_mut()?;
        table.flush_buffer()?;

        let OpenTable { reader, index, .. } = table;
        let mut acc = init;
        for (key, location) in index.iter() {
            let value = read_value(reader, *location)?;
            acc = f(acc, key, &value)?;
        }
        Ok(acc)
    }

    /// All (key, value) pairs whose key satisfies `predicate`
    pub fn select<P>(&self, mut predicate: P) -> Result<Vec<(Vec<u8>, Vec<u8>)>>
    where
        P: FnMut(&[u8]) -> bool,
    {
        self.try_fold(Vec::new(), |mut matches, key, value| {
            if predicate(key) {
                matches.push((key.to_vec(), value.to_vec()));
            }
            Ok(matches)
        })
    }

    /// Flush buffered writes and fsync the file
    pub fn sync(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.open_mut()?.sync()
    }

    /// Rewrite the file keeping only live records
    pub fn compact(&self) -> Result<CompactionReport> {
        let mut state = self.state.lock();
        state.open_mut()?.compact(&self.path)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Sync and close the table, compacting first if configured and
    /// worthwhile. Later calls return `Closed`.
    ///
    /// A failed compaction only leaves dead records behind: it is logged and
    /// the close goes on. If the final sync fails the table stays open, so
    /// the close can be retried.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, TableState::Closed) {
            TableState::Open(mut table) => {
                if self.options.compact_on_close && table.should_compact() {
                    if let Err(e) = table.compact(&self.path) {
                        tracing::warn!(
                            "Skipping compaction of {} on close: {}",
                            self.path.display(),
                            e
                        );
                    }
                }
                if let Err(e) = table.sync() {
                    *state = TableState::Open(table);
                    return Err(e);
                }
                tracing::debug!("Closed table {}", self.path.display());
                Ok(())
            }
            other => {
                *state = other;
                Err(BackendError::Closed)
            }
        }
    }

    /// Close the table (if still open) and delete its file.
    ///
    /// If removing the files fails the table is left `Closed`, so the
    /// destroy can be retried.
    pub fn destroy(&self) -> Result<()> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, TableState::Destroyed) {
            TableState::Open(table) => {
                let OpenTable {
                    writer,
                    reader,
                    claim,
                    ..
                } = table;
                // Discard buffered writes instead of flushing them into a doomed file
                let (file, _unwritten) = writer.into_parts();
                drop(file);
                drop(reader);
                let removed = remove_table_files(&self.path);
                drop(claim);
                if let Err(e) = removed {
                    *state = TableState::Closed;
                    return Err(e);
                }
            }
            TableState::Closed => {
                if let Err(e) = remove_table_files(&self.path) {
                    *state = TableState::Closed;
                    return Err(e);
                }
            }
            TableState::Destroyed => return Err(BackendError::Closed),
        }
        tracing::debug!("Destroyed table {}", self.path.display());
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Path of the table file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recovery stats from open
    pub fn recovery_report(&self) -> RecoveryReport {
        self.recovery
    }

    /// Whether the table is still open
    pub fn is_open(&self) -> bool {
        matches!(*self.state.lock(), TableState::Open(_))
    }
}

impl std::fmt::Debug for HashTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashTable")
            .field("path", &self.path)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// A fully written compaction file, not yet renamed into place
struct Compacted {
    writer: BufWriter<File>,
    reader: File,
    relocated: HashMap<Vec<u8>, RecordLocation>,
    end: u64,
}

impl OpenTable {
    /// Append a frame, returning where it landed
    fn append(&mut self, frame: &[u8]) -> Result<RecordLocation> {
        self.writer.write_all(frame)?;

        let location = RecordLocation {
            offset: self.end,
            // encode_frame bounds frames to u32
            len: frame.len() as u32,
        };
        self.end += frame.len() as u64;
        Ok(location)
    }

    fn after_write(&mut self, strategy: SyncStrategy) -> Result<()> {
        self.unsynced_writes += 1;
        match strategy {
            SyncStrategy::EveryWrite => self.sync(),
            SyncStrategy::EveryNWrites { count } if self.unsynced_writes >= count => self.sync(),
            SyncStrategy::EveryNWrites { .. } | SyncStrategy::Manual => Ok(()),
        }
    }

    /// Push buffered writes to the OS so the read handle sees them
    fn flush_buffer(&mut self) -> Result<()> {
        if !self.writer.buffer().is_empty() {
            self.writer.flush()?;
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.unsynced_writes = 0;
        Ok(())
    }

    fn should_compact(&self) -> bool {
        let dead = self.index.dead_bytes();
        dead >= COMPACTION_MIN_DEAD_BYTES && dead > self.index.live_bytes()
    }

    /// Copy live frames into a fresh file and swap it in.
    ///
    /// On error the table keeps using the old file and the scratch file is
    /// removed.
    fn compact(&mut self, path: &Path) -> Result<CompactionReport> {
        self.flush_buffer()?;
        let bytes_before = self.end;

        let tmp_path = compaction_path(path);
        let compacted = match self.write_compacted(&tmp_path) {
            Ok(compacted) => compacted,
            Err(e) => {
                discard_scratch_file(&tmp_path);
                return Err(e);
            }
        };

        // The handles follow the file through the rename
        if let Err(e) = fs::rename(&tmp_path, path) {
            discard_scratch_file(&tmp_path);
            return Err(e.into());
        }

        let Compacted {
            writer,
            reader,
            relocated,
            end,
        } = compacted;
        self.writer = writer;
        self.reader = reader;
        self.end = end;
        self.unsynced_writes = 0;

        let report = CompactionReport {
            records_kept: relocated.len() as u64,
            bytes_before,
            bytes_after: end,
        };
        self.index.relocate(relocated);

        tracing::debug!(
            "Compacted table {}: {} records kept, {} bytes reclaimed",
            path.display(),
            report.records_kept,
            report.bytes_reclaimed()
        );
        Ok(report)
    }

    /// Write live frames to `tmp_path` and open the handles the table
    /// switches to once the file is renamed into place
    fn write_compacted(&mut self, tmp_path: &Path) -> Result<Compacted> {
        let mut out = BufWriter::new(File::create(tmp_path)?);
        record::write_header(&mut out)?;

        let mut relocated = HashMap::with_capacity(self.index.len());
        let mut offset = HEADER_SIZE;
        for (key, location) in self.index.iter() {
            let frame = read_frame_bytes(&mut self.reader, *location)?;
            out.write_all(&frame)?;
            relocated.insert(
                key.clone(),
                RecordLocation {
                    offset,
                    len: location.len,
                },
            );
            offset += u64::from(location.len);
        }

        let file = out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);

        let mut writer_file = OpenOptions::new().read(true).write(true).open(tmp_path)?;
        writer_file.seek(SeekFrom::Start(offset))?;
        let reader = File::open(tmp_path)?;

        Ok(Compacted {
            writer: BufWriter::new(writer_file),
            reader,
            relocated,
            end: offset,
        })
    }
}

// =============================================================================
// Private Helpers
// =============================================================================

/// Read the raw bytes of a frame
fn read_frame_bytes(reader: &mut File, location: RecordLocation) -> Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(location.offset))?;
    let mut frame = vec![0u8; location.len as usize];
    reader.read_exact(&mut frame)?;
    Ok(frame)
}

/// Read and decode the value stored in a `Put` frame
fn read_value(reader: &mut File, location: RecordLocation) -> Result<Vec<u8>> {
    let frame = read_frame_bytes(reader, location)?;
    match record::decode_frame(&frame)? {
        TableRecord::Put { value, .. } => Ok(value),
        TableRecord::Delete { .. } => Err(BackendError::TableCorruption(format!(
            "index points at a delete record (offset {})",
            location.offset
        ))),
    }
}

/// "<path>.compact", the scratch file used while compacting
fn compaction_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".compact");
    PathBuf::from(name)
}

/// Best-effort removal of a leftover compaction scratch file
fn discard_scratch_file(tmp_path: &Path) {
    match fs::remove_file(tmp_path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            "Could not remove compaction scratch file {}: {}",
            tmp_path.display(),
            e
        ),
    }
}

/// Remove the table file and any leftover compaction scratch file
fn remove_table_files(path: &Path) -> Result<()> {
    for file in [path.to_path_buf(), compaction_path(path)] {
        match fs::remove_file(&file) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
