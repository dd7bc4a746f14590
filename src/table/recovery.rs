//! Table recovery
//!
//! Rebuilds the index when a table is opened.
//!
//! This will:
//! 1. Write a fresh header if the file is new (or shorter than a header)
//! 2. Reject files with a foreign magic or unknown version
//! 3. Replay every intact frame into the index
//! 4. Truncate the first torn or corrupted frame and everything after it

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};

use crate::error::Result;

use super::index::{RecordLocation, TableIndex};
use super::record::{self, TableRecord, FRAME_HEADER_SIZE, MAX_PAYLOAD_SIZE};
use super::{RecoveryReport, HEADER_SIZE};

/// Index and file position recovered from an existing table file
pub(crate) struct RecoveredTable {
    pub index: TableIndex,
    /// Offset where the next frame goes
    pub end: u64,
    pub report: RecoveryReport,
}

/// Result of reading one frame during replay
enum Replay {
    Frame(TableRecord, u32),
    /// Clean end of file
    End,
    /// Incomplete or corrupted frame: the tail from here is discarded
    Torn,
}

/// Recover a table file opened read/write.
///
/// On return the file is truncated to `end` and positioned there.
pub(crate) fn recover(file: &mut File, capacity: usize) -> Result<RecoveredTable> {
    let file_len = file.metadata()?.len();
    let mut index = TableIndex::with_capacity(capacity);

    if file_len < HEADER_SIZE {
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        record::write_header(file)?;
        file.sync_all()?;
        return Ok(RecoveredTable {
            index,
            end: HEADER_SIZE,
            report: RecoveryReport {
                records_replayed: 0,
                bytes_truncated: file_len,
            },
        });
    }

    file.seek(SeekFrom::Start(0))?;
    let mut reader = BufReader::new(&mut *file);

    let mut header = [0u8; HEADER_SIZE as usize];
    reader.read_exact(&mut header)?;
    record::check_header(&header)?;

    let mut offset = HEADER_SIZE;
    let mut records_replayed = 0;
    loop {
        match read_frame(&mut reader, file_len - offset)? {
            Replay::Frame(record, len) => {
                let location = RecordLocation { offset, len };
                match record {
                    TableRecord::Put { key, .. } => index.apply_put(key, location),
                    TableRecord::Delete { key } => index.apply_delete(&key, len),
                }
                offset += u64::from(len);
                records_replayed += 1;
            }
            Replay::End | Replay::Torn => break,
        }
    }
    drop(reader);

    let bytes_truncated = file_len - offset;
    if bytes_truncated > 0 {
        file.set_len(offset)?;
        file.sync_all()?;
    }
    file.seek(SeekFrom::Start(offset))?;

    Ok(RecoveredTable {
        index,
        end: offset,
        report: RecoveryReport {
            records_replayed,
            bytes_truncated,
        },
    })
}

/// Read the next frame given the bytes remaining in the file
fn read_frame<R: Read>(reader: &mut R, remaining: u64) -> Result<Replay> {
    if remaining == 0 {
        return Ok(Replay::End);
    }
    if remaining < FRAME_HEADER_SIZE as u64 {
        return Ok(Replay::Torn);
    }

    let mut header = [0u8; FRAME_HEADER_SIZE];
    if !read_fully(reader, &mut header)? {
        return Ok(Replay::Torn);
    }
    let (crc, payload_len) = record::parse_frame_header(&header);

    if payload_len > MAX_PAYLOAD_SIZE {
        return Ok(Replay::Torn);
    }
    let frame_len = FRAME_HEADER_SIZE as u32 + payload_len;
    if u64::from(frame_len) > remaining {
        return Ok(Replay::Torn);
    }

    let mut payload = vec![0u8; payload_len as usize];
    if !read_fully(reader, &mut payload)? {
        return Ok(Replay::Torn);
    }

    match record::decode_payload(crc, &payload) {
        Ok(record) => Ok(Replay::Frame(record, frame_len)),
        Err(err) => {
            tracing::debug!("Stopping replay at corrupted frame: {}", err);
            Ok(Replay::Torn)
        }
    }
}

/// `read_exact` that reports a short read as `false` instead of an error
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}
