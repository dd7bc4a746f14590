//! Table record framing
//!
//! Every record is a frame: `[crc: u32 LE][len: u32 LE][payload]`, where the
//! payload is the bincode encoding of a [`TableRecord`] and the CRC covers the
//! payload only.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::{BackendError, Result};

use super::{HEADER_SIZE, MAGIC, VERSION};

/// Frame header size: CRC (4) + Len (4)
pub(crate) const FRAME_HEADER_SIZE: usize = 8;

/// Largest payload whose frame length still fits in a u32
pub(crate) const MAX_PAYLOAD_SIZE: u32 = u32::MAX - FRAME_HEADER_SIZE as u32;

/// A record as read back from the table file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) enum TableRecord {
    /// Upsert a key
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Remove a key
    Delete { key: Vec<u8> },
}

/// Borrowed form of [`TableRecord`] for the write path.
///
/// Variant order must match `TableRecord`: bincode encodes the variant index.
#[derive(Debug, Serialize)]
pub(crate) enum RecordRef<'a> {
    Put { key: &'a [u8], value: &'a [u8] },
    Delete { key: &'a [u8] },
}

/// Encode a record into a complete frame
pub(crate) fn encode_frame(record: &RecordRef<'_>) -> Result<Vec<u8>> {
    let payload = bincode::serialize(record)?;
    if payload.len() > MAX_PAYLOAD_SIZE as usize {
        return Err(BackendError::Serialization(format!(
            "record too large: {} bytes (max {})",
            payload.len(),
            MAX_PAYLOAD_SIZE
        )));
    }
    let len = payload.len() as u32;

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Split a frame header into (crc, payload length)
pub(crate) fn parse_frame_header(header: &[u8; FRAME_HEADER_SIZE]) -> (u32, u32) {
    let crc = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    (crc, len)
}

/// Verify a payload against its CRC and decode it
pub(crate) fn decode_payload(crc: u32, payload: &[u8]) -> Result<TableRecord> {
    let actual = crc32fast::hash(payload);
    if actual != crc {
        return Err(BackendError::TableCorruption(format!(
            "CRC mismatch: expected {:#010x}, got {:#010x}",
            crc, actual
        )));
    }
    Ok(bincode::deserialize(payload)?)
}

/// Decode a complete frame (header + payload)
pub(crate) fn decode_frame(frame: &[u8]) -> Result<TableRecord> {
    let header: &[u8; FRAME_HEADER_SIZE] = frame
        .get(..FRAME_HEADER_SIZE)
        .and_then(|h| h.try_into().ok())
        .ok_or_else(|| BackendError::TableCorruption("frame shorter than header".to_string()))?;
    let (crc, len) = parse_frame_header(header);

    let payload = &frame[FRAME_HEADER_SIZE..];
    if payload.len() != len as usize {
        return Err(BackendError::TableCorruption(format!(
            "frame length mismatch: header says {}, found {}",
            len,
            payload.len()
        )));
    }
    decode_payload(crc, payload)
}

/// Write the file header
pub(crate) fn write_header<W: Write>(writer: &mut W) -> Result<()> {
    writer.write_all(MAGIC)?;
    writer.write_all(&VERSION.to_le_bytes())?;
    writer.write_all(&[0u8; 2])?;
    Ok(())
}

/// Validate a file header
pub(crate) fn check_header(header: &[u8; HEADER_SIZE as usize]) -> Result<()> {
    if &header[0..4] != MAGIC {
        return Err(BackendError::TableCorruption(format!(
            "Invalid table magic: expected TBKV, got {:?}",
            &header[0..4]
        )));
    }

    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != VERSION {
        return Err(BackendError::TableCorruption(format!(
            "Unsupported table version: {}",
            version
        )));
    }
    Ok(())
}
