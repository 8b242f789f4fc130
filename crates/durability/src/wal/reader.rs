//! WAL reader for recovery and replay.

use crate::encoding::{decode_record, WalRecord, LENGTH_PREFIX_SIZE};
use smp_core::{Entity, Error, Result};
use std::path::Path;

/// Why reading stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStopReason {
    /// Every byte was consumed
    EndOfData,
    /// The last frame was cut short or damaged (torn write)
    TornTail {
        /// Offset of the discarded frame
        offset: u64,
        /// Bytes discarded
        discarded: u64,
    },
}

/// Result of reading a whole log
#[derive(Debug)]
pub struct WalReadResult<E> {
    /// Valid records, in log order
    pub records: Vec<WalRecord<E>>,
    /// Offset just past the last valid record
    pub valid_end: u64,
    /// Why reading stopped
    pub stop_reason: ReadStopReason,
}

/// Read every record of the log at `path`
///
/// A missing file reads as an empty log. A frame that is cut short, or a
/// damaged frame that ends exactly at end of file, is the signature of a
/// crash during append: it is dropped and reported as
/// [`ReadStopReason::TornTail`]. Damage anywhere else means records after it
/// would be lost, so it is an error.
///
/// # Errors
///
/// Returns `Error::Corruption` for a damaged frame that is followed by
/// more data.
pub fn read_all<E: Entity>(path: &Path) -> Result<WalReadResult<E>> {
    let buffer = match std::fs::read(path) {
        Ok(buffer) => buffer,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    read_from_bytes(&buffer)
}

/// Read every record from an in-memory copy of a log
pub fn read_from_bytes<E: Entity>(buffer: &[u8]) -> Result<WalReadResult<E>> {
    let mut records = Vec::new();
    let mut offset = 0usize;
    let mut stop_reason = ReadStopReason::EndOfData;

    while offset < buffer.len() {
        let remaining = &buffer[offset..];
        match decode_record::<E>(remaining, offset as u64) {
            Ok((record, consumed)) => {
                records.push(record);
                offset += consumed;
            }
            Err(Error::IncompleteEntry { .. }) => {
                stop_reason = torn_tail(offset, buffer.len());
                break;
            }
            Err(Error::Corruption { offset: at, reason }) => {
                if frame_ends_at_eof(remaining) {
                    tracing::warn!(offset = at, reason = %reason, "Dropping damaged final WAL record");
                    stop_reason = torn_tail(offset, buffer.len());
                    break;
                }
                return Err(Error::Corruption { offset: at, reason });
            }
            Err(e) => return Err(e),
        }
    }

    if let ReadStopReason::TornTail { offset, discarded } = stop_reason {
        tracing::warn!(offset, discarded, "WAL ends in a partial record");
    }

    Ok(WalReadResult {
        records,
        valid_end: offset as u64,
        stop_reason,
    })
}

fn torn_tail(offset: usize, len: usize) -> ReadStopReason {
    ReadStopReason::TornTail {
        offset: offset as u64,
        discarded: (len - offset) as u64,
    }
}

fn frame_ends_at_eof(remaining: &[u8]) -> bool {
    if remaining.len() < LENGTH_PREFIX_SIZE {
        return true;
    }
    let len = u32::from_le_bytes([remaining[0], remaining[1], remaining[2], remaining[3]]) as usize;
    LENGTH_PREFIX_SIZE + len >= remaining.len()
}
