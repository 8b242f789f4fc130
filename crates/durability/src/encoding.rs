//! WAL record encoding and decoding
//!
//! ## Frame Format
//!
//! ```text
//! [length: u32][action: u8][payload: bytes][crc32: u32]
//! ```
//!
//! - **length**: size of action + payload + crc (NOT including length itself)
//! - **action**: `ActionType` tag (1=Create, 2=Update, 3=Delete)
//! - **payload**: bincode-serialized `WalRecord`
//! - **crc32**: CRC32 over \[action\]\[payload\]
//!
//! All integers are little-endian.

use crate::store::{ActionType, Mutation};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use smp_core::{Entity, Error, Result};
use std::io::{Cursor, Read};

/// Size of the length prefix
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Minimum value of the length field: action(1) + crc(4)
const MIN_FRAME_LENGTH: usize = 5;

/// One logged mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "E: Entity")]
pub struct WalRecord<E> {
    /// Position in the log, starting at 1 after each checkpoint
    pub sequence: u64,
    /// The change
    pub mutation: Mutation<E>,
}

impl<E: Entity> WalRecord<E> {
    /// Create a record
    pub fn new(sequence: u64, mutation: Mutation<E>) -> Self {
        Self { sequence, mutation }
    }
}

fn checksum(action: u8, payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[action]);
    hasher.update(payload);
    hasher.finalize()
}

/// Encode a record into a frame ready for appending
pub fn encode_record<E: Entity>(record: &WalRecord<E>) -> Result<Vec<u8>> {
    let action = record.mutation.action().to_byte();
    let payload = bincode::serialize(record)?;
    let total_len = 1 + payload.len() + 4;

    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + total_len);
    buf.write_u32::<LittleEndian>(total_len as u32)?;
    buf.write_u8(action)?;
    buf.extend_from_slice(&payload);
    buf.write_u32::<LittleEndian>(checksum(action, &payload))?;
    Ok(buf)
}

/// Decode one frame from the start of `buf`
///
/// Returns the record and the number of bytes consumed. `offset` is the
/// file position of `buf[0]`, used for error reporting.
///
/// # Errors
///
/// - `Error::IncompleteEntry` if `buf` ends before the frame does
/// - `Error::Corruption` on a bad length, CRC mismatch, unknown action tag,
///   undecodable payload, or tag/payload disagreement
pub fn decode_record<E: Entity>(buf: &[u8], offset: u64) -> Result<(WalRecord<E>, usize)> {
    let mut cursor = Cursor::new(buf);

    let total_len = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::IncompleteEntry {
            offset,
            have: buf.len(),
            needed: LENGTH_PREFIX_SIZE,
        })? as usize;

    if total_len < MIN_FRAME_LENGTH {
        return Err(Error::Corruption {
            offset,
            reason: format!(
                "invalid frame length {} (minimum is {})",
                total_len, MIN_FRAME_LENGTH
            ),
        });
    }

    if buf.len() < LENGTH_PREFIX_SIZE + total_len {
        return Err(Error::IncompleteEntry {
            offset,
            have: buf.len(),
            needed: LENGTH_PREFIX_SIZE + total_len,
        });
    }

    let action = cursor.read_u8()?;
    let mut payload = vec![0u8; total_len - 1 - 4];
    cursor.read_exact(&mut payload)?;
    let expected_crc = cursor.read_u32::<LittleEndian>()?;

    let actual_crc = checksum(action, &payload);
    if actual_crc != expected_crc {
        return Err(Error::Corruption {
            offset,
            reason: format!(
                "CRC mismatch: expected {:08x}, got {:08x}",
                expected_crc, actual_crc
            ),
        });
    }

    let action = ActionType::from_byte(action).ok_or_else(|| Error::Corruption {
        offset,
        reason: format!("unknown action tag {}", action),
    })?;

    let record: WalRecord<E> = bincode::deserialize(&payload).map_err(|e| Error::Corruption {
        offset,
        reason: format!("deserialization failed: {}", e),
    })?;

    if record.mutation.action() != action {
        return Err(Error::Corruption {
            offset,
            reason: format!(
                "action tag {} does not match payload {}",
                action,
                record.mutation.action()
            ),
        });
    }

    Ok((record, LENGTH_PREFIX_SIZE + total_len))
}
