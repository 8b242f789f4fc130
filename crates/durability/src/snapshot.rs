//! Snapshot documents
//!
//! A snapshot is the full contents of one entity collection, written as a
//! JSON document with records sorted by ID.
//!
//! Crash-safe write:
//! 1. Write `.<name>.json.tmp` in the same directory
//! 2. fsync the temp file
//! 3. Atomic rename to `<name>.json`
//! 4. fsync the parent directory
//!
//! A crash at any point leaves either the previous snapshot or the new one
//! in place, plus at most a stale temp file that is removed on open.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smp_core::{Entity, EntityKind, Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Current snapshot document format
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// On-disk snapshot document
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound = "E: Entity")]
pub struct SnapshotDocument<E> {
    /// Document format version
    pub format_version: u32,
    /// Entity collection stored in this document
    pub kind: EntityKind,
    /// When the snapshot was written
    pub created_at: DateTime<Utc>,
    /// Records, sorted by ID
    pub records: Vec<E>,
}

/// Information about a written snapshot
#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    /// Final path
    pub path: PathBuf,
    /// Number of records written
    pub record_count: usize,
    /// Document size in bytes
    pub size_bytes: u64,
}

/// Path of the snapshot document for collection `name`
pub fn snapshot_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.json", name))
}

/// Path of the temp file used while writing the snapshot for `name`
pub fn temp_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!(".{}.json.tmp", name))
}

/// Write the snapshot for collection `name` crash-safely
///
/// `records` must already be sorted by ID.
pub fn write_atomic<'a, E, I>(dir: &Path, name: &str, records: I) -> Result<SnapshotInfo>
where
    E: Entity + 'a,
    I: IntoIterator<Item = &'a E>,
{
    let final_path = snapshot_path(dir, name);
    let temp = temp_path(dir, name);

    if temp.exists() {
        tracing::warn!(path = %temp.display(), "Removing stale temp file");
        let _ = std::fs::remove_file(&temp);
    }

    let document = SnapshotDocument {
        format_version: SNAPSHOT_FORMAT_VERSION,
        kind: E::KIND,
        created_at: Utc::now(),
        records: records.into_iter().cloned().collect::<Vec<E>>(),
    };

    let result = write_temp(&temp, &document).and_then(|size_bytes| {
        std::fs::rename(&temp, &final_path)?;
        File::open(dir)?.sync_all()?;
        Ok(size_bytes)
    });

    match result {
        Ok(size_bytes) => {
            tracing::debug!(
                path = %final_path.display(),
                records = document.records.len(),
                size_bytes,
                "Snapshot written"
            );
            Ok(SnapshotInfo {
                path: final_path,
                record_count: document.records.len(),
                size_bytes,
            })
        }
        Err(e) => {
            tracing::warn!(
                temp_path = %temp.display(),
                error = %e,
                "Snapshot write failed, cleaning up temp file"
            );
            let _ = std::fs::remove_file(&temp);
            Err(e)
        }
    }
}

fn write_temp<E: Entity>(path: &Path, document: &SnapshotDocument<E>) -> Result<u64> {
    let file = OpenOptions::new().create_new(true).write(true).open(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, document)?;
    writer.write_all(b"\n")?;
    let file = writer
        .into_inner()
        .map_err(|e| Error::IoError(e.into_error()))?;
    file.sync_all()?;
    Ok(file.metadata()?.len())
}

/// Read the snapshot for collection `name`; `None` if there is none
///
/// # Errors
///
/// Returns `Error::Corruption` if the document cannot be parsed or belongs
/// to a different entity kind.
pub fn read<E: Entity>(dir: &Path, name: &str) -> Result<Option<Vec<E>>> {
    let path = snapshot_path(dir, name);
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let document: SnapshotDocument<E> = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::Corruption {
            offset: 0,
            reason: format!("snapshot {} unreadable: {}", path.display(), e),
        })?;

    if document.format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(Error::Corruption {
            offset: 0,
            reason: format!(
                "snapshot {} has unsupported format version {}",
                path.display(),
                document.format_version
            ),
        });
    }
    if document.kind != E::KIND {
        return Err(Error::Corruption {
            offset: 0,
            reason: format!(
                "snapshot {} holds {} records, expected {}",
                path.display(),
                document.kind,
                E::KIND
            ),
        });
    }

    Ok(Some(document.records))
}

/// Remove a temp file left behind by a crash during snapshot write
///
/// Returns true if one was removed.
pub fn cleanup_temp_file(dir: &Path, name: &str) -> Result<bool> {
    let temp = temp_path(dir, name);
    if temp.exists() {
        std::fs::remove_file(&temp)?;
        return Ok(true);
    }
    Ok(false)
}
