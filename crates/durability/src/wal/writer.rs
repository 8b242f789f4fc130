//! WAL writer with durability mode support.
//!
//! The writer appends encoded frames to a single log file and fsyncs
//! according to the configured [`DurabilityMode`].

use super::DurabilityMode;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Cumulative WAL operation counters.
///
/// These counters accumulate over the lifetime of the WalWriter
/// and are never reset, not even by truncation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalCounters {
    /// Total frame appends
    pub wal_appends: u64,
    /// Total sync/fsync calls
    pub sync_calls: u64,
    /// Total bytes written
    pub bytes_written: u64,
    /// Total truncations (one per checkpoint)
    pub truncations: u64,
}

/// Appends frames to the recovery log
pub struct WalWriter {
    file: File,
    path: PathBuf,
    durability: DurabilityMode,

    /// Current file size in bytes
    size: u64,

    /// Appends since last fsync (for Standard mode)
    writes_since_sync: usize,

    /// Last fsync time (for Standard mode)
    last_sync_time: Instant,

    /// Whether there is data written but not yet fsynced
    has_unsynced_data: bool,

    /// Set when a failed append could not be taken back; no further appends
    poisoned: bool,

    counters: WalCounters,

    #[cfg(test)]
    fail_next_sync: bool,
}

impl WalWriter {
    /// Open the log for appending, creating it if needed
    ///
    /// Appends go after `valid_end`; anything past it (a torn tail found
    /// during recovery) is cut off first.
    pub fn open(path: &Path, durability: DurabilityMode, valid_end: u64) -> io::Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let len = file.metadata()?.len();
        if len > valid_end {
            tracing::warn!(
                path = %path.display(),
                valid_end,
                discarded = len - valid_end,
                "Truncating torn WAL tail"
            );
            file.set_len(valid_end)?;
            file.sync_all()?;
        }
        let size = len.min(valid_end);
        file.seek(SeekFrom::Start(size))?;

        Ok(WalWriter {
            file,
            path: path.to_path_buf(),
            durability,
            size,
            writes_since_sync: 0,
            last_sync_time: Instant::now(),
            has_unsynced_data: false,
            poisoned: false,
            counters: WalCounters::default(),
            #[cfg(test)]
            fail_next_sync: false,
        })
    }

    /// Append one encoded frame.
    ///
    /// Respects the configured durability mode:
    /// - `Always`: Writes and fsyncs before returning
    /// - `Standard`: Writes, fsyncs once the batch or interval is exceeded
    ///
    /// A rejected append never stays in the log: if the write or the fsync
    /// fails, the file is cut back to its previous size. If even that fails
    /// the writer is poisoned and refuses every later append.
    pub fn append(&mut self, frame: &[u8]) -> io::Result<()> {
        if self.poisoned {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "WAL writer is poisoned by an append it could not take back",
            ));
        }

        let size_before = self.size;
        if let Err(e) = self.file.write_all(frame) {
            self.cut_back(size_before);
            return Err(e);
        }

        let unsynced_before = self.has_unsynced_data;
        self.size += frame.len() as u64;
        self.counters.wal_appends += 1;
        self.counters.bytes_written += frame.len() as u64;
        self.writes_since_sync += 1;
        self.has_unsynced_data = true;

        if let Err(e) = self.maybe_sync() {
            self.cut_back(size_before);
            self.size = size_before;
            self.counters.wal_appends -= 1;
            self.counters.bytes_written -= frame.len() as u64;
            self.writes_since_sync -= 1;
            self.has_unsynced_data = unsynced_before;
            return Err(e);
        }
        Ok(())
    }

    fn cut_back(&mut self, size: u64) {
        let result = self
            .file
            .set_len(size)
            .and_then(|()| self.file.seek(SeekFrom::Start(size)).map(|_| ()));
        if let Err(e) = result {
            tracing::error!(
                path = %self.path.display(),
                size,
                error = %e,
                "Failed to cut back WAL after a rejected append"
            );
            self.poisoned = true;
        }
    }

    /// True once an append could not be taken back
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Handle fsync based on durability mode.
    fn maybe_sync(&mut self) -> io::Result<()> {
        match self.durability {
            DurabilityMode::Always => self.sync(),
            DurabilityMode::Standard {
                interval_ms,
                batch_size,
            } => {
                if self.writes_since_sync >= batch_size
                    || self.last_sync_time.elapsed().as_millis() as u64 >= interval_ms
                {
                    self.sync()?;
                }
                Ok(())
            }
        }
    }

    /// Force any written data to disk.
    pub fn sync(&mut self) -> io::Result<()> {
        if self.has_unsynced_data {
            #[cfg(test)]
            if std::mem::take(&mut self.fail_next_sync) {
                return Err(io::Error::new(io::ErrorKind::Other, "injected fsync failure"));
            }
            self.file.sync_data()?;
            self.counters.sync_calls += 1;
        }
        self.writes_since_sync = 0;
        self.last_sync_time = Instant::now();
        self.has_unsynced_data = false;
        Ok(())
    }

    /// Sync if the Standard interval has elapsed and there is unsynced data.
    ///
    /// Returns `true` if a sync was performed.
    pub fn sync_if_overdue(&mut self) -> io::Result<bool> {
        if !self.has_unsynced_data {
            return Ok(false);
        }
        if let DurabilityMode::Standard { interval_ms, .. } = self.durability {
            if self.last_sync_time.elapsed().as_millis() as u64 >= interval_ms {
                self.sync()?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Empty the log once its contents are covered by a snapshot.
    pub fn truncate(&mut self) -> io::Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.sync_all()?;
        self.size = 0;
        self.writes_since_sync = 0;
        self.last_sync_time = Instant::now();
        self.has_unsynced_data = false;
        self.counters.truncations += 1;
        Ok(())
    }

    /// Current log size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a snapshot of cumulative WAL counters.
    pub fn counters(&self) -> WalCounters {
        self.counters.clone()
    }

    /// Make the next fsync fail
    #[cfg(test)]
    pub(crate) fn fail_next_sync(&mut self) {
        self.fail_next_sync = true;
    }
}

impl Drop for WalWriter {
    fn drop(&mut self) {
        if self.has_unsynced_data {
            let _ = self.file.sync_data();
        }
    }
}
