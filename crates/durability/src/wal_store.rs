//! WAL document store
//!
//! Entities live in memory, backed by a snapshot document and an
//! append-only recovery log.
//!
//! ## State machine
//!
//! ```text
//!            apply (append + fsync)
//!   Clean ──────────────────────────▶ Dirty { pending_records }
//!     ▲                                  │
//!     └──────── checkpoint ──────────────┘
//!        (write snapshot, truncate log)
//! ```
//!
//! A checkpoint runs automatically once `snapshot_threshold` records are
//! pending, and on [`DurableStore::flush`]. Dropping the store does not
//! checkpoint: the log stays in place and is replayed by the next `open`.
//!
//! ## Recovery
//!
//! `open` removes a stale snapshot temp file, loads the snapshot if there
//! is one, replays every log record in order and checkpoints. Replay is
//! idempotent (Create/Update upsert, Delete removes if present), so a crash
//! between snapshot rename and log truncation is harmless. Recovery
//! finishes before `open` returns, so nothing can observe or mutate a
//! half-replayed store.

use crate::encoding::{encode_record, WalRecord};
use crate::snapshot::{self, SnapshotInfo};
use crate::store::{DurableStore, Mutation};
use crate::wal::{self, DurabilityMode, ReadStopReason, WalCounters, WalWriter};
use parking_lot::Mutex;
use smp_core::{Entity, Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

/// Default number of pending records that triggers a checkpoint
pub const DEFAULT_SNAPSHOT_THRESHOLD: usize = 1000;

/// Configuration for a [`WalStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalStoreConfig {
    /// When appends are fsynced
    pub durability: DurabilityMode,
    /// Pending records that trigger an automatic checkpoint
    pub snapshot_threshold: usize,
}

impl Default for WalStoreConfig {
    fn default() -> Self {
        Self {
            durability: DurabilityMode::Always,
            snapshot_threshold: DEFAULT_SNAPSHOT_THRESHOLD,
        }
    }
}

impl WalStoreConfig {
    /// Set the durability mode
    pub fn with_durability(mut self, durability: DurabilityMode) -> Self {
        self.durability = durability;
        self
    }

    /// Set the checkpoint threshold (at least 1)
    pub fn with_snapshot_threshold(mut self, threshold: usize) -> Self {
        self.snapshot_threshold = threshold.max(1);
        self
    }
}

/// Whether the log holds records not yet covered by the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalState {
    /// Snapshot is current, log is empty
    Clean,
    /// Log holds records newer than the snapshot
    Dirty {
        /// Records appended since the last checkpoint
        pending_records: u64,
    },
}

/// What `open` found and did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Records loaded from the snapshot
    pub snapshot_records: usize,
    /// Log records replayed on top of the snapshot
    pub wal_records_replayed: usize,
    /// Bytes of a torn final log record that were discarded
    pub torn_bytes_discarded: u64,
    /// Whether a stale snapshot temp file was removed
    pub stale_temp_removed: bool,
    /// Entities after recovery
    pub entities: usize,
}

struct Inner<E> {
    entities: BTreeMap<String, E>,
    writer: WalWriter,
    next_sequence: u64,
    state: WalState,
}

/// Durable store backed by a snapshot document and a recovery log
pub struct WalStore<E> {
    dir: PathBuf,
    name: String,
    config: WalStoreConfig,
    inner: Mutex<Inner<E>>,
    recovery: RecoveryStats,
}

impl<E: Entity> WalStore<E> {
    /// Open the collection for `E` in `dir`, recovering from the log
    pub fn open(dir: &Path, config: WalStoreConfig) -> Result<Self> {
        Self::open_named(dir, E::KIND.name(), config)
    }

    /// Open collection `name` in `dir`, recovering from the log
    pub fn open_named(dir: &Path, name: &str, config: WalStoreConfig) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let wal_path = Self::wal_path_of(dir, name);
        let mut stats = RecoveryStats {
            stale_temp_removed: snapshot::cleanup_temp_file(dir, name)?,
            ..RecoveryStats::default()
        };

        let mut entities = BTreeMap::new();
        if let Some(records) = snapshot::read::<E>(dir, name)? {
            stats.snapshot_records = records.len();
            entities.extend(records.into_iter().map(|e| (e.id(), e)));
        }

        let log = wal::read_all::<E>(&wal_path)?;
        for record in &log.records {
            record.mutation.replay_into(&mut entities);
        }
        stats.wal_records_replayed = log.records.len();
        if let ReadStopReason::TornTail { discarded, .. } = log.stop_reason {
            stats.torn_bytes_discarded = discarded;
        }
        stats.entities = entities.len();

        let writer = WalWriter::open(&wal_path, config.durability, log.valid_end)?;
        let state = if log.valid_end > 0 {
            WalState::Dirty {
                pending_records: log.records.len() as u64,
            }
        } else {
            WalState::Clean
        };

        let store = WalStore {
            dir: dir.to_path_buf(),
            name: name.to_string(),
            config,
            inner: Mutex::new(Inner {
                entities,
                writer,
                next_sequence: log.records.last().map_or(1, |r| r.sequence + 1),
                state,
            }),
            recovery: stats,
        };

        if matches!(state, WalState::Dirty { .. }) {
            let mut inner = store.inner.lock();
            store.checkpoint_locked(&mut inner)?;
        }

        info!(
            collection = %store.name,
            snapshot_records = store.recovery.snapshot_records,
            wal_records_replayed = store.recovery.wal_records_replayed,
            torn_bytes_discarded = store.recovery.torn_bytes_discarded,
            entities = store.recovery.entities,
            "Recovery complete"
        );
        Ok(store)
    }

    fn wal_path_of(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{}.wal", name))
    }

    /// Path of the recovery log
    pub fn wal_path(&self) -> PathBuf {
        Self::wal_path_of(&self.dir, &self.name)
    }

    /// Path of the snapshot document
    pub fn snapshot_path(&self) -> PathBuf {
        snapshot::snapshot_path(&self.dir, &self.name)
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration
    pub fn config(&self) -> WalStoreConfig {
        self.config
    }

    /// What `open` found and did
    pub fn recovery_stats(&self) -> &RecoveryStats {
        &self.recovery
    }

    /// Current log state
    pub fn state(&self) -> WalState {
        self.inner.lock().state
    }

    /// Number of stored entities
    pub fn len(&self) -> usize {
        self.inner.lock().entities.len()
    }

    /// True if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entities.is_empty()
    }

    /// Cumulative log counters
    pub fn wal_counters(&self) -> WalCounters {
        self.inner.lock().writer.counters()
    }

    /// Write a snapshot and truncate the log
    pub fn checkpoint(&self) -> Result<SnapshotInfo> {
        let mut inner = self.inner.lock();
        self.checkpoint_locked(&mut inner)
    }

    fn checkpoint_locked(&self, inner: &mut Inner<E>) -> Result<SnapshotInfo> {
        let info = snapshot::write_atomic(&self.dir, &self.name, inner.entities.values())
            .map_err(|e| Error::storage_caused(format!("Failed to write snapshot for {}", self.name), e))?;
        inner.writer.truncate().map_err(|e| {
            Error::storage_caused(format!("Failed to truncate WAL for {}", self.name), e)
        })?;
        inner.next_sequence = 1;
        inner.state = WalState::Clean;
        info!(
            collection = %self.name,
            records = info.record_count,
            size_bytes = info.size_bytes,
            "Checkpoint complete"
        );
        Ok(info)
    }
}

impl<E: Entity> DurableStore<E> for WalStore<E> {
    fn load_all(&self) -> Result<Vec<E>> {
        Ok(self.inner.lock().entities.values().cloned().collect())
    }

    fn apply(&self, mutation: &Mutation<E>) -> Result<()> {
        let mut inner = self.inner.lock();
        mutation.check(|id| inner.entities.contains_key(id))?;

        let sequence = inner.next_sequence;
        let frame = encode_record(&WalRecord::new(sequence, mutation.clone()))?;
        inner.writer.append(&frame).map_err(|e| {
            Error::storage_caused(
                format!("Failed to append {} record to {}", mutation.action(), self.name),
                e,
            )
        })?;

        mutation.replay_into(&mut inner.entities);
        inner.next_sequence += 1;
        let pending = match inner.state {
            WalState::Clean => 1,
            WalState::Dirty { pending_records } => pending_records + 1,
        };
        inner.state = WalState::Dirty {
            pending_records: pending,
        };
        debug!(
            collection = %self.name,
            action = %mutation.action(),
            id = %mutation.id(),
            sequence,
            "WAL record appended"
        );

        if pending >= self.config.snapshot_threshold as u64 {
            // The record is already durable in the log; a failed checkpoint
            // leaves the store Dirty and is retried on the next threshold.
            if let Err(e) = self.checkpoint_locked(&mut inner) {
                error!(collection = %self.name, error = %e, "Automatic checkpoint failed");
            }
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<E>> {
        Ok(self.inner.lock().entities.get(id).cloned())
    }

    fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if matches!(inner.state, WalState::Dirty { .. }) {
            self.checkpoint_locked(&mut inner)?;
        }
        Ok(())
    }

    fn sync_interval(&self) -> Option<Duration> {
        match self.config.durability {
            DurabilityMode::Always => None,
            DurabilityMode::Standard { interval_ms, .. } => {
                Some(Duration::from_millis(interval_ms.max(1)))
            }
        }
    }

    fn sync_if_overdue(&self) -> Result<bool> {
        self.inner.lock().writer.sync_if_overdue().map_err(|e| {
            Error::storage_caused(format!("Failed to sync WAL for {}", self.name), e)
        })
    }

    fn backend_name(&self) -> &'static str {
        "wal"
    }
}
