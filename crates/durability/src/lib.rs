//! Durability layer for the SMP registry
//!
//! This crate handles everything that touches disk:
//!
//! - Durable Store Contract: `DurableStore`, `Mutation`, `ActionType`
//! - WAL: single-file recovery log with CRC-checked frames
//! - Durability modes: Always (default), Standard
//! - Snapshot documents with crash-safe rewrite
//! - `WalStore`: in-memory collection backed by snapshot + log, with recovery
//! - `sql`: transactional SQLite backend (feature `sql`)
//! - `MemoryStore`: volatile store for tests and ephemeral registries

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding;
pub mod snapshot;
#[cfg(feature = "sql")]
pub mod sql;
pub mod store;
pub mod wal;
pub mod wal_store;

pub use encoding::WalRecord;
pub use snapshot::SnapshotInfo;
#[cfg(feature = "sql")]
pub use sql::{
    SqlBackend, SqlRedirectStore, SqlServiceGroupStore, SqlServiceInformationStore,
    SqlTransportProfileStore,
};
pub use store::{ActionType, DurableStore, MemoryStore, Mutation};
pub use wal::{DurabilityMode, ReadStopReason, WalCounters};
pub use wal_store::{RecoveryStats, WalState, WalStore, WalStoreConfig, DEFAULT_SNAPSHOT_THRESHOLD};
