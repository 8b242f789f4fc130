//! Integration tests for the storage backends.
//!
//! These tests exercise the full registry lifecycle (open, write, drop,
//! reopen) against real files: recovery log replay, torn tails,
//! checkpoints and the SQLite backend. Frame encoding and snapshot
//! parsing are covered by unit tests in `crates/durability`.

#[path = "../common/mod.rs"]
mod common;

mod config_file;
mod crash_recovery;
#[cfg(feature = "sql")]
mod sql_backend;
mod torn_tail;
