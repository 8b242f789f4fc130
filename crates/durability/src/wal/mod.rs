//! WAL (Write-Ahead Log) module
//!
//! - `mode`: durability modes (Always, Standard)
//! - `writer`: frame appender with fsync policy (WalWriter)
//! - `reader`: recovery reader with torn-tail detection

pub mod mode;
pub mod reader;
pub mod writer;

pub use mode::DurabilityMode;
pub use reader::{read_all, ReadStopReason, WalReadResult};
pub use writer::{WalCounters, WalWriter};
