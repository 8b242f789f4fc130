//! Integration tests for the registry managers and facade.
//!
//! Each module drives the public API the way a REST layer would: through
//! `SmpRegistry` and the managers it hands out. Backend specific recovery
//! behavior lives in the `durability` suite.

#[path = "../common/mod.rs"]
mod common;

mod authorization;
mod concurrency;
mod end_to_end;
mod service_groups;
