//! Registry engine: the managers and their wiring
//!
//! This crate orchestrates the lower layers:
//! - Managers: service groups, service information (merge), redirects,
//!   transport profiles
//! - Callbacks fired after a change is stored
//! - Concurrency: one reader/writer lock per manager, held across the store call
//! - Two-phase registration hook with compensation on failure
//! - Audit notifications
//! - Configuration via `smp.toml`
//! - `SmpRegistry`: facade wiring everything to one backend
//!
//! Managers are constructed once and shared by handle. There is no global
//! locator.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod audit;
pub mod auth;
pub mod callback;
mod collection;
pub mod config;
pub mod hook;
pub mod redirect;
pub mod registry;
pub mod service_group;
pub mod service_information;
pub mod transport_profile;

pub use audit::{AuditSink, NoopAuditSink, TracingAuditSink};
pub use auth::{Credentials, User, UserDirectory};
pub use callback::{
    CallbackList, RedirectCallback, ServiceGroupCallback, ServiceInformationCallback,
};
pub use config::{BackendKind, ConfigError, RegistryConfig, CONFIG_FILE_NAME, DEFAULT_SQL_FILE};
pub use hook::{HookError, NoopRegistrationHook, RegistrationHook};
pub use redirect::RedirectManager;
pub use registry::{RegistryBuilder, RegistryStores, SmpRegistry};
pub use service_group::ServiceGroupManager;
pub use service_information::ServiceInformationManager;
pub use transport_profile::TransportProfileManager;
