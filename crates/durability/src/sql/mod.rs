//! Transactional relational backend (SQLite)
//!
//! One [`SqlBackend`] owns the connection; the per-entity stores share
//! it through an `Arc`. Every `apply` runs in its own transaction.

mod backend;
mod redirect;
mod service_group;
mod service_information;
mod transport_profile;

pub use backend::SqlBackend;
pub use redirect::SqlRedirectStore;
pub use service_group::SqlServiceGroupStore;
pub use service_information::SqlServiceInformationStore;
pub use transport_profile::SqlTransportProfileStore;
