//! Entity model
//!
//! Ownership is strictly hierarchical: a service group owns its service
//! information and redirect entries, service information owns its processes
//! and a process owns its endpoints. Cross-entity references are by ID only.

mod endpoint;
mod process;
mod redirect;
mod service_group;
mod service_information;
mod transport_profile;

pub use endpoint::Endpoint;
pub use process::Process;
pub use redirect::Redirect;
pub use service_group::ServiceGroup;
pub use service_information::{EndpointRef, MergeReport, ServiceInformation};
pub use transport_profile::{TransportProfile, TransportProfileState};

use crate::identifier::{DocumentTypeId, ParticipantId};

/// Key of a (participant, document type) pair
///
/// Service information and redirects share this key space, which is what
/// makes them mutually exclusive per pair.
pub fn document_key(participant: &ParticipantId, document_type: &DocumentTypeId) -> String {
    format!("{}-{}", participant.uri(), document_type.uri())
}
