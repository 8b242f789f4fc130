//! The `Entity` trait shared by everything the registry persists

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of persisted entity
///
/// Used for log fields, store file names and audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Participant registration
    ServiceGroup,
    /// Endpoint metadata for one (participant, document type) pair
    ServiceInformation,
    /// Redirect to another SMP for one (participant, document type) pair
    Redirect,
    /// Transport protocol an endpoint can declare
    TransportProfile,
}

impl EntityKind {
    /// Stable lowercase name, used as the WAL collection name
    pub const fn name(&self) -> &'static str {
        match self {
            EntityKind::ServiceGroup => "service_group",
            EntityKind::ServiceInformation => "service_information",
            EntityKind::Redirect => "redirect",
            EntityKind::TransportProfile => "transport_profile",
        }
    }

    /// All kinds
    pub const fn all() -> [EntityKind; 4] {
        [
            EntityKind::ServiceGroup,
            EntityKind::ServiceInformation,
            EntityKind::Redirect,
            EntityKind::TransportProfile,
        ]
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A persisted entity with a stable string ID
///
/// The ID is derived from the entity's identifiers, never assigned, so the
/// same logical record always maps to the same key.
pub trait Entity:
    Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Kind tag
    const KIND: EntityKind;

    /// Stable ID used as the storage key
    fn id(&self) -> String;
}
