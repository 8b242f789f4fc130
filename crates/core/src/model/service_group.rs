//! Service group: the registration record of one participant

use crate::change::Change;
use crate::entity::{Entity, EntityKind};
use crate::identifier::ParticipantId;
use serde::{Deserialize, Serialize};

/// A registered participant
///
/// Identity is the normalized participant identifier. Owner and extension
/// are mutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceGroup {
    participant: ParticipantId,
    owner_id: String,
    /// Opaque extension blob
    pub extension: Option<String>,
}

impl ServiceGroup {
    /// Create a service group
    pub fn new(participant: ParticipantId, owner_id: impl Into<String>) -> Self {
        Self {
            participant,
            owner_id: owner_id.into(),
            extension: None,
        }
    }

    /// Set the extension blob
    pub fn with_extension(mut self, extension: Option<String>) -> Self {
        self.extension = extension;
        self
    }

    /// Participant identifier
    #[inline]
    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }

    /// ID of the owning user
    #[inline]
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Reassign the owner
    pub fn set_owner_id(&mut self, owner_id: &str) -> Change {
        if self.owner_id == owner_id {
            return Change::Unchanged;
        }
        self.owner_id = owner_id.to_string();
        Change::Changed
    }

    /// Replace the extension blob
    pub fn set_extension(&mut self, extension: Option<String>) -> Change {
        if self.extension == extension {
            return Change::Unchanged;
        }
        self.extension = extension;
        Change::Changed
    }
}

impl Entity for ServiceGroup {
    const KIND: EntityKind = EntityKind::ServiceGroup;

    fn id(&self) -> String {
        self.participant.uri()
    }
}
