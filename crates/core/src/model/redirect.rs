//! Redirect: metadata for a document type lives at another SMP

use crate::change::Change;
use crate::entity::{Entity, EntityKind};
use crate::error::{Error, Result};
use crate::identifier::{DocumentTypeId, ParticipantId};
use crate::model::document_key;
use serde::{Deserialize, Serialize};

/// Pointer to another SMP for one (participant, document type) pair
///
/// Shares its key space with [`ServiceInformation`](crate::ServiceInformation).
/// Target, certificate data and extension are replaced as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    participant: ParticipantId,
    document_type: DocumentTypeId,
    /// URL of the SMP now serving this document type
    pub target_href: String,
    /// Subject unique identifier of the target SMP's certificate
    pub subject_unique_identifier: String,
    /// Target SMP certificate
    pub certificate: Option<String>,
    /// Opaque extension blob
    pub extension: Option<String>,
}

impl Redirect {
    /// Create a redirect
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the target href is empty.
    pub fn new(
        participant: ParticipantId,
        document_type: DocumentTypeId,
        target_href: impl Into<String>,
        subject_unique_identifier: impl Into<String>,
    ) -> Result<Self> {
        let target_href = target_href.into();
        if target_href.trim().is_empty() {
            return Err(Error::validation("redirect target href must not be empty"));
        }
        Ok(Self {
            participant,
            document_type,
            target_href,
            subject_unique_identifier: subject_unique_identifier.into(),
            certificate: None,
            extension: None,
        })
    }

    /// Set the certificate
    pub fn with_certificate(mut self, certificate: Option<String>) -> Self {
        self.certificate = certificate;
        self
    }

    /// Set the extension blob
    pub fn with_extension(mut self, extension: Option<String>) -> Self {
        self.extension = extension;
        self
    }

    /// Participant owning this redirect
    #[inline]
    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }

    /// Redirected document type
    #[inline]
    pub fn document_type(&self) -> &DocumentTypeId {
        &self.document_type
    }

    /// ID of the owning service group
    pub fn service_group_id(&self) -> String {
        self.participant.uri()
    }

    /// True if this redirect belongs to the given (participant, document type) pair
    pub fn matches(&self, participant: &ParticipantId, document_type: &DocumentTypeId) -> bool {
        self.participant.has_same_content(participant)
            && self.document_type.has_same_content(document_type)
    }

    /// Take target, certificate data and extension from `other`
    pub fn update_from(&mut self, other: &Redirect) -> Change {
        let before = (
            &self.target_href,
            &self.subject_unique_identifier,
            &self.certificate,
            &self.extension,
        );
        let after = (
            &other.target_href,
            &other.subject_unique_identifier,
            &other.certificate,
            &other.extension,
        );
        if before == after {
            return Change::Unchanged;
        }
        self.target_href = other.target_href.clone();
        self.subject_unique_identifier = other.subject_unique_identifier.clone();
        self.certificate = other.certificate.clone();
        self.extension = other.extension.clone();
        Change::Changed
    }
}

impl Entity for Redirect {
    const KIND: EntityKind = EntityKind::Redirect;

    fn id(&self) -> String {
        document_key(&self.participant, &self.document_type)
    }
}
