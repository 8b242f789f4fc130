//! Endpoint: a reachable technical address for one transport profile

use crate::change::Change;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Leaf of the service information tree
///
/// Identity within its process is the transport profile. Every other field
/// is mutable and is overwritten in place by a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Transport profile ID, e.g. `peppol-transport-as4-v2_0` (non-empty)
    transport_profile: String,

    /// Endpoint reference URL
    pub endpoint_reference: Option<String>,

    /// Whether the receiver requires a business level signature
    pub requires_business_level_signature: bool,

    /// Minimum authentication level
    pub minimum_authentication_level: Option<String>,

    /// Start of the validity window (open if `None`)
    pub service_activation: Option<DateTime<Utc>>,

    /// End of the validity window (open if `None`)
    pub service_expiration: Option<DateTime<Utc>>,

    /// Endpoint certificate
    pub certificate: Option<String>,

    /// Human readable description
    pub service_description: Option<String>,

    /// Technical contact URL or mail address
    pub technical_contact_url: Option<String>,

    /// Technical information URL
    pub technical_information_url: Option<String>,

    /// Opaque extension blob
    pub extension: Option<String>,
}

impl Endpoint {
    /// Create an endpoint with only the transport profile set
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the transport profile is empty.
    pub fn new(transport_profile: impl Into<String>) -> Result<Self> {
        let transport_profile = transport_profile.into();
        if transport_profile.trim().is_empty() {
            return Err(Error::validation("transport profile must not be empty"));
        }
        Ok(Self {
            transport_profile,
            endpoint_reference: None,
            requires_business_level_signature: false,
            minimum_authentication_level: None,
            service_activation: None,
            service_expiration: None,
            certificate: None,
            service_description: None,
            technical_contact_url: None,
            technical_information_url: None,
            extension: None,
        })
    }

    /// Transport profile ID
    #[inline]
    pub fn transport_profile(&self) -> &str {
        &self.transport_profile
    }

    /// Set the endpoint reference URL
    pub fn with_endpoint_reference(mut self, url: impl Into<String>) -> Self {
        self.endpoint_reference = Some(url.into());
        self
    }

    /// Set the business level signature flag
    pub fn with_business_level_signature(mut self, required: bool) -> Self {
        self.requires_business_level_signature = required;
        self
    }

    /// Set the minimum authentication level
    pub fn with_minimum_authentication_level(mut self, level: impl Into<String>) -> Self {
        self.minimum_authentication_level = Some(level.into());
        self
    }

    /// Set the validity window
    pub fn with_validity(
        mut self,
        activation: Option<DateTime<Utc>>,
        expiration: Option<DateTime<Utc>>,
    ) -> Self {
        self.service_activation = activation;
        self.service_expiration = expiration;
        self
    }

    /// Set the certificate
    pub fn with_certificate(mut self, certificate: impl Into<String>) -> Self {
        self.certificate = Some(certificate.into());
        self
    }

    /// Set the service description
    pub fn with_service_description(mut self, description: impl Into<String>) -> Self {
        self.service_description = Some(description.into());
        self
    }

    /// Set the technical contact URL
    pub fn with_technical_contact_url(mut self, url: impl Into<String>) -> Self {
        self.technical_contact_url = Some(url.into());
        self
    }

    /// Set the technical information URL
    pub fn with_technical_information_url(mut self, url: impl Into<String>) -> Self {
        self.technical_information_url = Some(url.into());
        self
    }

    /// Set the extension blob
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// True if `instant` lies inside the validity window
    ///
    /// Both ends are inclusive; a missing end is unbounded.
    pub fn is_valid_at(&self, instant: DateTime<Utc>) -> bool {
        if let Some(activation) = self.service_activation {
            if instant < activation {
                return false;
            }
        }
        if let Some(expiration) = self.service_expiration {
            if instant > expiration {
                return false;
            }
        }
        true
    }

    /// Overwrite every mutable field with the values from `other`
    ///
    /// The transport profile is identity and is left untouched.
    pub fn update_from(&mut self, other: &Endpoint) -> Change {
        let mut updated = other.clone();
        updated.transport_profile = std::mem::take(&mut self.transport_profile);
        let change = Change::from_bool(*self != updated);
        *self = updated;
        change
    }
}
