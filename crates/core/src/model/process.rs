//! Process: a business process grouping endpoints by transport profile

use crate::change::Change;
use crate::error::{Error, Result};
use crate::identifier::ProcessId;
use crate::model::endpoint::Endpoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A process and its endpoints
///
/// Endpoints are keyed by transport profile, which is unique per process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    process_id: ProcessId,
    endpoints: BTreeMap<String, Endpoint>,
    /// Opaque extension blob
    pub extension: Option<String>,
}

impl Process {
    /// Create a process without endpoints
    pub fn new(process_id: ProcessId) -> Self {
        Self {
            process_id,
            endpoints: BTreeMap::new(),
            extension: None,
        }
    }

    /// Set the extension blob
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Add an endpoint, builder style
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the transport profile is already present.
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Result<Self> {
        self.add_endpoint(endpoint)?;
        Ok(self)
    }

    /// Process identifier
    #[inline]
    pub fn process_id(&self) -> &ProcessId {
        &self.process_id
    }

    /// Map key of this process inside its service information
    pub fn key(&self) -> String {
        self.process_id.uri()
    }

    /// Endpoint for a transport profile
    pub fn endpoint(&self, transport_profile: &str) -> Option<&Endpoint> {
        self.endpoints.get(transport_profile)
    }

    pub(crate) fn endpoint_mut(&mut self, transport_profile: &str) -> Option<&mut Endpoint> {
        self.endpoints.get_mut(transport_profile)
    }

    /// All endpoints, ordered by transport profile
    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.values()
    }

    /// Number of endpoints
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Add a new endpoint
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the transport profile is already present.
    pub fn add_endpoint(&mut self, endpoint: Endpoint) -> Result<()> {
        let profile = endpoint.transport_profile().to_string();
        if self.endpoints.contains_key(&profile) {
            return Err(Error::validation(format!(
                "process '{}' already has an endpoint for transport profile '{}'",
                self.process_id, profile
            )));
        }
        self.endpoints.insert(profile, endpoint);
        Ok(())
    }

    /// Insert or replace the endpoint for its transport profile
    pub fn set_endpoint(&mut self, endpoint: Endpoint) -> Change {
        match self.endpoints.get_mut(endpoint.transport_profile()) {
            Some(existing) => existing.update_from(&endpoint),
            None => {
                self.endpoints
                    .insert(endpoint.transport_profile().to_string(), endpoint);
                Change::Changed
            }
        }
    }

    /// Remove the endpoint for a transport profile
    pub fn delete_endpoint(&mut self, transport_profile: &str) -> Change {
        Change::from_bool(self.endpoints.remove(transport_profile).is_some())
    }

    /// True if an endpoint exists for the transport profile
    pub fn contains_transport_profile(&self, transport_profile: &str) -> bool {
        self.endpoints.contains_key(transport_profile)
    }
}
