//! Service information: the process/endpoint tree of one document type
//!
//! ## Merge
//!
//! [`ServiceInformation::merge`] reconciles a stored tree with a submitted
//! one field by field instead of replacing it:
//!
//! 1. Stored processes absent from the submission are removed with all
//!    their endpoints.
//! 2. For processes present in both, stored endpoints absent from the
//!    submission are removed, endpoints present in both are overwritten in
//!    place, and new endpoints are inserted. The process extension is taken
//!    from the submission.
//! 3. Processes only present in the submission are inserted whole.
//! 4. The service information extension is taken from the submission.
//!
//! The resulting tree equals the submission. What differs from a replace is
//! the [`MergeReport`]: backends that store processes and endpoints as
//! separate records use it to touch only the records that changed.

use crate::change::Change;
use crate::entity::{Entity, EntityKind};
use crate::error::{Error, Result};
use crate::identifier::{DocumentTypeId, ParticipantId, ProcessId};
use crate::model::endpoint::Endpoint;
use crate::model::process::Process;
use crate::model::document_key;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Address of one endpoint inside a service information tree
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EndpointRef {
    /// Process key (URI form of the process identifier)
    pub process: String,
    /// Transport profile
    pub transport_profile: String,
}

impl EndpointRef {
    fn new(process: &str, transport_profile: &str) -> Self {
        Self {
            process: process.to_string(),
            transport_profile: transport_profile.to_string(),
        }
    }
}

/// Field-level difference between a stored tree and a submitted one
///
/// Endpoint lists only cover processes present on both sides: endpoints of
/// added or removed processes travel with their process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Processes only in the submission
    pub processes_added: Vec<String>,
    /// Processes only in the stored tree
    pub processes_removed: Vec<String>,
    /// Processes on both sides whose extension differs
    pub processes_updated: Vec<String>,
    /// Endpoints only in the submission
    pub endpoints_added: Vec<EndpointRef>,
    /// Endpoints only in the stored tree
    pub endpoints_removed: Vec<EndpointRef>,
    /// Endpoints on both sides with at least one differing field
    pub endpoints_updated: Vec<EndpointRef>,
    /// Endpoints on both sides that are identical
    pub endpoints_unchanged: usize,
    /// Whether the service information extension differs
    pub extension_changed: bool,
}

impl MergeReport {
    /// Compute the difference between `stored` and `submitted`
    pub fn between(stored: &ServiceInformation, submitted: &ServiceInformation) -> Self {
        let mut report = MergeReport::default();

        for key in stored.processes.keys() {
            if !submitted.processes.contains_key(key) {
                report.processes_removed.push(key.clone());
            }
        }

        for (key, new_process) in &submitted.processes {
            let old_process = match stored.processes.get(key) {
                Some(p) => p,
                None => {
                    report.processes_added.push(key.clone());
                    continue;
                }
            };

            if old_process.extension != new_process.extension {
                report.processes_updated.push(key.clone());
            }

            for old_endpoint in old_process.endpoints() {
                if !new_process.contains_transport_profile(old_endpoint.transport_profile()) {
                    report
                        .endpoints_removed
                        .push(EndpointRef::new(key, old_endpoint.transport_profile()));
                }
            }

            for new_endpoint in new_process.endpoints() {
                let profile = new_endpoint.transport_profile();
                match old_process.endpoint(profile) {
                    None => report.endpoints_added.push(EndpointRef::new(key, profile)),
                    Some(old_endpoint) if old_endpoint != new_endpoint => {
                        report.endpoints_updated.push(EndpointRef::new(key, profile))
                    }
                    Some(_) => report.endpoints_unchanged += 1,
                }
            }
        }

        report.extension_changed = stored.extension != submitted.extension;
        report
    }

    /// `Changed` if anything differs
    pub fn change(&self) -> Change {
        Change::from_bool(
            self.extension_changed
                || !self.processes_added.is_empty()
                || !self.processes_removed.is_empty()
                || !self.processes_updated.is_empty()
                || !self.endpoints_added.is_empty()
                || !self.endpoints_removed.is_empty()
                || !self.endpoints_updated.is_empty(),
        )
    }
}

/// Processes and endpoints a participant supports for one document type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInformation {
    participant: ParticipantId,
    document_type: DocumentTypeId,
    processes: BTreeMap<String, Process>,
    /// Opaque extension blob
    pub extension: Option<String>,
}

impl ServiceInformation {
    /// Create service information without processes
    pub fn new(participant: ParticipantId, document_type: DocumentTypeId) -> Self {
        Self {
            participant,
            document_type,
            processes: BTreeMap::new(),
            extension: None,
        }
    }

    /// Add a process, builder style
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the process is already present.
    pub fn with_process(mut self, process: Process) -> Result<Self> {
        self.add_process(process)?;
        Ok(self)
    }

    /// Set the extension blob
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Participant owning this entry
    #[inline]
    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }

    /// Document type of this entry
    #[inline]
    pub fn document_type(&self) -> &DocumentTypeId {
        &self.document_type
    }

    /// ID of the owning service group
    pub fn service_group_id(&self) -> String {
        self.participant.uri()
    }

    /// True if this entry belongs to the given (participant, document type) pair
    pub fn matches(&self, participant: &ParticipantId, document_type: &DocumentTypeId) -> bool {
        self.participant.has_same_content(participant)
            && self.document_type.has_same_content(document_type)
    }

    /// Process by identifier
    pub fn process(&self, process_id: &ProcessId) -> Option<&Process> {
        self.processes.get(&process_id.uri())
    }

    /// Process by map key (URI form of its identifier)
    pub fn process_by_key(&self, key: &str) -> Option<&Process> {
        self.processes.get(key)
    }

    /// All processes, ordered by key
    pub fn processes(&self) -> impl Iterator<Item = &Process> {
        self.processes.values()
    }

    /// Number of processes
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    /// Add a new process
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the process is already present.
    pub fn add_process(&mut self, process: Process) -> Result<()> {
        let key = process.key();
        if self.processes.contains_key(&key) {
            return Err(Error::validation(format!(
                "service information '{}' already contains process '{}'",
                self.id(),
                key
            )));
        }
        self.processes.insert(key, process);
        Ok(())
    }

    /// Remove a process and its endpoints
    pub fn delete_process(&mut self, process_id: &ProcessId) -> Change {
        Change::from_bool(self.processes.remove(&process_id.uri()).is_some())
    }

    /// Insert or overwrite one endpoint, creating its process if needed
    ///
    /// Sibling processes and endpoints are left as they are.
    pub fn upsert_endpoint(&mut self, process_id: &ProcessId, endpoint: Endpoint) -> Change {
        let key = process_id.uri();
        match self.processes.get_mut(&key) {
            Some(process) => process.set_endpoint(endpoint),
            None => {
                let mut process = Process::new(process_id.clone());
                process.set_endpoint(endpoint);
                self.processes.insert(key, process);
                Change::Changed
            }
        }
    }

    /// Endpoint for a (process, transport profile) pair
    pub fn endpoint(&self, process_id: &ProcessId, transport_profile: &str) -> Option<&Endpoint> {
        self.process(process_id)?.endpoint(transport_profile)
    }

    /// Total number of endpoints across all processes
    pub fn total_endpoint_count(&self) -> usize {
        self.processes.values().map(Process::endpoint_count).sum()
    }

    /// True if any process has an endpoint for the transport profile
    pub fn contains_transport_profile(&self, transport_profile: &str) -> bool {
        self.processes
            .values()
            .any(|p| p.contains_transport_profile(transport_profile))
    }

    /// Reconcile this tree with `submitted` (see module docs)
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if `submitted` belongs to a different
    /// (participant, document type) pair.
    pub fn merge(&mut self, submitted: &ServiceInformation) -> Result<MergeReport> {
        if !self.matches(&submitted.participant, &submitted.document_type) {
            return Err(Error::validation(format!(
                "cannot merge '{}' into '{}'",
                submitted.id(),
                self.id()
            )));
        }

        let report = MergeReport::between(self, submitted);

        for key in &report.processes_removed {
            self.processes.remove(key);
        }
        for r in &report.endpoints_removed {
            if let Some(process) = self.processes.get_mut(&r.process) {
                process.delete_endpoint(&r.transport_profile);
            }
        }

        for (key, new_process) in &submitted.processes {
            match self.processes.get_mut(key) {
                Some(process) => {
                    for new_endpoint in new_process.endpoints() {
                        match process.endpoint_mut(new_endpoint.transport_profile()) {
                            Some(existing) => {
                                existing.update_from(new_endpoint);
                            }
                            None => {
                                process.set_endpoint(new_endpoint.clone());
                            }
                        }
                    }
                    process.extension = new_process.extension.clone();
                }
                None => {
                    self.processes.insert(key.clone(), new_process.clone());
                }
            }
        }

        self.extension = submitted.extension.clone();
        Ok(report)
    }
}

impl Entity for ServiceInformation {
    const KIND: EntityKind = EntityKind::ServiceInformation;

    fn id(&self) -> String {
        document_key(&self.participant, &self.document_type)
    }
}
