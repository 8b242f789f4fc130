//! Service Information Manager
//!
//! Owns the document type → process → endpoint trees. Submissions are
//! reconciled with the stored tree by [`ServiceInformation::merge`], and
//! the whole read-diff-write cycle runs under the write lock, so two merges
//! for the same (participant, document type) never interleave. Callbacks
//! run once the lock is released.

use crate::audit::AuditSink;
use crate::callback::{CallbackList, ServiceInformationCallback};
use crate::collection::{Collection, EntityMap};
use smp_core::{
    document_key, Change, DocumentTypeId, Endpoint, Entity, ParticipantId, ProcessId, Result,
    ServiceInformation,
};
use parking_lot::RwLockWriteGuard;
use smp_durability::{DurableStore, Mutation};
use std::sync::Arc;
use tracing::{debug, warn};

/// Manager of all [`ServiceInformation`] entries
pub struct ServiceInformationManager {
    entries: Collection<ServiceInformation>,
    callbacks: CallbackList<dyn ServiceInformationCallback>,
}

impl ServiceInformationManager {
    /// Load all entries from `store`
    pub fn open(
        store: Arc<dyn DurableStore<ServiceInformation>>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self> {
        Ok(Self {
            entries: Collection::load(store, audit)?,
            callbacks: CallbackList::new(),
        })
    }

    /// Observers notified of every stored change
    pub fn callbacks(&self) -> &CallbackList<dyn ServiceInformationCallback> {
        &self.callbacks
    }

    /// Merge a submitted tree into the stored one, or insert it if new
    ///
    /// Returns `Unchanged` if the stored tree already equals the submission;
    /// the store is not touched in that case.
    pub fn merge(&self, submitted: ServiceInformation) -> Result<Change> {
        let id = submitted.id();
        debug!(
            id = %id,
            processes = submitted.process_count(),
            endpoints = submitted.total_endpoint_count(),
            "Merging service information"
        );

        let mut entries = self.entries.write();
        let created = match entries.get(&id).cloned() {
            Some(mut stored) => {
                let report = stored.merge(&submitted)?;
                if report.change().is_unchanged() {
                    return Ok(Change::Unchanged);
                }
                debug!(
                    id = %id,
                    processes_added = report.processes_added.len(),
                    processes_removed = report.processes_removed.len(),
                    endpoints_added = report.endpoints_added.len(),
                    endpoints_removed = report.endpoints_removed.len(),
                    endpoints_updated = report.endpoints_updated.len(),
                    "Merge diff"
                );
                self.entries
                    .commit(&mut entries, Mutation::Update(stored.clone()))?;
                self.notify(entries, stored, false);
                return Ok(Change::Changed);
            }
            None => submitted,
        };
        self.entries
            .commit(&mut entries, Mutation::Create(created.clone()))?;
        self.notify(entries, created, true);
        Ok(Change::Changed)
    }

    /// Insert or overwrite a single endpoint, keeping all siblings
    ///
    /// Creates the service information and the process if needed. Concurrent
    /// calls with different transport profiles all survive.
    pub fn upsert_endpoint(
        &self,
        participant: &ParticipantId,
        document_type: &DocumentTypeId,
        process_id: &ProcessId,
        endpoint: Endpoint,
    ) -> Result<Change> {
        let id = document_key(participant, document_type);
        debug!(
            id = %id,
            process = %process_id,
            transport_profile = endpoint.transport_profile(),
            "Upserting endpoint"
        );

        let mut entries = self.entries.write();
        match entries.get(&id).cloned() {
            Some(mut stored) => {
                if stored.upsert_endpoint(process_id, endpoint).is_unchanged() {
                    return Ok(Change::Unchanged);
                }
                self.entries
                    .commit(&mut entries, Mutation::Update(stored.clone()))?;
                self.notify(entries, stored, false);
            }
            None => {
                let mut created =
                    ServiceInformation::new(participant.clone(), document_type.clone());
                created.upsert_endpoint(process_id, endpoint);
                self.entries
                    .commit(&mut entries, Mutation::Create(created.clone()))?;
                self.notify(entries, created, true);
            }
        }
        Ok(Change::Changed)
    }

    /// Release the write lock, then report a created or updated entry
    fn notify(
        &self,
        entries: RwLockWriteGuard<'_, EntityMap<ServiceInformation>>,
        info: ServiceInformation,
        created: bool,
    ) {
        drop(entries);
        if created {
            self.callbacks
                .for_each(|c| c.on_service_information_created(&info));
        } else {
            self.callbacks
                .for_each(|c| c.on_service_information_updated(&info));
        }
    }

    /// Report entries removed by an operation that has fully succeeded
    pub(crate) fn notify_deleted(&self, removed: &[ServiceInformation]) {
        for info in removed {
            self.callbacks
                .for_each(|c| c.on_service_information_deleted(info));
        }
    }

    /// Entry whose (participant, document type, process, transport profile)
    /// resolves all the way to an endpoint
    pub fn find(
        &self,
        participant: &ParticipantId,
        document_type: &DocumentTypeId,
        process_id: &ProcessId,
        transport_profile: &str,
    ) -> Option<ServiceInformation> {
        let entries = self.entries.read();
        let entry = Self::lookup(&entries, participant, document_type)?;
        entry.endpoint(process_id, transport_profile)?;
        Some(entry.clone())
    }

    /// Remove one entry
    pub fn delete(
        &self,
        participant: &ParticipantId,
        document_type: &DocumentTypeId,
    ) -> Result<Change> {
        match self.take(participant, document_type)? {
            Some(removed) => {
                self.notify_deleted(std::slice::from_ref(&removed));
                Ok(Change::Changed)
            }
            None => Ok(Change::Unchanged),
        }
    }

    /// Remove one entry, returning it; callbacks are left to the caller
    pub(crate) fn take(
        &self,
        participant: &ParticipantId,
        document_type: &DocumentTypeId,
    ) -> Result<Option<ServiceInformation>> {
        let id = document_key(participant, document_type);
        debug!(id = %id, "Deleting service information");

        let mut entries = self.entries.write();
        let removed = match entries.get(&id) {
            Some(si) => si.clone(),
            None => return Ok(None),
        };
        self.entries.commit(&mut entries, Mutation::Delete(id))?;
        Ok(Some(removed))
    }

    /// Remove every entry of a participant, returning the removed entries
    ///
    /// Nothing is removed if one of the deletes fails.
    pub fn delete_all_of_group(
        &self,
        participant: &ParticipantId,
    ) -> Result<Vec<ServiceInformation>> {
        let removed = self.take_all_of_group(participant)?;
        self.notify_deleted(&removed);
        Ok(removed)
    }

    /// [`delete_all_of_group`](Self::delete_all_of_group) without callbacks
    pub(crate) fn take_all_of_group(
        &self,
        participant: &ParticipantId,
    ) -> Result<Vec<ServiceInformation>> {
        debug!(participant = %participant, "Deleting all service information of group");
        let mut entries = self.entries.write();
        self.entries
            .delete_where(&mut entries, |si| si.participant().has_same_content(participant))
    }

    /// Remove one process (and its endpoints) from an entry
    ///
    /// `Unchanged` if the entry or the process does not exist.
    pub fn delete_process(
        &self,
        participant: &ParticipantId,
        document_type: &DocumentTypeId,
        process_id: &ProcessId,
    ) -> Result<Change> {
        let id = document_key(participant, document_type);
        debug!(id = %id, process = %process_id, "Deleting process");

        let mut entries = self.entries.write();
        let mut stored = match entries.get(&id) {
            Some(si) => si.clone(),
            None => return Ok(Change::Unchanged),
        };
        if stored.delete_process(process_id).is_unchanged() {
            return Ok(Change::Unchanged);
        }
        self.entries
            .commit(&mut entries, Mutation::Update(stored.clone()))?;
        self.notify(entries, stored, false);
        Ok(Change::Changed)
    }

    /// Re-create entries removed by a cascade that failed later on
    pub(crate) fn restore(&self, removed: Vec<ServiceInformation>) {
        if removed.is_empty() {
            return;
        }
        let mut entries = self.entries.write();
        self.entries.restore(&mut entries, removed);
    }

    /// Document types a participant has entries for
    pub fn get_all_document_types_of_group(
        &self,
        participant: &ParticipantId,
    ) -> Vec<DocumentTypeId> {
        let entries = self.entries.read();
        Self::of_participant(&entries, participant)
            .filter(|si| si.participant().has_same_content(participant))
            .map(|si| si.document_type().clone())
            .collect()
    }

    /// All entries of a participant
    pub fn get_all_of_group(&self, participant: &ParticipantId) -> Vec<ServiceInformation> {
        let entries = self.entries.read();
        Self::of_participant(&entries, participant)
            .filter(|si| si.participant().has_same_content(participant))
            .cloned()
            .collect()
    }

    /// Entry for a (participant, document type) pair
    pub fn get_of_group_and_doc_type(
        &self,
        participant: &ParticipantId,
        document_type: &DocumentTypeId,
    ) -> Option<ServiceInformation> {
        let entries = self.entries.read();
        Self::lookup(&entries, participant, document_type).cloned()
    }

    /// Entries whose key starts with the participant's URI
    ///
    /// Keys are `participant-document type`, so the range can also hold a
    /// participant whose value merely extends this one; callers filter.
    fn of_participant<'a>(
        entries: &'a EntityMap<ServiceInformation>,
        participant: &ParticipantId,
    ) -> impl Iterator<Item = &'a ServiceInformation> + 'a {
        let prefix = format!("{}-", participant.uri());
        entries
            .range(prefix.clone()..)
            .take_while(move |(key, _)| key.starts_with(&prefix))
            .map(|(_, si)| si)
    }

    fn lookup<'a>(
        entries: &'a EntityMap<ServiceInformation>,
        participant: &ParticipantId,
        document_type: &DocumentTypeId,
    ) -> Option<&'a ServiceInformation> {
        let exact = entries.get(&document_key(participant, document_type));
        let mut found = Self::of_participant(entries, participant)
            .filter(|si| si.matches(participant, document_type));
        let chosen = match exact {
            Some(si) => si,
            None => found.next()?,
        };
        let others = found.filter(|si| !std::ptr::eq(*si, chosen)).count();
        if others > 0 {
            warn!(
                participant = %participant,
                document_type = %document_type,
                matches = others + 1,
                chosen = %chosen.id(),
                "Found more than one service information entry, using the first"
            );
        }
        Some(chosen)
    }

    /// True if any endpoint of any entry uses `transport_profile`
    pub fn contains_any_endpoint_with_transport_profile(&self, transport_profile: &str) -> bool {
        self.entries
            .read()
            .values()
            .any(|si| si.contains_transport_profile(transport_profile))
    }

    /// Number of entries
    pub fn count(&self) -> usize {
        self.entries.read().len()
    }

    /// All entries, ordered by ID
    pub fn all(&self) -> Vec<ServiceInformation> {
        self.entries.read().values().cloned().collect()
    }

    /// Flush the underlying store
    pub fn flush(&self) -> Result<()> {
        self.entries.flush()
    }

    /// Name of the underlying store backend
    pub fn backend_name(&self) -> &'static str {
        self.entries.backend_name()
    }
}
