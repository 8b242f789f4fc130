//! Redirect Manager
//!
//! A redirect replaces as a unit: target, certificate data and extension
//! are overwritten together on update.

use crate::audit::AuditSink;
use crate::callback::{CallbackList, RedirectCallback};
use crate::collection::Collection;
use smp_core::{
    document_key, Change, DocumentTypeId, Entity, ParticipantId, Redirect, Result,
};
use smp_durability::{DurableStore, Mutation};
use std::sync::Arc;
use tracing::debug;

/// Manager of all [`Redirect`] entries
pub struct RedirectManager {
    redirects: Collection<Redirect>,
    callbacks: CallbackList<dyn RedirectCallback>,
}

impl RedirectManager {
    /// Load all redirects from `store`
    pub fn open(store: Arc<dyn DurableStore<Redirect>>, audit: Arc<dyn AuditSink>) -> Result<Self> {
        Ok(Self {
            redirects: Collection::load(store, audit)?,
            callbacks: CallbackList::new(),
        })
    }

    /// Observers notified of every stored change
    pub fn callbacks(&self) -> &CallbackList<dyn RedirectCallback> {
        &self.callbacks
    }

    /// Create a redirect or overwrite the one for the same pair
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if `target_href` is blank.
    pub fn create_or_update(
        &self,
        participant: &ParticipantId,
        document_type: &DocumentTypeId,
        target_href: &str,
        subject_unique_identifier: &str,
        certificate: Option<String>,
        extension: Option<String>,
    ) -> Result<Redirect> {
        let submitted = Redirect::new(
            participant.clone(),
            document_type.clone(),
            target_href,
            subject_unique_identifier,
        )?
        .with_certificate(certificate)
        .with_extension(extension);
        let id = submitted.id();
        debug!(id = %id, target = target_href, "Creating or updating redirect");

        let mut redirects = self.redirects.write();
        match redirects.get(&id).cloned() {
            Some(mut stored) => {
                if stored.update_from(&submitted).is_changed() {
                    self.redirects
                        .commit(&mut redirects, Mutation::Update(stored.clone()))?;
                    drop(redirects);
                    self.callbacks.for_each(|c| c.on_redirect_updated(&stored));
                }
                Ok(stored)
            }
            None => {
                self.redirects
                    .commit(&mut redirects, Mutation::Create(submitted.clone()))?;
                drop(redirects);
                self.callbacks.for_each(|c| c.on_redirect_created(&submitted));
                Ok(submitted)
            }
        }
    }

    /// Remove the redirect for a pair
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

    /// Report redirects removed by an operation that has fully succeeded
    pub(crate) fn notify_deleted(&self, removed: &[Redirect]) {
        for redirect in removed {
            self.callbacks.for_each(|c| c.on_redirect_deleted(redirect));
        }
    }

    /// Remove the redirect for a pair, returning it; callbacks are left to
    /// the caller
    pub(crate) fn take(
        &self,
        participant: &ParticipantId,
        document_type: &DocumentTypeId,
    ) -> Result<Option<Redirect>> {
        let id = document_key(participant, document_type);
        debug!(id = %id, "Deleting redirect");

        let mut redirects = self.redirects.write();
        let removed = match redirects.get(&id) {
            Some(r) => r.clone(),
            None => return Ok(None),
        };
        self.redirects
            .commit(&mut redirects, Mutation::Delete(id))?;
        Ok(Some(removed))
    }

    /// Remove every redirect of a participant, returning the removed ones
    ///
    /// Nothing is removed if one of the deletes fails.
    pub fn delete_all_of_group(&self, participant: &ParticipantId) -> Result<Vec<Redirect>> {
        let removed = self.take_all_of_group(participant)?;
        self.notify_deleted(&removed);
        Ok(removed)
    }

    /// [`delete_all_of_group`](Self::delete_all_of_group) without callbacks
    pub(crate) fn take_all_of_group(&self, participant: &ParticipantId) -> Result<Vec<Redirect>> {
        debug!(participant = %participant, "Deleting all redirects of group");
        let mut redirects = self.redirects.write();
        self.redirects
            .delete_where(&mut redirects, |r| r.participant().has_same_content(participant))
    }

    /// Re-create redirects removed by an operation that failed later on
    pub(crate) fn restore(&self, removed: Vec<Redirect>) {
        if removed.is_empty() {
            return;
        }
        let mut redirects = self.redirects.write();
        self.redirects.restore(&mut redirects, removed);
    }

    /// Redirect for a (participant, document type) pair
    pub fn get_of_group_and_doc_type(
        &self,
        participant: &ParticipantId,
        document_type: &DocumentTypeId,
    ) -> Option<Redirect> {
        self.redirects
            .read()
            .get(&document_key(participant, document_type))
            .cloned()
    }

    /// All redirects of a participant
    pub fn get_all_of_group(&self, participant: &ParticipantId) -> Vec<Redirect> {
        self.redirects
            .read()
            .values()
            .filter(|r| r.participant().has_same_content(participant))
            .cloned()
            .collect()
    }

    /// All redirects, ordered by ID
    pub fn all(&self) -> Vec<Redirect> {
        self.redirects.read().values().cloned().collect()
    }

    /// Number of redirects
    pub fn count(&self) -> usize {
        self.redirects.read().len()
    }

    /// Flush the underlying store
    pub fn flush(&self) -> Result<()> {
        self.redirects.flush()
    }
}
