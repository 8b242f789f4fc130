//! Service Group Manager
//!
//! Owns participant registration. Create and delete are two-phase: the
//! registration hook runs first, and if persisting fails afterwards the
//! hook's undo is invoked before the original error is returned. Delete
//! cascades to the participant's service information and redirects; the
//! cascade is reported to callbacks only once the whole delete succeeded.

use crate::audit::AuditSink;
use crate::auth::User;
use crate::callback::{CallbackList, ServiceGroupCallback};
use crate::collection::Collection;
use crate::hook::RegistrationHook;
use crate::redirect::RedirectManager;
use crate::service_information::ServiceInformationManager;
use smp_core::{
    Change, Entity, Error, ParticipantId, Redirect, Result, ServiceGroup, ServiceInformation,
};
use smp_durability::{ActionType, DurableStore, Mutation};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Manager of all [`ServiceGroup`] entries
pub struct ServiceGroupManager {
    groups: Collection<ServiceGroup>,
    service_information: Arc<ServiceInformationManager>,
    redirects: Arc<RedirectManager>,
    hook: Arc<dyn RegistrationHook>,
    callbacks: CallbackList<dyn ServiceGroupCallback>,
}

impl ServiceGroupManager {
    /// Load all groups from `store`
    ///
    /// `service_information` and `redirects` are the managers a delete
    /// cascades to.
    pub fn open(
        store: Arc<dyn DurableStore<ServiceGroup>>,
        service_information: Arc<ServiceInformationManager>,
        redirects: Arc<RedirectManager>,
        hook: Arc<dyn RegistrationHook>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self> {
        Ok(Self {
            groups: Collection::load(store, audit)?,
            service_information,
            redirects,
            hook,
            callbacks: CallbackList::new(),
        })
    }

    /// Observers notified of every stored change
    pub fn callbacks(&self) -> &CallbackList<dyn ServiceGroupCallback> {
        &self.callbacks
    }

    /// Register a new participant
    ///
    /// # Errors
    ///
    /// - `Error::Validation` if `owner_id` is blank
    /// - `Error::Duplicate` if the participant is already registered
    /// - `Error::Hook` if the registration hook refuses; nothing is stored
    /// - the store's error if persisting fails; the hook is undone first
    pub fn create(
        &self,
        owner_id: &str,
        participant: &ParticipantId,
        extension: Option<String>,
    ) -> Result<ServiceGroup> {
        let group = ServiceGroup::new(participant.clone(), owner_id).with_extension(extension);
        let id = group.id();
        debug!(id = %id, owner = owner_id, "Creating service group");

        if owner_id.trim().is_empty() {
            return Err(self.groups.reject(
                ActionType::Create,
                &id,
                Error::validation("service group owner must not be empty"),
            ));
        }

        let mut groups = self.groups.write();
        if groups.contains_key(&id) {
            return Err(self.groups.reject(
                ActionType::Create,
                &id,
                Error::Duplicate(format!("service group '{}' already exists", id)),
            ));
        }

        if let Err(e) = self.hook.create_service_group(participant) {
            return Err(self
                .groups
                .reject(ActionType::Create, &id, e.into_error(participant)));
        }

        if let Err(e) = self
            .groups
            .commit(&mut groups, Mutation::Create(group.clone()))
        {
            if let Err(undo) = self.hook.undo_create_service_group(participant) {
                error!(id = %id, error = %undo, "Failed to undo registration of service group");
            }
            return Err(e);
        }
        drop(groups);

        info!(id = %id, owner = owner_id, "Service group created");
        self.callbacks.for_each(|c| c.on_service_group_created(&group));
        Ok(group)
    }

    /// Change owner and extension
    ///
    /// `Unchanged` if the participant is unknown or nothing differs.
    pub fn update(
        &self,
        participant: &ParticipantId,
        owner_id: &str,
        extension: Option<String>,
    ) -> Result<Change> {
        let id = participant.uri();
        debug!(id = %id, owner = owner_id, "Updating service group");

        let mut groups = self.groups.write();
        let mut group = match groups.get(&id) {
            Some(g) => g.clone(),
            None => return Ok(Change::Unchanged),
        };
        let change = group
            .set_owner_id(owner_id)
            .or(group.set_extension(extension));
        if change.is_unchanged() {
            return Ok(Change::Unchanged);
        }
        self.groups.commit(&mut groups, Mutation::Update(group))?;
        drop(groups);
        self.callbacks
            .for_each(|c| c.on_service_group_updated(participant));
        Ok(Change::Changed)
    }

    /// Unregister a participant and everything it owns
    ///
    /// `Unchanged` if the participant is unknown. If a step after the hook
    /// fails, removed service information and redirects are restored and
    /// the hook is undone before the error is returned.
    pub fn delete(&self, participant: &ParticipantId) -> Result<Change> {
        let id = participant.uri();
        debug!(id = %id, "Deleting service group");

        let mut groups = self.groups.write();
        let group = match groups.get(&id) {
            Some(g) => g.clone(),
            None => return Ok(Change::Unchanged),
        };

        if let Err(e) = self.hook.delete_service_group(group.participant()) {
            return Err(self
                .groups
                .reject(ActionType::Delete, &id, e.into_error(group.participant())));
        }

        let result = self.delete_cascade(&group).and_then(|(infos, redirects)| {
            match self.groups.commit(&mut groups, Mutation::Delete(id.clone())) {
                Ok(()) => Ok((infos, redirects)),
                Err(e) => {
                    self.service_information.restore(infos);
                    self.redirects.restore(redirects);
                    Err(e)
                }
            }
        });

        let (infos, redirects) = match result {
            Ok(removed) => removed,
            Err(e) => {
                if let Err(undo) = self.hook.undo_delete_service_group(group.participant()) {
                    error!(id = %id, error = %undo, "Failed to undo unregistration of service group");
                }
                return Err(e);
            }
        };
        drop(groups);

        info!(id = %id, "Service group deleted");
        self.redirects.notify_deleted(&redirects);
        self.service_information.notify_deleted(&infos);
        self.callbacks
            .for_each(|c| c.on_service_group_deleted(group.participant()));
        Ok(Change::Changed)
    }

    fn delete_cascade(
        &self,
        group: &ServiceGroup,
    ) -> Result<(Vec<ServiceInformation>, Vec<Redirect>)> {
        let redirects = self.redirects.take_all_of_group(group.participant())?;
        match self
            .service_information
            .take_all_of_group(group.participant())
        {
            Ok(infos) => {
                debug!(
                    id = %group.id(),
                    service_information = infos.len(),
                    redirects = redirects.len(),
                    "Cascaded service group delete"
                );
                Ok((infos, redirects))
            }
            Err(e) => {
                self.redirects.restore(redirects);
                Err(e)
            }
        }
    }

    /// Resolve a participant and check that `user` owns it
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if the participant is not registered
    /// - `Error::Unauthorized` if it belongs to somebody else
    pub fn verify_ownership(&self, participant: &ParticipantId, user: &User) -> Result<ServiceGroup> {
        let group = self
            .get(participant)
            .ok_or_else(|| Error::NotFound(format!("service group '{}'", participant.uri())))?;
        if group.owner_id() != user.id() {
            return Err(Error::Unauthorized(format!(
                "user '{}' does not own service group '{}'",
                user.name(),
                group.id()
            )));
        }
        Ok(group)
    }

    /// Group of a participant
    pub fn get(&self, participant: &ParticipantId) -> Option<ServiceGroup> {
        self.groups.read().get(&participant.uri()).cloned()
    }

    /// True if the participant is registered
    pub fn contains(&self, participant: &ParticipantId) -> bool {
        self.groups.read().contains_key(&participant.uri())
    }

    /// Number of groups
    pub fn count(&self) -> usize {
        self.groups.read().len()
    }

    /// All groups, ordered by ID
    pub fn all(&self) -> Vec<ServiceGroup> {
        self.groups.read().values().cloned().collect()
    }

    /// IDs of all groups
    pub fn all_ids(&self) -> Vec<String> {
        self.groups.read().keys().cloned().collect()
    }

    /// All groups owned by `owner_id`
    pub fn all_of_owner(&self, owner_id: &str) -> Vec<ServiceGroup> {
        self.groups
            .read()
            .values()
            .filter(|g| g.owner_id() == owner_id)
            .cloned()
            .collect()
    }

    /// Number of groups owned by `owner_id`
    pub fn count_of_owner(&self, owner_id: &str) -> usize {
        self.groups
            .read()
            .values()
            .filter(|g| g.owner_id() == owner_id)
            .count()
    }

    /// Flush the underlying store
    pub fn flush(&self) -> Result<()> {
        self.groups.flush()
    }

    /// Name of the underlying store backend
    pub fn backend_name(&self) -> &'static str {
        self.groups.backend_name()
    }
}
