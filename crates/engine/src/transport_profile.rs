//! Transport Profile Manager
//!
//! Keeps the list of transport profiles endpoints may reference. Profiles
//! are keyed by their exact ID; there is no case folding.

use crate::audit::AuditSink;
use crate::collection::Collection;
use smp_core::{Change, Error, Result, TransportProfile};
use smp_durability::{ActionType, DurableStore, Mutation};
use std::sync::Arc;
use tracing::{debug, info};

/// Manager of all [`TransportProfile`] entries
pub struct TransportProfileManager {
    profiles: Collection<TransportProfile>,
}

impl TransportProfileManager {
    /// Load all profiles from `store`
    pub fn open(
        store: Arc<dyn DurableStore<TransportProfile>>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self> {
        Ok(Self {
            profiles: Collection::load(store, audit)?,
        })
    }

    /// Add a profile
    ///
    /// # Errors
    ///
    /// - `Error::Validation` if the ID or name is malformed
    /// - `Error::Duplicate` if a profile with this ID exists
    pub fn create(&self, id: &str, name: &str, deprecated: bool) -> Result<TransportProfile> {
        debug!(id, name, deprecated, "Creating transport profile");
        let profile = match TransportProfile::new(id, name, deprecated) {
            Ok(p) => p,
            Err(e) => return Err(self.profiles.reject(ActionType::Create, id, e)),
        };

        let mut profiles = self.profiles.write();
        if profiles.contains_key(id) {
            return Err(self.profiles.reject(
                ActionType::Create,
                id,
                Error::Duplicate(format!("transport profile '{}' already exists", id)),
            ));
        }
        self.profiles
            .commit(&mut profiles, Mutation::Create(profile.clone()))?;
        info!(id, "Transport profile created");
        Ok(profile)
    }

    /// Rename and (un)deprecate a profile
    ///
    /// `Unchanged` if the profile is unknown or nothing differs.
    pub fn update(&self, id: &str, name: &str, deprecated: bool) -> Result<Change> {
        debug!(id, name, deprecated, "Updating transport profile");
        let mut profiles = self.profiles.write();
        let mut profile = match profiles.get(id) {
            Some(p) => p.clone(),
            None => return Ok(Change::Unchanged),
        };
        let change = match profile.set_name(name) {
            Ok(renamed) => renamed.or(profile.set_deprecated(deprecated)),
            Err(e) => return Err(self.profiles.reject(ActionType::Update, id, e)),
        };
        if change.is_unchanged() {
            return Ok(Change::Unchanged);
        }
        self.profiles.commit(&mut profiles, Mutation::Update(profile))?;
        Ok(Change::Changed)
    }

    /// Remove a profile
    ///
    /// Does not look at endpoints; the registry facade refuses to delete a
    /// profile that is still referenced.
    pub fn delete(&self, id: &str) -> Result<Change> {
        debug!(id, "Deleting transport profile");
        let mut profiles = self.profiles.write();
        if !profiles.contains_key(id) {
            return Ok(Change::Unchanged);
        }
        self.profiles
            .commit(&mut profiles, Mutation::Delete(id.to_string()))?;
        info!(id, "Transport profile deleted");
        Ok(Change::Changed)
    }

    /// Store the well-known profiles that are not present yet
    ///
    /// Returns how many were added.
    pub fn create_defaults(&self) -> Result<usize> {
        let mut profiles = self.profiles.write();
        let mut added = 0;
        for profile in TransportProfile::defaults() {
            if profiles.contains_key(profile.profile_id()) {
                continue;
            }
            self.profiles.commit(&mut profiles, Mutation::Create(profile))?;
            added += 1;
        }
        if added > 0 {
            info!(added, "Default transport profiles created");
        }
        Ok(added)
    }

    /// Profile with this ID
    pub fn get(&self, id: &str) -> Option<TransportProfile> {
        self.profiles.read().get(id).cloned()
    }

    /// True if a profile with this ID exists
    pub fn contains(&self, id: &str) -> bool {
        self.profiles.read().contains_key(id)
    }

    /// All profiles, ordered by ID
    pub fn all(&self) -> Vec<TransportProfile> {
        self.profiles.read().values().cloned().collect()
    }

    /// Number of profiles
    pub fn count(&self) -> usize {
        self.profiles.read().len()
    }

    /// Flush the underlying store
    pub fn flush(&self) -> Result<()> {
        self.profiles.flush()
    }

    /// Name of the underlying store backend
    pub fn backend_name(&self) -> &'static str {
        self.profiles.backend_name()
    }
}
