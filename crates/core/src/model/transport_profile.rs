//! Transport profile: a protocol endpoints can declare

use crate::change::Change;
use crate::entity::{Entity, EntityKind};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Whether new endpoints should still use a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportProfileState {
    /// In use
    Active,
    /// Kept for existing endpoints, not for new ones
    Deprecated,
}

impl TransportProfileState {
    /// State for a deprecation flag
    pub fn from_deprecated(deprecated: bool) -> Self {
        if deprecated {
            TransportProfileState::Deprecated
        } else {
            TransportProfileState::Active
        }
    }
}

/// A known transport profile, keyed by the ID endpoints reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportProfile {
    id: String,
    name: String,
    state: TransportProfileState,
}

/// Profiles a registry starts out with: (id, name, deprecated)
const DEFAULT_PROFILES: [(&str, &str, bool); 4] = [
    ("busdox-transport-start", "START", true),
    ("busdox-transport-as2-ver1p0", "AS2", false),
    ("busdox-transport-as2-ver2p0", "AS2 v2", false),
    ("peppol-transport-as4-v2_0", "Peppol AS4 v2", false),
];

impl TransportProfile {
    /// Create a profile
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the ID is blank or contains whitespace,
    /// or the name is blank.
    pub fn new(id: impl Into<String>, name: impl Into<String>, deprecated: bool) -> Result<Self> {
        let id = id.into();
        let name = name.into();
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(Error::validation(format!(
                "transport profile ID '{}' must be non-empty without whitespace",
                id
            )));
        }
        check_name(&name)?;
        Ok(Self {
            id,
            name,
            state: TransportProfileState::from_deprecated(deprecated),
        })
    }

    /// The well-known profiles
    pub fn defaults() -> Vec<TransportProfile> {
        DEFAULT_PROFILES
            .iter()
            .map(|(id, name, deprecated)| Self {
                id: id.to_string(),
                name: name.to_string(),
                state: TransportProfileState::from_deprecated(*deprecated),
            })
            .collect()
    }

    /// Profile ID, as used by endpoints
    #[inline]
    pub fn profile_id(&self) -> &str {
        &self.id
    }

    /// Display name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state
    #[inline]
    pub fn state(&self) -> TransportProfileState {
        self.state
    }

    /// True if the profile is deprecated
    pub fn is_deprecated(&self) -> bool {
        self.state == TransportProfileState::Deprecated
    }

    /// Rename
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the name is blank.
    pub fn set_name(&mut self, name: &str) -> Result<Change> {
        check_name(name)?;
        if self.name == name {
            return Ok(Change::Unchanged);
        }
        self.name = name.to_string();
        Ok(Change::Changed)
    }

    /// Mark as deprecated or active again
    pub fn set_deprecated(&mut self, deprecated: bool) -> Change {
        let state = TransportProfileState::from_deprecated(deprecated);
        if self.state == state {
            return Change::Unchanged;
        }
        self.state = state;
        Change::Changed
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation("transport profile name must not be empty"));
    }
    Ok(())
}

impl Entity for TransportProfile {
    const KIND: EntityKind = EntityKind::TransportProfile;

    fn id(&self) -> String {
        self.id.clone()
    }
}
