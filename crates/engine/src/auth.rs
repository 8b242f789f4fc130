//! User directory consumed by the ownership gate
//!
//! Account management lives outside the registry. The registry only needs
//! to turn credentials into a [`User`] and compare its ID with the owner
//! of a service group.

use smp_core::Result;
use std::fmt;

/// User name and password as received by the REST layer
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login name
    pub user_name: String,
    /// Clear text password
    pub password: String,
}

impl Credentials {
    /// Create credentials
    pub fn new(user_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_name", &self.user_name)
            .field("password", &"***")
            .finish()
    }
}

/// Authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
    id: String,
    name: String,
}

impl User {
    /// Create a user
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// ID compared against service group owners
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Source of user accounts
pub trait UserDirectory: Send + Sync {
    /// Resolve `credentials` to a user
    ///
    /// # Errors
    ///
    /// Returns `Error::Unauthorized` for unknown users and wrong passwords.
    fn validate_credentials(&self, credentials: &Credentials) -> Result<User>;
}
