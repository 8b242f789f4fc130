//! Registration hook: network-wide directory registration of participants
//!
//! The hook is called before a service group is persisted or removed. A
//! failing `create`/`delete` aborts the operation; the `undo_*` calls are
//! best-effort compensation after a later storage failure.

use smp_core::{Error, ParticipantId};
use thiserror::Error;

/// Failure reported by a [`RegistrationHook`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct HookError {
    /// What went wrong
    pub reason: String,
}

impl HookError {
    /// Create a hook error
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Convert into the registry error for `participant`
    pub fn into_error(self, participant: &ParticipantId) -> Error {
        Error::Hook {
            participant: participant.uri(),
            reason: self.reason,
        }
    }
}

/// External side effect of creating and deleting service groups
pub trait RegistrationHook: Send + Sync {
    /// Register `participant`; an error aborts the create
    fn create_service_group(&self, participant: &ParticipantId) -> Result<(), HookError>;

    /// Revert a successful `create_service_group`
    fn undo_create_service_group(&self, participant: &ParticipantId) -> Result<(), HookError>;

    /// Unregister `participant`; an error aborts the delete
    fn delete_service_group(&self, participant: &ParticipantId) -> Result<(), HookError>;

    /// Revert a successful `delete_service_group`
    fn undo_delete_service_group(&self, participant: &ParticipantId) -> Result<(), HookError>;
}

/// Hook for registries that are not attached to a network directory
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRegistrationHook;

impl RegistrationHook for NoopRegistrationHook {
    fn create_service_group(&self, _participant: &ParticipantId) -> Result<(), HookError> {
        Ok(())
    }

    fn undo_create_service_group(&self, _participant: &ParticipantId) -> Result<(), HookError> {
        Ok(())
    }

    fn delete_service_group(&self, _participant: &ParticipantId) -> Result<(), HookError> {
        Ok(())
    }

    fn undo_delete_service_group(&self, _participant: &ParticipantId) -> Result<(), HookError> {
        Ok(())
    }
}
