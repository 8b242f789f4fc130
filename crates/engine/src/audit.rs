//! Audit notifications
//!
//! Sinks are told about every mutation after its outcome is known. They
//! cannot influence the result.

use smp_core::{EntityKind, Error};
use smp_durability::ActionType;
use tracing::{info, warn};

/// Receiver of audit events
pub trait AuditSink: Send + Sync {
    /// An entity was created
    fn on_create(&self, kind: EntityKind, id: &str);

    /// An entity was modified
    fn on_update(&self, kind: EntityKind, id: &str);

    /// An entity was removed
    fn on_delete(&self, kind: EntityKind, id: &str);

    /// A mutation was rejected or failed
    fn on_failure(&self, kind: EntityKind, action: ActionType, id: &str, error: &Error);

    /// Dispatch a success to the matching `on_*` method
    fn on_success(&self, kind: EntityKind, action: ActionType, id: &str) {
        match action {
            ActionType::Create => self.on_create(kind, id),
            ActionType::Update => self.on_update(kind, id),
            ActionType::Delete => self.on_delete(kind, id),
        }
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn on_create(&self, _kind: EntityKind, _id: &str) {}
    fn on_update(&self, _kind: EntityKind, _id: &str) {}
    fn on_delete(&self, _kind: EntityKind, _id: &str) {}
    fn on_failure(&self, _kind: EntityKind, _action: ActionType, _id: &str, _error: &Error) {}
}

/// Emits events as `tracing` records on target `smp::audit`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn on_create(&self, kind: EntityKind, id: &str) {
        info!(target: "smp::audit", kind = %kind, id, action = "create", "audit");
    }

    fn on_update(&self, kind: EntityKind, id: &str) {
        info!(target: "smp::audit", kind = %kind, id, action = "update", "audit");
    }

    fn on_delete(&self, kind: EntityKind, id: &str) {
        info!(target: "smp::audit", kind = %kind, id, action = "delete", "audit");
    }

    fn on_failure(&self, kind: EntityKind, action: ActionType, id: &str, error: &Error) {
        warn!(
            target: "smp::audit",
            kind = %kind,
            id,
            action = %action,
            error = %error,
            "audit failure"
        );
    }
}
