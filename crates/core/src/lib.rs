//! Core types for the SMP registry
//!
//! This crate defines the foundational types used throughout the system:
//! - Identifiers: ParticipantId, DocumentTypeId, ProcessId (`scheme::value`)
//! - Entity model: ServiceGroup, ServiceInformation, Process, Endpoint, Redirect,
//!   TransportProfile
//! - Merge: field-level reconciliation of service information trees
//! - Entity: trait giving every persisted entity a stable ID
//! - Change: outcome of a mutating operation
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod change;
pub mod entity;
pub mod error;
pub mod identifier;
pub mod model;

pub use change::Change;
pub use entity::{Entity, EntityKind};
pub use error::{BoxError, Error, Result};
pub use identifier::{
    DocumentTypeId, IdentifierError, ParticipantId, ProcessId, DEFAULT_DOCUMENT_TYPE_SCHEME,
    DEFAULT_PARTICIPANT_SCHEME, DEFAULT_PROCESS_SCHEME, URI_SEPARATOR,
};
pub use model::{
    document_key, Endpoint, EndpointRef, MergeReport, Process, Redirect, ServiceGroup,
    ServiceInformation, TransportProfile, TransportProfileState,
};
