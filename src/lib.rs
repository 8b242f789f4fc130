//! SMP registry - Service Metadata Publisher registry
//!
//! Answers "which document types, processes and endpoints does this
//! participant support, or has it moved elsewhere?" and keeps that data
//! consistent under concurrent writers.
//!
//! # Quick Start
//!
//! ```ignore
//! use smp_registry::{Endpoint, ParticipantId, DocumentTypeId, ProcessId, SmpRegistry};
//!
//! let registry = SmpRegistry::open("/var/lib/smp")?;
//! let participant = ParticipantId::peppol("9915:test")?;
//! registry.service_groups().create("owner-1", &participant, None)?;
//!
//! registry.upsert_endpoint(
//!     &participant,
//!     &DocumentTypeId::peppol("urn:...::Invoice##...")?,
//!     &ProcessId::peppol("urn:fdc:peppol.eu:2017:poacc:billing:01:1.0")?,
//!     Endpoint::new("peppol-transport-as4-v2_0")?.with_endpoint_reference("https://ap.example.org/as4"),
//! )?;
//! ```
//!
//! # Architecture
//!
//! - `smp-core`: identifiers, entity model, merge, errors
//! - `smp-durability`: store contract, WAL + snapshot backend, SQL backend
//! - `smp-engine`: managers, callbacks, registration hook, audit,
//!   configuration, facade

pub use smp_core::{
    document_key, Change, DocumentTypeId, Endpoint, EndpointRef, Entity, EntityKind, Error,
    IdentifierError, MergeReport, ParticipantId, Process, ProcessId, Redirect, Result,
    ServiceGroup, ServiceInformation, TransportProfile, TransportProfileState,
    DEFAULT_DOCUMENT_TYPE_SCHEME, DEFAULT_PARTICIPANT_SCHEME,
    DEFAULT_PROCESS_SCHEME, URI_SEPARATOR,
};
#[cfg(feature = "sql")]
pub use smp_durability::{
    SqlBackend, SqlRedirectStore, SqlServiceGroupStore, SqlServiceInformationStore,
    SqlTransportProfileStore,
};
pub use smp_durability::{
    ActionType, DurabilityMode, DurableStore, MemoryStore, Mutation, RecoveryStats, WalState,
    WalStore, WalStoreConfig, DEFAULT_SNAPSHOT_THRESHOLD,
};
pub use smp_engine::*;
