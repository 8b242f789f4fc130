//! Error types for the registry
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! The variants fall into two groups:
//! - Caller-visible failures (`NotFound`, `Unauthorized`, `Duplicate`,
//!   `Validation`) that the REST layer maps to a 4xx response.
//! - Infrastructure failures (`Storage`, `IoError`, `SerializationError`,
//!   `Corruption`, `IncompleteEntry`, `Hook`) that map to a 5xx response.

use crate::identifier::IdentifierError;
use std::io;
use thiserror::Error;

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error used to carry the underlying cause of a storage failure
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error types for the registry
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown participant, document type or other entity
    #[error("Not found: {0}")]
    NotFound(String),

    /// Ownership mismatch or bad credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Create on an ID that already exists
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Input failed validation (identifier syntax, mismatched IDs, ...)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Durable store failure, carrying the underlying cause when there is one
    #[error("Storage error: {message}")]
    Storage {
        /// What the store was doing
        message: String,
        /// Underlying cause
        #[source]
        source: Option<BoxError>,
    },

    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Data corruption detected in a log or snapshot
    #[error("Data corruption at offset {offset}: {reason}")]
    Corruption {
        /// Byte offset of the damaged record
        offset: u64,
        /// What was wrong with it
        reason: String,
    },

    /// A log record was cut short (partial write at the tail)
    #[error("Incomplete entry at offset {offset}: have {have} bytes, need {needed}")]
    IncompleteEntry {
        /// Byte offset of the record
        offset: u64,
        /// Bytes available
        have: usize,
        /// Bytes required
        needed: usize,
    },

    /// The external registration hook rejected the operation
    #[error("Registration hook failed for '{participant}': {reason}")]
    Hook {
        /// Participant URI the hook was called for
        participant: String,
        /// Reason reported by the hook
        reason: String,
    },
}

impl Error {
    /// Storage failure without an underlying cause
    pub fn storage(message: impl Into<String>) -> Self {
        Error::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Storage failure wrapping its cause
    pub fn storage_caused<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Storage {
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// Validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// True for `NotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// True for `Unauthorized`
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized(_))
    }

    /// True for `Duplicate`
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Error::Duplicate(_))
    }

    /// True for `Validation`
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// True for errors the caller caused (4xx-equivalent)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_) | Error::Unauthorized(_) | Error::Duplicate(_) | Error::Validation(_)
        )
    }
}

impl From<IdentifierError> for Error {
    fn from(e: IdentifierError) -> Self {
        Error::Validation(e.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::SerializationError(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::SerializationError(e.to_string())
    }
}
