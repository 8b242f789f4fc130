//! Participant, document type and process identifiers
//!
//! Every identifier is a `(scheme, value)` pair with the URI-encoded form
//! `scheme::value`. The URI form is what the registry uses as a storage key,
//! so normalization happens once, at construction:
//!
//! - Schemes are lower-cased for all identifier kinds.
//! - Participant values are lower-cased as well, so `9915:XXX` and `9915:xxx`
//!   name the same participant.
//! - Document type and process values are kept verbatim.
//!
//! ## Validation
//!
//! - Scheme: 1-25 characters from `[A-Za-z0-9._-]`
//! - Value: non-empty, no control characters, bounded per kind
//!   (participant 50, process 200, document type 500)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator between scheme and value in the URI-encoded form
pub const URI_SEPARATOR: &str = "::";

/// Maximum length of an identifier scheme
pub const MAX_SCHEME_LENGTH: usize = 25;

/// Maximum length of a participant identifier value
pub const MAX_PARTICIPANT_VALUE_LENGTH: usize = 50;

/// Maximum length of a document type identifier value
pub const MAX_DOCUMENT_TYPE_VALUE_LENGTH: usize = 500;

/// Maximum length of a process identifier value
pub const MAX_PROCESS_VALUE_LENGTH: usize = 200;

/// Default Peppol participant identifier scheme
pub const DEFAULT_PARTICIPANT_SCHEME: &str = "iso6523-actorid-upis";

/// Default Peppol document type identifier scheme
pub const DEFAULT_DOCUMENT_TYPE_SCHEME: &str = "busdox-docid-qns";

/// Default Peppol process identifier scheme
pub const DEFAULT_PROCESS_SCHEME: &str = "cenbii-procid-ubl";

/// Error when validating an identifier
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentifierError {
    /// Scheme is empty
    #[error("identifier scheme cannot be empty")]
    EmptyScheme,
    /// Value is empty
    #[error("identifier value cannot be empty")]
    EmptyValue,
    /// Scheme exceeds maximum length
    #[error("identifier scheme too long: {length} chars (max {max})")]
    SchemeTooLong {
        /// Actual length of the scheme
        length: usize,
        /// Maximum allowed length
        max: usize,
    },
    /// Value exceeds maximum length
    #[error("identifier value too long: {length} chars (max {max})")]
    ValueTooLong {
        /// Actual length of the value
        length: usize,
        /// Maximum allowed length
        max: usize,
    },
    /// Scheme contains an invalid character
    #[error("invalid character '{char}' at position {position} in scheme (only alphanumeric, dash, underscore, dot allowed)")]
    InvalidSchemeChar {
        /// The invalid character
        char: char,
        /// Position of the invalid character
        position: usize,
    },
    /// Value contains a control character
    #[error("control character at position {position} in identifier value")]
    ControlChar {
        /// Position of the control character
        position: usize,
    },
    /// URI form without the `::` separator
    #[error("'{0}' is not of the form scheme::value")]
    MissingSeparator(String),
}

fn validate(scheme: &str, value: &str, max_value: usize) -> Result<(), IdentifierError> {
    if scheme.is_empty() {
        return Err(IdentifierError::EmptyScheme);
    }
    let scheme_len = scheme.chars().count();
    if scheme_len > MAX_SCHEME_LENGTH {
        return Err(IdentifierError::SchemeTooLong {
            length: scheme_len,
            max: MAX_SCHEME_LENGTH,
        });
    }
    for (position, ch) in scheme.chars().enumerate() {
        if !(ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.') {
            return Err(IdentifierError::InvalidSchemeChar { char: ch, position });
        }
    }

    if value.is_empty() {
        return Err(IdentifierError::EmptyValue);
    }
    let value_len = value.chars().count();
    if value_len > max_value {
        return Err(IdentifierError::ValueTooLong {
            length: value_len,
            max: max_value,
        });
    }
    if let Some(position) = value.chars().position(|c| c.is_control()) {
        return Err(IdentifierError::ControlChar { position });
    }
    Ok(())
}

macro_rules! identifier_type {
    (
        $(#[$meta:meta])*
        $name:ident, default_scheme = $default_scheme:expr, max_value = $max_value:expr, fold_value = $fold:expr
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name {
            scheme: String,
            value: String,
        }

        impl $name {
            /// Create a new identifier, validating and normalizing the input
            ///
            /// # Errors
            ///
            /// Returns `IdentifierError` if scheme or value is invalid.
            pub fn new(scheme: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self, IdentifierError> {
                let scheme = scheme.as_ref().to_ascii_lowercase();
                // Limits apply to the stored form, and folding can lengthen a value
                let value = if $fold {
                    value.as_ref().to_lowercase()
                } else {
                    value.as_ref().to_string()
                };
                validate(&scheme, &value, $max_value)?;
                Ok(Self { scheme, value })
            }

            /// Create an identifier in the default Peppol scheme
            pub fn peppol(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
                Self::new($default_scheme, value)
            }

            /// Parse the URI-encoded form `scheme::value`
            ///
            /// Splits on the first separator, so values may themselves contain `::`.
            pub fn parse_uri(uri: &str) -> Result<Self, IdentifierError> {
                let (scheme, value) = uri
                    .split_once(URI_SEPARATOR)
                    .ok_or_else(|| IdentifierError::MissingSeparator(uri.to_string()))?;
                Self::new(scheme, value)
            }

            /// Identifier scheme
            #[inline]
            pub fn scheme(&self) -> &str {
                &self.scheme
            }

            /// Identifier value
            #[inline]
            pub fn value(&self) -> &str {
                &self.value
            }

            /// URI-encoded form `scheme::value`
            pub fn uri(&self) -> String {
                format!("{}{}{}", self.scheme, URI_SEPARATOR, self.value)
            }

            /// Content equality under the identifier's comparison rules
            ///
            /// Unlike `==`, this also holds for records that were loaded from
            /// storage without passing through normalization.
            pub fn has_same_content(&self, other: &Self) -> bool {
                if !self.scheme.eq_ignore_ascii_case(&other.scheme) {
                    return false;
                }
                if $fold {
                    self.value.to_lowercase() == other.value.to_lowercase()
                } else {
                    self.value == other.value
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}{}", self.scheme, URI_SEPARATOR, self.value)
            }
        }

        impl FromStr for $name {
            type Err = IdentifierError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse_uri(s)
            }
        }
    };
}

identifier_type!(
    /// Identifies a participant (a registered business) on the network
    ///
    /// Comparison is case-insensitive: the value is lower-cased on construction.
    ParticipantId,
    default_scheme = DEFAULT_PARTICIPANT_SCHEME,
    max_value = MAX_PARTICIPANT_VALUE_LENGTH,
    fold_value = true
);

identifier_type!(
    /// Identifies a document type a participant can receive
    DocumentTypeId,
    default_scheme = DEFAULT_DOCUMENT_TYPE_SCHEME,
    max_value = MAX_DOCUMENT_TYPE_VALUE_LENGTH,
    fold_value = false
);

identifier_type!(
    /// Identifies a business process grouping endpoints
    ProcessId,
    default_scheme = DEFAULT_PROCESS_SCHEME,
    max_value = MAX_PROCESS_VALUE_LENGTH,
    fold_value = false
);
