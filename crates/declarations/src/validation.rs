//! Local validation
//!
//! Checks that need nothing but the declaration itself. They run before any
//! remote call; containment and overlap are left to the service.

use crate::cidr::parse_cidr;
use crate::schema::ResourceKind;
use thiserror::Error;

/// A malformed declaration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{kind}: {field} is required")]
    Missing { kind: ResourceKind, field: &'static str },

    #[error("{kind}: {field} must not be empty")]
    Empty { kind: ResourceKind, field: &'static str },

    #[error("{kind}: {field} {value:?} is not a valid CIDR")]
    InvalidCidr {
        kind: ResourceKind,
        field: &'static str,
        value: String,
    },

    #[error("{kind}: {first} and {second} are mutually exclusive")]
    Conflicting {
        kind: ResourceKind,
        first: &'static str,
        second: &'static str,
    },

    #[error("{kind}: one of {first} or {second} is required")]
    MissingOneOf {
        kind: ResourceKind,
        first: &'static str,
        second: &'static str,
    },

    #[error("{kind}: prefix_length {value} is out of range (0-128)")]
    PrefixLength { kind: ResourceKind, value: u8 },

    #[error("{kind}: {field} cannot be changed after creation ({from:?} -> {to:?})")]
    Immutable {
        kind: ResourceKind,
        field: &'static str,
        from: Option<String>,
        to: Option<String>,
    },
}

/// Local, synchronous checks on a declaration
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Reject an empty (after trimming) string
pub fn non_empty(kind: ResourceKind, field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Empty { kind, field })
    } else {
        Ok(())
    }
}

/// Reject an empty or unparsable CIDR
pub fn valid_cidr(kind: ResourceKind, field: &'static str, value: &str) -> Result<(), ValidationError> {
    non_empty(kind, field, value)?;
    match parse_cidr(value) {
        Some(_) => Ok(()),
        None => Err(ValidationError::InvalidCidr {
            kind,
            field,
            value: value.to_string(),
        }),
    }
}
