//! Reconciler error types.
//!
//! Every failure is scoped to one entity and carries the operation, the
//! entity kind and the ID or label it was working on.

use ipam_client::{IpamError, StatusClass};
use ipam_declarations::{DocumentError, ResourceKind, ValidationError};
use std::fmt;
use thiserror::Error;

/// What the engine was doing when an entity failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Plan,
    Create,
    Read,
    Update,
    Delete,
    Import,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Plan => "plan",
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Import => "import",
        })
    }
}

/// Errors that can occur while reconciling.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Malformed desired state, caught before any remote call
    #[error("{operation} {kind} {target}: {source}")]
    Validation {
        operation: Operation,
        kind: ResourceKind,
        target: String,
        source: ValidationError,
    },

    /// The service refused the request (4xx)
    #[error("{operation} {kind} {target}: rejected by service: {source}")]
    Remote {
        operation: Operation,
        kind: ResourceKind,
        target: String,
        source: IpamError,
    },

    /// Connection failure, timeout or 5xx
    #[error("{operation} {kind} {target}: transport failure: {source}")]
    Transport {
        operation: Operation,
        kind: ResourceKind,
        target: String,
        source: IpamError,
    },

    /// The request could not be built, or a successful answer could not be read
    #[error("{operation} {kind} {target}: {source}")]
    Client {
        operation: Operation,
        kind: ResourceKind,
        target: String,
        source: IpamError,
    },

    /// A name-based lookup did not find exactly one match
    #[error("{operation} {kind} {target}: expected exactly one match, found {matches}")]
    AmbiguousLookup {
        operation: Operation,
        kind: ResourceKind,
        target: String,
        matches: usize,
    },

    /// The service answered with something other than what was asked for
    #[error("{operation} {kind} {target}: requested {requested} but the service returned {returned} (id {id})")]
    Inconsistent {
        operation: Operation,
        kind: ResourceKind,
        target: String,
        id: String,
        requested: String,
        returned: String,
    },

    /// A document reference points at an entity with no recorded ID
    #[error("{kind} {label:?}: {reference} has no recorded ID")]
    UnresolvedReference {
        kind: ResourceKind,
        label: String,
        reference: String,
    },

    /// Reading or writing the state file failed
    #[error("state file {path}: {message}")]
    State { path: String, message: String },

    /// The desired-state document is malformed
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ReconcileError {
    /// Classify a client failure as a remote rejection, a transport failure
    /// or a local client failure.
    pub fn from_client(operation: Operation, kind: ResourceKind, target: impl Into<String>, source: IpamError) -> Self {
        let target = target.into();
        if matches!(
            source,
            IpamError::Decode { .. } | IpamError::Serialization(_) | IpamError::InvalidRequest(_)
        ) {
            Self::Client {
                operation,
                kind,
                target,
                source,
            }
        } else if source.is_transport() {
            Self::Transport {
                operation,
                kind,
                target,
                source,
            }
        } else {
            Self::Remote {
                operation,
                kind,
                target,
                source,
            }
        }
    }

    pub fn validation(operation: Operation, kind: ResourceKind, target: impl Into<String>, source: ValidationError) -> Self {
        Self::Validation {
            operation,
            kind,
            target: target.into(),
            source,
        }
    }

    /// Entity kind the error is about, when it is about one
    pub fn kind(&self) -> Option<ResourceKind> {
        match self {
            Self::Validation { kind, .. }
            | Self::Remote { kind, .. }
            | Self::Transport { kind, .. }
            | Self::Client { kind, .. }
            | Self::AmbiguousLookup { kind, .. }
            | Self::Inconsistent { kind, .. }
            | Self::UnresolvedReference { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// True when no remote call was made for the entity
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::UnresolvedReference { .. })
    }

    /// True for a 404 from the service
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Remote { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// 4xx or 5xx, for remote failures
    pub fn status_class(&self) -> Option<StatusClass> {
        match self {
            Self::Remote { source, .. } | Self::Transport { source, .. } => source.status_class(),
            _ => None,
        }
    }
}
