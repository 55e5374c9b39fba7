//! References between declarations
//!
//! Pools and blocks point at their parents by ID. In a desired-state
//! document the ID is usually not known yet, so those fields take an
//! [`IdRef`] that the controller resolves against recorded state.
//!
//! Allocations are the exception: they name their block with a
//! [`BlockNameRef`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Weak reference from an allocation to its block, by block name.
///
/// The service resolves it; the reconciler never owns or follows it. It is
/// part of the allocation's natural key together with the allocation name.
///
/// Known rough edge: although an allocation can be looked up by its
/// `(name, block_name)` pair, importing one still requires its ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockNameRef(String);

impl BlockNameRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockNameRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockNameRef {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// A parent ID in a desired-state document: literal, or by label
///
/// ```yaml
/// environment: 0d7c5e6a-...          # literal ID
/// environment: {environment: prod}   # the ID of environment "prod"
/// pool: {environment: prod, pool_index: 0}  # prod's first seed pool
/// pool: {pool: prod-extra}           # the ID of pool "prod-extra"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdRef {
    // Must stay ahead of `Environment`, which would otherwise match first
    EnvironmentPool { environment: String, pool_index: usize },
    Environment { environment: String },
    Pool { pool: String },
    Id(String),
}

impl IdRef {
    /// Label of the document entry this reference depends on, if any
    pub fn dependency(&self) -> Option<&str> {
        match self {
            IdRef::EnvironmentPool { environment, .. } | IdRef::Environment { environment } => Some(environment),
            IdRef::Pool { pool } => Some(pool),
            IdRef::Id(_) => None,
        }
    }
}

impl fmt::Display for IdRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdRef::EnvironmentPool { environment, pool_index } => {
                write!(f, "environment {environment:?} pool #{pool_index}")
            }
            IdRef::Environment { environment } => write!(f, "environment {environment:?}"),
            IdRef::Pool { pool } => write!(f, "pool {pool:?}"),
            IdRef::Id(id) => f.write_str(id),
        }
    }
}
