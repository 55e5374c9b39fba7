//! Desired-state document
//!
//! A YAML file with one map per kind, keyed by an operator-chosen label.
//! Labels are local to the document; the service never sees them.
//!
//! ```yaml
//! environments:
//!   prod:
//!     name: prod
//!     pools:
//!       - {name: prod-main, cidr: 10.0.0.0/8}
//! blocks:
//!   edge:
//!     name: edge
//!     cidr: 10.1.100.0/24
//!     environment: {environment: prod}
//!     pool: {environment: prod, pool_index: 0}
//! allocations:
//!   web:
//!     name: web
//!     block_name: edge
//!     prefix_length: 26
//! ```

use crate::allocation::AllocationSpec;
use crate::environment::EnvironmentSpec;
use crate::references::IdRef;
use crate::reserved_block::ReservedBlockSpec;
use crate::schema::ResourceKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Errors in the document as a whole
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid desired-state document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{kind} {label:?} references {reference}, which is not declared")]
    UnknownReference {
        kind: ResourceKind,
        label: String,
        reference: String,
    },

    #[error("allocations {first:?} and {second:?} both declare {name:?} in block {block:?}")]
    DuplicateAllocation {
        first: String,
        second: String,
        name: String,
        block: String,
    },
}

/// A pool as written in the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDocument {
    pub environment: IdRef,
    pub name: String,
    pub cidr: String,
}

/// A block as written in the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDocument {
    pub name: String,
    pub cidr: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<IdRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<IdRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesiredState {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environments: BTreeMap<String, EnvironmentSpec>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pools: BTreeMap<String, PoolDocument>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, BlockDocument>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub allocations: BTreeMap<String, AllocationSpec>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reserved_blocks: BTreeMap<String, ReservedBlockSpec>,
}

impl DesiredState {
    /// Parse a document and check its cross references
    pub fn from_yaml(text: &str) -> Result<Self, DocumentError> {
        // An empty file is an empty document
        let state: DesiredState = if text.trim().is_empty() {
            DesiredState::default()
        } else {
            serde_yaml::from_str(text)?
        };
        state.check_references()?;
        Ok(state)
    }

    pub fn to_yaml(&self) -> Result<String, DocumentError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Labels declared for `kind`
    pub fn labels(&self, kind: ResourceKind) -> Vec<&str> {
        match kind {
            ResourceKind::Environment => self.environments.keys().map(String::as_str).collect(),
            ResourceKind::Pool => self.pools.keys().map(String::as_str).collect(),
            ResourceKind::Block => self.blocks.keys().map(String::as_str).collect(),
            ResourceKind::Allocation => self.allocations.keys().map(String::as_str).collect(),
            ResourceKind::ReservedBlock => self.reserved_blocks.keys().map(String::as_str).collect(),
        }
    }

    pub fn contains(&self, kind: ResourceKind, label: &str) -> bool {
        match kind {
            ResourceKind::Environment => self.environments.contains_key(label),
            ResourceKind::Pool => self.pools.contains_key(label),
            ResourceKind::Block => self.blocks.contains_key(label),
            ResourceKind::Allocation => self.allocations.contains_key(label),
            ResourceKind::ReservedBlock => self.reserved_blocks.contains_key(label),
        }
    }

    fn check_ref(&self, kind: ResourceKind, label: &str, reference: &IdRef) -> Result<(), DocumentError> {
        let declared = match reference {
            IdRef::Environment { environment } | IdRef::EnvironmentPool { environment, .. } => {
                self.environments.contains_key(environment)
            }
            IdRef::Pool { pool } => self.pools.contains_key(pool),
            IdRef::Id(_) => true,
        };
        if declared {
            Ok(())
        } else {
            Err(DocumentError::UnknownReference {
                kind,
                label: label.to_string(),
                reference: reference.to_string(),
            })
        }
    }

    /// Every label reference points at a declared entry, and no two
    /// allocations share a natural key
    pub fn check_references(&self) -> Result<(), DocumentError> {
        for (label, pool) in &self.pools {
            self.check_ref(ResourceKind::Pool, label, &pool.environment)?;
        }
        for (label, block) in &self.blocks {
            for reference in block.environment.iter().chain(block.pool.iter()) {
                self.check_ref(ResourceKind::Block, label, reference)?;
            }
        }

        let mut seen: BTreeMap<(&str, &str), &str> = BTreeMap::new();
        for (label, allocation) in &self.allocations {
            let key = (allocation.block.as_str(), allocation.name.as_str());
            if let Some(first) = seen.insert(key, label.as_str()) {
                return Err(DocumentError::DuplicateAllocation {
                    first: first.to_string(),
                    second: label.clone(),
                    name: allocation.name.clone(),
                    block: allocation.block.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Block names declared in this document
    pub fn block_names(&self) -> HashSet<&str> {
        self.blocks.values().map(|b| b.name.as_str()).collect()
    }
}
