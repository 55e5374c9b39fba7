//! Environment declaration and state
//!
//! An environment is created together with its seed pools. After creation
//! the seed list is informational: pools are managed as pool entities and
//! edits to `pools` are ignored.

use crate::declaration::{Declaration, Fields, Observed};
use crate::schema::{ChangePolicy, FieldPresence, FieldSchema, ResourceKind, ResourceSchema};
use crate::validation::{Validate, ValidationError, non_empty, valid_cidr};
use serde::{Deserialize, Serialize};

const KIND: ResourceKind = ResourceKind::Environment;

static SCHEMA: ResourceSchema = ResourceSchema {
    kind: KIND,
    fields: &[
        FieldSchema::id(),
        FieldSchema::new("name", FieldPresence::Required, ChangePolicy::UpdateInPlace),
        FieldSchema::new("pools", FieldPresence::Required, ChangePolicy::Ignore),
        FieldSchema::new("pool_ids", FieldPresence::Computed, ChangePolicy::Ignore),
    ],
};

/// One pool supplied when the environment is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSeed {
    pub name: String,
    pub cidr: String,
}

/// EnvironmentSpec defines the desired state of an environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    pub name: String,

    /// Seed pools, at least one. Only used at creation.
    pub pools: Vec<PoolSeed>,
}

/// EnvironmentState is the recorded state of an environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentState {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub pools: Vec<PoolSeed>,

    /// Pool IDs in seed order. The rename response does not carry them, so
    /// they are copied forward across updates.
    #[serde(default)]
    pub pool_ids: Vec<String>,
}

fn render_pools(pools: &[PoolSeed]) -> String {
    pools
        .iter()
        .map(|p| format!("{}={}", p.name, crate::cidr::canonical_cidr(&p.cidr)))
        .collect::<Vec<_>>()
        .join(",")
}

impl Validate for EnvironmentSpec {
    fn validate(&self) -> Result<(), ValidationError> {
        non_empty(KIND, "name", &self.name)?;
        if self.pools.is_empty() {
            return Err(ValidationError::Missing { kind: KIND, field: "pools" });
        }
        for pool in &self.pools {
            non_empty(KIND, "pools.name", &pool.name)?;
            valid_cidr(KIND, "pools.cidr", &pool.cidr)?;
        }
        Ok(())
    }
}

impl Observed for EnvironmentState {
    fn id(&self) -> &str {
        &self.id
    }

    fn observed_fields(&self) -> Fields {
        vec![
            ("id", Some(self.id.clone())),
            ("name", Some(self.name.clone())),
            ("pools", Some(render_pools(&self.pools))),
            ("pool_ids", Some(self.pool_ids.join(","))),
        ]
    }
}

impl Declaration for EnvironmentSpec {
    type State = EnvironmentState;

    const KIND: ResourceKind = KIND;

    fn schema() -> &'static ResourceSchema {
        &SCHEMA
    }

    fn desired_fields(&self) -> Fields {
        vec![
            ("name", Some(self.name.clone())),
            ("pools", Some(render_pools(&self.pools))),
        ]
    }

    fn from_observed(state: &EnvironmentState) -> Self {
        Self {
            name: state.name.clone(),
            pools: state.pools.clone(),
        }
    }
}
