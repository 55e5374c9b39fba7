//! Pool declaration and state

use crate::declaration::{Declaration, Fields, Observed};
use crate::schema::{ChangePolicy, FieldPresence, FieldSchema, ResourceKind, ResourceSchema};
use crate::validation::{Validate, ValidationError, non_empty, valid_cidr};
use serde::{Deserialize, Serialize};

const KIND: ResourceKind = ResourceKind::Pool;

static SCHEMA: ResourceSchema = ResourceSchema {
    kind: KIND,
    fields: &[
        FieldSchema::id(),
        FieldSchema::new("environment_id", FieldPresence::Required, ChangePolicy::Replace),
        FieldSchema::new("name", FieldPresence::Required, ChangePolicy::UpdateInPlace),
        FieldSchema::cidr("cidr", FieldPresence::Required, ChangePolicy::UpdateInPlace),
    ],
};

/// PoolSpec defines the desired state of a pool, with its environment
/// already resolved to an ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSpec {
    pub environment_id: String,
    pub name: String,
    pub cidr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    pub id: String,
    pub environment_id: String,
    pub name: String,
    pub cidr: String,
}

impl Validate for PoolSpec {
    fn validate(&self) -> Result<(), ValidationError> {
        non_empty(KIND, "environment_id", &self.environment_id)?;
        non_empty(KIND, "name", &self.name)?;
        valid_cidr(KIND, "cidr", &self.cidr)
    }
}

impl Observed for PoolState {
    fn id(&self) -> &str {
        &self.id
    }

    fn observed_fields(&self) -> Fields {
        vec![
            ("id", Some(self.id.clone())),
            ("environment_id", Some(self.environment_id.clone())),
            ("name", Some(self.name.clone())),
            ("cidr", Some(self.cidr.clone())),
        ]
    }
}

impl Declaration for PoolSpec {
    type State = PoolState;

    const KIND: ResourceKind = KIND;

    fn schema() -> &'static ResourceSchema {
        &SCHEMA
    }

    fn desired_fields(&self) -> Fields {
        vec![
            ("environment_id", Some(self.environment_id.clone())),
            ("name", Some(self.name.clone())),
            ("cidr", Some(self.cidr.clone())),
        ]
    }

    fn from_observed(state: &PoolState) -> Self {
        Self {
            environment_id: state.environment_id.clone(),
            name: state.name.clone(),
            cidr: state.cidr.clone(),
        }
    }
}
