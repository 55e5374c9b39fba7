//! Reserved block declaration and state
//!
//! The service only renames reserved blocks in place. `reason` is accepted
//! at creation and never again: a changed reason is refused at plan time
//! instead of drifting silently.

use crate::declaration::{Declaration, Fields, Observed};
use crate::schema::{ChangePolicy, FieldPresence, FieldSchema, ResourceKind, ResourceSchema};
use crate::validation::{Validate, ValidationError, valid_cidr};
use serde::{Deserialize, Serialize};

const KIND: ResourceKind = ResourceKind::ReservedBlock;

static SCHEMA: ResourceSchema = ResourceSchema {
    kind: KIND,
    fields: &[
        FieldSchema::id(),
        FieldSchema::new("name", FieldPresence::OptionalComputed, ChangePolicy::UpdateInPlace),
        FieldSchema::cidr("cidr", FieldPresence::Required, ChangePolicy::Replace),
        FieldSchema::new("reason", FieldPresence::OptionalComputed, ChangePolicy::Reject),
        FieldSchema::new("created_at", FieldPresence::Computed, ChangePolicy::Ignore),
    ],
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedBlockSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub cidr: String,

    /// Create-only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedBlockState {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub cidr: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// RFC 3339 timestamp assigned by the service
    pub created_at: String,
}

impl Validate for ReservedBlockSpec {
    fn validate(&self) -> Result<(), ValidationError> {
        valid_cidr(KIND, "cidr", &self.cidr)
    }
}

impl Observed for ReservedBlockState {
    fn id(&self) -> &str {
        &self.id
    }

    fn observed_fields(&self) -> Fields {
        vec![
            ("id", Some(self.id.clone())),
            ("name", self.name.clone()),
            ("cidr", Some(self.cidr.clone())),
            ("reason", self.reason.clone()),
            ("created_at", Some(self.created_at.clone())),
        ]
    }
}

impl Declaration for ReservedBlockSpec {
    type State = ReservedBlockState;

    const KIND: ResourceKind = KIND;

    fn schema() -> &'static ResourceSchema {
        &SCHEMA
    }

    fn desired_fields(&self) -> Fields {
        vec![
            ("name", self.name.clone()),
            ("cidr", Some(self.cidr.clone())),
            ("reason", self.reason.clone()),
        ]
    }

    fn from_observed(state: &ReservedBlockState) -> Self {
        Self {
            name: state.name.clone(),
            cidr: state.cidr.clone(),
            reason: state.reason.clone(),
        }
    }
}
