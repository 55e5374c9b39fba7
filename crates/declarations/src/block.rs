//! Block declaration and state
//!
//! IP counts are decimal strings because an IPv6 block can hold more than
//! 2^64 addresses. [`IpCount`] keeps them as text and checks the
//! `total = used + available` identity with unbounded integers.

use crate::declaration::{Declaration, Fields, Observed};
use crate::schema::{ChangePolicy, FieldPresence, FieldSchema, ResourceKind, ResourceSchema};
use crate::validation::{Validate, ValidationError, non_empty, valid_cidr};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const KIND: ResourceKind = ResourceKind::Block;

static SCHEMA: ResourceSchema = ResourceSchema {
    kind: KIND,
    fields: &[
        FieldSchema::id(),
        FieldSchema::new("name", FieldPresence::Required, ChangePolicy::UpdateInPlace),
        FieldSchema::cidr("cidr", FieldPresence::Required, ChangePolicy::Replace),
        FieldSchema::new("environment_id", FieldPresence::Optional, ChangePolicy::UpdateInPlace),
        FieldSchema::new("pool_id", FieldPresence::Optional, ChangePolicy::UpdateInPlace),
        FieldSchema::new("total_ips", FieldPresence::Computed, ChangePolicy::Ignore),
        FieldSchema::new("used_ips", FieldPresence::Computed, ChangePolicy::Ignore),
        FieldSchema::new("available_ips", FieldPresence::Computed, ChangePolicy::Ignore),
    ],
};

/// Address count as reported by the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IpCount(String);

impl IpCount {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The count as an unbounded integer, `None` if it is not a plain
    /// non-negative decimal
    pub fn value(&self) -> Option<BigUint> {
        let s = self.0.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        BigUint::from_str(s).ok()
    }

    /// Sum of two counts, `None` if either side is not a number
    pub fn checked_add(&self, other: &IpCount) -> Option<IpCount> {
        Some(IpCount((self.value()? + other.value()?).to_string()))
    }
}

impl fmt::Display for IpCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// BlockSpec defines the desired state of a block, with its parents already
/// resolved to IDs. A block without an environment is orphaned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSpec {
    pub name: String,
    pub cidr: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockState {
    pub id: String,
    pub name: String,
    pub cidr: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_id: Option<String>,

    pub total_ips: IpCount,
    pub used_ips: IpCount,
    pub available_ips: IpCount,
}

impl BlockState {
    /// `total_ips == used_ips + available_ips`, compared exactly
    pub fn accounting_holds(&self) -> bool {
        match (self.used_ips.value(), self.available_ips.value(), self.total_ips.value()) {
            (Some(used), Some(available), Some(total)) => used + available == total,
            _ => false,
        }
    }
}

impl Validate for BlockSpec {
    fn validate(&self) -> Result<(), ValidationError> {
        non_empty(KIND, "name", &self.name)?;
        valid_cidr(KIND, "cidr", &self.cidr)
    }
}

impl Observed for BlockState {
    fn id(&self) -> &str {
        &self.id
    }

    fn observed_fields(&self) -> Fields {
        vec![
            ("id", Some(self.id.clone())),
            ("name", Some(self.name.clone())),
            ("cidr", Some(self.cidr.clone())),
            ("environment_id", self.environment_id.clone()),
            ("pool_id", self.pool_id.clone()),
            ("total_ips", Some(self.total_ips.to_string())),
            ("used_ips", Some(self.used_ips.to_string())),
            ("available_ips", Some(self.available_ips.to_string())),
        ]
    }
}

impl Declaration for BlockSpec {
    type State = BlockState;

    const KIND: ResourceKind = KIND;

    fn schema() -> &'static ResourceSchema {
        &SCHEMA
    }

    fn desired_fields(&self) -> Fields {
        vec![
            ("name", Some(self.name.clone())),
            ("cidr", Some(self.cidr.clone())),
            ("environment_id", self.environment_id.clone()),
            ("pool_id", self.pool_id.clone()),
        ]
    }

    fn from_observed(state: &BlockState) -> Self {
        Self {
            name: state.name.clone(),
            cidr: state.cidr.clone(),
            environment_id: state.environment_id.clone(),
            pool_id: state.pool_id.clone(),
        }
    }
}
