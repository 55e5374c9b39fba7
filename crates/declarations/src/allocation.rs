//! Allocation declaration and state
//!
//! An allocation is declared in one of two modes: an explicit `cidr`, or a
//! `prefix_length` the service satisfies from the block's free space. In
//! auto mode the returned CIDR is pinned into state. The requested prefix
//! length is kept alongside it and only ever acts as a replace trigger.

use crate::cidr::{prefix_len, same_cidr};
use crate::declaration::{Declaration, Fields, Observed};
use crate::references::BlockNameRef;
use crate::schema::{
    ChangePolicy, ChangeSet, FieldChange, FieldPresence, FieldSchema, ResourceKind, ResourceSchema, diff_fields,
};
use crate::validation::{Validate, ValidationError, non_empty, valid_cidr};
use serde::{Deserialize, Serialize};

const KIND: ResourceKind = ResourceKind::Allocation;

/// Largest prefix length of any address family
pub const MAX_PREFIX_LENGTH: u8 = 128;

static SCHEMA: ResourceSchema = ResourceSchema {
    kind: KIND,
    fields: &[
        FieldSchema::id(),
        FieldSchema::new("name", FieldPresence::Required, ChangePolicy::UpdateInPlace),
        FieldSchema::new("block_name", FieldPresence::Required, ChangePolicy::Replace),
        FieldSchema::cidr("cidr", FieldPresence::OptionalComputed, ChangePolicy::Replace),
        FieldSchema::new("prefix_length", FieldPresence::Optional, ChangePolicy::Replace),
    ],
};

/// How an allocation gets its CIDR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationMode<'a> {
    Explicit(&'a str),
    Auto(u8),
}

/// AllocationSpec defines the desired state of an allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSpec {
    pub name: String,

    #[serde(rename = "block_name")]
    pub block: BlockNameRef,

    /// Explicit CIDR; mutually exclusive with `prefix_length`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,

    /// Size to auto-allocate; mutually exclusive with `cidr`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_length: Option<u8>,
}

impl AllocationSpec {
    /// The creation mode, once validated
    pub fn mode(&self) -> Result<AllocationMode<'_>, ValidationError> {
        match (self.cidr.as_deref(), self.prefix_length) {
            (Some(_), Some(_)) => Err(ValidationError::Conflicting {
                kind: KIND,
                first: "cidr",
                second: "prefix_length",
            }),
            (None, None) => Err(ValidationError::MissingOneOf {
                kind: KIND,
                first: "cidr",
                second: "prefix_length",
            }),
            (Some(cidr), None) => Ok(AllocationMode::Explicit(cidr)),
            (None, Some(len)) => Ok(AllocationMode::Auto(len)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationState {
    pub id: String,
    pub name: String,
    pub block_name: BlockNameRef,
    pub cidr: String,

    /// Prefix length requested at creation, for auto-mode allocations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_length: Option<u8>,
}

impl Validate for AllocationSpec {
    fn validate(&self) -> Result<(), ValidationError> {
        non_empty(KIND, "name", &self.name)?;
        non_empty(KIND, "block_name", self.block.as_str())?;
        match self.mode()? {
            AllocationMode::Explicit(cidr) => valid_cidr(KIND, "cidr", cidr),
            AllocationMode::Auto(len) if len > MAX_PREFIX_LENGTH => {
                Err(ValidationError::PrefixLength { kind: KIND, value: len })
            }
            AllocationMode::Auto(_) => Ok(()),
        }
    }
}

impl Observed for AllocationState {
    fn id(&self) -> &str {
        &self.id
    }

    fn observed_fields(&self) -> Fields {
        vec![
            ("id", Some(self.id.clone())),
            ("name", Some(self.name.clone())),
            ("block_name", Some(self.block_name.to_string())),
            ("cidr", Some(self.cidr.clone())),
            ("prefix_length", self.prefix_length.map(|p| p.to_string())),
        ]
    }
}

impl Declaration for AllocationSpec {
    type State = AllocationState;

    const KIND: ResourceKind = KIND;

    fn schema() -> &'static ResourceSchema {
        &SCHEMA
    }

    fn desired_fields(&self) -> Fields {
        vec![
            ("name", Some(self.name.clone())),
            ("block_name", Some(self.block.to_string())),
            ("cidr", self.cidr.clone()),
            ("prefix_length", self.prefix_length.map(|p| p.to_string())),
        ]
    }

    /// Name and block are diffed from the schema. The CIDR/prefix pair is
    /// compared as a network: switching modes while naming the same network
    /// is not a change.
    fn changes_against(&self, state: &AllocationState) -> ChangeSet {
        let identity = |fields: Fields| -> Fields {
            fields
                .into_iter()
                .filter(|(name, _)| matches!(*name, "name" | "block_name"))
                .collect()
        };
        let mut set = diff_fields(
            &SCHEMA,
            &identity(self.desired_fields()),
            &identity(state.observed_fields()),
        );

        let replace = |field: &'static str, from: Option<String>, to: Option<String>| FieldChange {
            field,
            policy: ChangePolicy::Replace,
            from,
            to,
        };

        match (self.cidr.as_deref(), self.prefix_length) {
            (Some(cidr), _) => {
                if !same_cidr(cidr, &state.cidr) {
                    set.push(replace("cidr", Some(state.cidr.clone()), Some(cidr.to_string())));
                }
            }
            (None, Some(wanted)) => {
                let pinned = state.prefix_length.or_else(|| prefix_len(&state.cidr));
                if pinned != Some(wanted) {
                    set.push(replace(
                        "prefix_length",
                        pinned.map(|p| p.to_string()),
                        Some(wanted.to_string()),
                    ));
                }
            }
            (None, None) => {}
        }
        set
    }

    fn from_observed(state: &AllocationState) -> Self {
        match state.prefix_length {
            Some(len) => Self {
                name: state.name.clone(),
                block: state.block_name.clone(),
                cidr: None,
                prefix_length: Some(len),
            },
            None => Self {
                name: state.name.clone(),
                block: state.block_name.clone(),
                cidr: Some(state.cidr.clone()),
                prefix_length: None,
            },
        }
    }
}
