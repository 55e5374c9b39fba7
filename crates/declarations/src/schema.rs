//! Field schemas and change partitioning
//!
//! Every resource kind carries a static table describing, for each field,
//! whether the operator supplies it or the service computes it and what a
//! change to it means. Diffing a declaration against recorded state only
//! consults this table; no kind-specific branching happens in the engine.

use crate::cidr::same_cidr;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The five resource kinds the reconciler manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Environment,
    Pool,
    Block,
    Allocation,
    ReservedBlock,
}

impl ResourceKind {
    /// All kinds, in creation order
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Environment,
        ResourceKind::Pool,
        ResourceKind::ReservedBlock,
        ResourceKind::Block,
        ResourceKind::Allocation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Environment => "environment",
            ResourceKind::Pool => "pool",
            ResourceKind::Block => "block",
            ResourceKind::Allocation => "allocation",
            ResourceKind::ReservedBlock => "reserved_block",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "environment" | "environments" => Ok(ResourceKind::Environment),
            "pool" | "pools" => Ok(ResourceKind::Pool),
            "block" | "blocks" => Ok(ResourceKind::Block),
            "allocation" | "allocations" => Ok(ResourceKind::Allocation),
            "reserved_block" | "reserved_blocks" => Ok(ResourceKind::ReservedBlock),
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}

/// Who supplies a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPresence {
    /// Operator must supply it
    Required,
    /// Operator may supply it; absence is a value (e.g. an orphaned block)
    Optional,
    /// Service assigns it; never compared
    Computed,
    /// Operator may supply it; when absent the service's value is accepted
    OptionalComputed,
}

/// What a changed field forces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangePolicy {
    /// A single update call
    UpdateInPlace,
    /// Delete, then create (new ID)
    Replace,
    /// Logged and otherwise left alone
    Ignore,
    /// Refused before any remote call
    Reject,
}

/// How field values are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    /// Compared in canonical network form
    Cidr,
}

/// Metadata for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: &'static str,
    pub presence: FieldPresence,
    pub policy: ChangePolicy,
    pub value: ValueKind,
}

impl FieldSchema {
    pub const fn new(name: &'static str, presence: FieldPresence, policy: ChangePolicy) -> Self {
        Self {
            name,
            presence,
            policy,
            value: ValueKind::Text,
        }
    }

    pub const fn cidr(name: &'static str, presence: FieldPresence, policy: ChangePolicy) -> Self {
        Self {
            name,
            presence,
            policy,
            value: ValueKind::Cidr,
        }
    }

    /// The service's `id`
    pub const fn id() -> Self {
        Self::new("id", FieldPresence::Computed, ChangePolicy::Ignore)
    }

    /// Whether `desired` and `observed` count as the same value
    pub fn same_value(&self, desired: Option<&str>, observed: Option<&str>) -> bool {
        match self.presence {
            FieldPresence::Computed => true,
            FieldPresence::OptionalComputed if desired.is_none() => true,
            _ => match (desired, observed, self.value) {
                (Some(d), Some(o), ValueKind::Cidr) => same_cidr(d, o),
                (d, o, _) => d == o,
            },
        }
    }
}

/// Static schema of a resource kind
#[derive(Debug)]
pub struct ResourceSchema {
    pub kind: ResourceKind,
    pub fields: &'static [FieldSchema],
}

impl ResourceSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of the fields the service computes
    pub fn computed(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .filter(|f| f.presence == FieldPresence::Computed)
            .map(|f| f.name)
    }
}

/// A field whose desired value differs from recorded state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub policy: ChangePolicy,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {}",
            self.field,
            self.from.as_deref().unwrap_or("<none>"),
            self.to.as_deref().unwrap_or("<none>")
        )
    }
}

/// The changed fields of one entity, partitioned by policy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub changes: Vec<FieldChange>,
}

impl ChangeSet {
    pub fn push(&mut self, change: FieldChange) {
        self.changes.push(change);
    }

    fn with_policy(&self, policy: ChangePolicy) -> impl Iterator<Item = &FieldChange> {
        self.changes.iter().filter(move |c| c.policy == policy)
    }

    pub fn replacements(&self) -> impl Iterator<Item = &FieldChange> {
        self.with_policy(ChangePolicy::Replace)
    }

    pub fn updates(&self) -> impl Iterator<Item = &FieldChange> {
        self.with_policy(ChangePolicy::UpdateInPlace)
    }

    pub fn ignored(&self) -> impl Iterator<Item = &FieldChange> {
        self.with_policy(ChangePolicy::Ignore)
    }

    pub fn rejected(&self) -> impl Iterator<Item = &FieldChange> {
        self.with_policy(ChangePolicy::Reject)
    }

    pub fn requires_replace(&self) -> bool {
        self.replacements().next().is_some()
    }

    pub fn requires_update(&self) -> bool {
        self.updates().next().is_some()
    }

    /// True when nothing needs a remote call
    pub fn is_noop(&self) -> bool {
        !self.requires_replace() && !self.requires_update()
    }
}

/// Compare desired field values with observed ones under `schema`.
///
/// Both lists are keyed by field name; fields missing from either side
/// count as `None`. Fields not in the schema are ignored.
pub fn diff_fields(
    schema: &ResourceSchema,
    desired: &[(&'static str, Option<String>)],
    observed: &[(&'static str, Option<String>)],
) -> ChangeSet {
    let lookup = |list: &[(&'static str, Option<String>)], name: &str| {
        list.iter().find(|(n, _)| *n == name).and_then(|(_, v)| v.clone())
    };

    let mut set = ChangeSet::default();
    for field in schema.fields {
        let to = lookup(desired, field.name);
        let from = lookup(observed, field.name);
        if !field.same_value(to.as_deref(), from.as_deref()) {
            set.push(FieldChange {
                field: field.name,
                policy: field.policy,
                from,
                to,
            });
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    static SCHEMA: ResourceSchema = ResourceSchema {
        kind: ResourceKind::Block,
        fields: &[
            FieldSchema::id(),
            FieldSchema::new("name", FieldPresence::Required, ChangePolicy::UpdateInPlace),
            FieldSchema::cidr("cidr", FieldPresence::Required, ChangePolicy::Replace),
            FieldSchema::new("note", FieldPresence::OptionalComputed, ChangePolicy::Reject),
            FieldSchema::new("total", FieldPresence::Computed, ChangePolicy::Ignore),
        ],
    };

    fn fields(pairs: &[(&'static str, Option<&str>)]) -> Vec<(&'static str, Option<String>)> {
        pairs.iter().map(|(k, v)| (*k, v.map(str::to_string))).collect()
    }

    #[test]
    fn test_partition_by_policy() {
        let desired = fields(&[("name", Some("b")), ("cidr", Some("10.0.1.0/24"))]);
        let observed = fields(&[
            ("id", Some("x")),
            ("name", Some("a")),
            ("cidr", Some("10.0.0.0/24")),
            ("total", Some("256")),
        ]);
        let set = diff_fields(&SCHEMA, &desired, &observed);
        assert_eq!(set.updates().map(|c| c.field).collect::<Vec<_>>(), vec!["name"]);
        assert_eq!(set.replacements().map(|c| c.field).collect::<Vec<_>>(), vec!["cidr"]);
        assert!(set.requires_replace());
    }

    #[test]
    fn test_cidr_compared_canonically() {
        let desired = fields(&[("name", Some("a")), ("cidr", Some(" 2001:DB8::/64"))]);
        let observed = fields(&[("name", Some("a")), ("cidr", Some("2001:db8::/64"))]);
        assert!(diff_fields(&SCHEMA, &desired, &observed).changes.is_empty());
    }

    #[test]
    fn test_optional_computed_absent_is_accepted() {
        let desired = fields(&[("name", Some("a")), ("cidr", Some("10.0.0.0/24"))]);
        let observed = fields(&[("name", Some("a")), ("cidr", Some("10.0.0.0/24")), ("note", Some("x"))]);
        assert!(diff_fields(&SCHEMA, &desired, &observed).is_noop());

        let desired = fields(&[("name", Some("a")), ("cidr", Some("10.0.0.0/24")), ("note", Some("y"))]);
        let set = diff_fields(&SCHEMA, &desired, &observed);
        assert_eq!(set.rejected().count(), 1);
        assert!(set.is_noop());
    }

    #[test]
    fn test_kind_parses_cli_spellings() {
        assert_eq!("reserved-block".parse::<ResourceKind>(), Ok(ResourceKind::ReservedBlock));
        assert_eq!("Blocks".parse::<ResourceKind>(), Ok(ResourceKind::Block));
        assert!("subnet".parse::<ResourceKind>().is_err());
    }
}
