//! Local planning
//!
//! Everything here works from recorded state alone. Document references are
//! resolved to service IDs, and each declaration is diffed against its
//! recorded entry without calling the service.

use crate::error::ReconcileError;
use crate::reconciler::{Action, ManagedKind, plan};
use crate::report::{Report, ReportEntry};
use crate::state::{Lifecycle, Managed, StateSnapshot};
use ipam_declarations::{
    AllocationState, BlockDocument, BlockNameRef, BlockSpec, DesiredState, IdRef, PoolDocument, PoolSpec, ResourceKind,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Stand-in ID for a parent that `apply` would create first
pub const PENDING_ID: &str = "(known after apply)";

#[derive(Debug, Clone, Copy)]
pub struct Planner<'a> {
    state: &'a StateSnapshot,
}

impl<'a> Planner<'a> {
    pub fn new(state: &'a StateSnapshot) -> Self {
        Self { state }
    }

    pub fn resolve(&self, kind: ResourceKind, label: &str, reference: &IdRef) -> Result<String, ReconcileError> {
        let id = match reference {
            IdRef::Id(id) => Some(id.clone()),
            IdRef::Environment { environment } => self.state.id_of(ResourceKind::Environment, environment).map(str::to_string),
            IdRef::EnvironmentPool { environment, pool_index } => self
                .state
                .environments
                .get(environment)
                .and_then(|env| env.state.pool_ids.get(*pool_index))
                .cloned(),
            IdRef::Pool { pool } => self.state.id_of(ResourceKind::Pool, pool).map(str::to_string),
        };
        id.ok_or_else(|| ReconcileError::UnresolvedReference {
            kind,
            label: label.to_string(),
            reference: reference.to_string(),
        })
    }

    /// Like [`Self::resolve`], but a parent the document declares and state
    /// does not yet know resolves to a placeholder
    fn resolve_planned(
        &self,
        desired: &DesiredState,
        kind: ResourceKind,
        label: &str,
        reference: &IdRef,
    ) -> Result<String, ReconcileError> {
        self.resolve(kind, label, reference).or_else(|e| {
            let pending = match reference {
                IdRef::Environment { environment } | IdRef::EnvironmentPool { environment, .. } => {
                    desired.environments.contains_key(environment) && !self.state.environments.contains_key(environment)
                }
                IdRef::Pool { pool } => desired.pools.contains_key(pool) && !self.state.pools.contains_key(pool),
                IdRef::Id(_) => false,
            };
            if pending { Ok(PENDING_ID.to_string()) } else { Err(e) }
        })
    }

    pub fn pool_spec(&self, label: &str, doc: &PoolDocument, desired: Option<&DesiredState>) -> Result<PoolSpec, ReconcileError> {
        let environment_id = match desired {
            Some(desired) => self.resolve_planned(desired, ResourceKind::Pool, label, &doc.environment)?,
            None => self.resolve(ResourceKind::Pool, label, &doc.environment)?,
        };
        Ok(PoolSpec {
            environment_id,
            name: doc.name.clone(),
            cidr: doc.cidr.clone(),
        })
    }

    pub fn block_spec(&self, label: &str, doc: &BlockDocument, desired: Option<&DesiredState>) -> Result<BlockSpec, ReconcileError> {
        let resolve = |reference: &Option<IdRef>| -> Result<Option<String>, ReconcileError> {
            reference
                .as_ref()
                .map(|r| match desired {
                    Some(desired) => self.resolve_planned(desired, ResourceKind::Block, label, r),
                    None => self.resolve(ResourceKind::Block, label, r),
                })
                .transpose()
        };
        Ok(BlockSpec {
            name: doc.name.clone(),
            cidr: doc.cidr.clone(),
            environment_id: resolve(&doc.environment)?,
            pool_id: resolve(&doc.pool)?,
        })
    }

    /// What `apply` would do with `desired`
    pub fn plan(&self, desired: &DesiredState) -> Report {
        let mut report = Report::default();

        for kind in [
            ResourceKind::Allocation,
            ResourceKind::ReservedBlock,
            ResourceKind::Block,
            ResourceKind::Pool,
            ResourceKind::Environment,
        ] {
            for label in self.state.labels(kind) {
                if !desired.contains(kind, &label) {
                    report.push(ReportEntry::new(kind, label, Action::Delete, Ok(Lifecycle::Planned)));
                }
            }
        }

        for (label, spec) in &desired.environments {
            report.push(planned(label, Ok(spec), self.state.environments.get(label)));
        }
        for (label, doc) in &desired.pools {
            let prior = self.state.pools.get(label);
            match self.pool_spec(label, doc, Some(desired)) {
                Ok(spec) => report.push(planned(label, Ok(&spec), prior)),
                Err(e) => report.push(planned::<PoolSpec>(label, Err(e), prior)),
            }
        }
        for (label, spec) in &desired.reserved_blocks {
            report.push(planned(label, Ok(spec), self.state.reserved_blocks.get(label)));
        }
        let mut renames = BTreeMap::new();
        for (label, doc) in &desired.blocks {
            let prior = self.state.blocks.get(label);
            match self.block_spec(label, doc, Some(desired)) {
                Ok(spec) => {
                    let entry = planned(label, Ok(&spec), prior);
                    if let (Action::Update, Some(prior)) = (entry.action, prior) {
                        if prior.state.name != spec.name {
                            renames.insert(prior.state.name.clone(), spec.name.clone());
                        }
                    }
                    report.push(entry);
                }
                Err(e) => report.push(planned::<BlockSpec>(label, Err(e), prior)),
            }
        }

        let mut allocations = self.state.allocations.clone();
        follow_block_renames(&mut allocations, &renames);
        for (label, spec) in &desired.allocations {
            report.push(planned(label, Ok(spec), allocations.get(label)));
        }
        report
    }
}

/// Point recorded allocations at their block's new name. The service moves
/// allocations along when a block is renamed, so this is not drift.
pub fn follow_block_renames(
    allocations: &mut BTreeMap<String, Managed<AllocationState>>,
    renames: &BTreeMap<String, String>,
) {
    for (label, entry) in allocations.iter_mut() {
        if let Some(new) = renames.get(entry.state.block_name.as_str()) {
            debug!("Allocation {} follows its block to {}", label, new);
            entry.state.block_name = BlockNameRef::new(new.clone());
        }
    }
}

fn planned<D: ManagedKind>(label: &str, desired: Result<&D, ReconcileError>, prior: Option<&Managed<D::State>>) -> ReportEntry {
    let action = if prior.is_some() { Action::Update } else { Action::Create };
    match desired.and_then(|desired| plan(label, desired, prior)) {
        Ok(plan) => ReportEntry {
            details: plan.changes.changes.iter().map(ToString::to_string).collect(),
            ..ReportEntry::new(D::KIND, label.to_string(), plan.action, Ok(Lifecycle::Planned))
        },
        Err(e) => ReportEntry::new(D::KIND, label.to_string(), action, Err(e)),
    }
}
