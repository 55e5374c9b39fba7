//! Batch controller.
//!
//! Drives the per-entity engine over a whole desired-state document:
//! references between document entries are resolved through recorded state,
//! kinds run in dependency order, and entities within one phase run
//! concurrently. Allocations are grouped by parent block and each group runs
//! in sequence.
//!
//! Phases for `apply`:
//! - delete what the document no longer declares: allocations and reserved
//!   blocks, then blocks, pools, environments
//! - environments, pools, reserved blocks, blocks, allocations

use crate::error::ReconcileError;
use crate::reconciler::{Action, Applied, ManagedKind, ReconcileContext, apply, destroy, import, refresh};
use crate::planner::{Planner, follow_block_renames};
use crate::report::{Report, ReportEntry};
use crate::state::{Lifecycle, Managed, StateSnapshot};
use futures::future::join_all;
use ipam_client::IpamClientTrait;
use ipam_declarations::{
    AllocationSpec, AllocationState, BlockDocument, BlockSpec, BlockState, Declaration, DesiredState, EnvironmentSpec, IdRef,
    PoolDocument, PoolSpec, ReservedBlockSpec, ResourceKind,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

pub struct Controller {
    ctx: ReconcileContext,
    state: StateSnapshot,
    cancelled: Arc<AtomicBool>,
}

impl Controller {
    pub fn new(client: Arc<dyn IpamClientTrait>, state: StateSnapshot) -> Self {
        Self::with_context(ReconcileContext::new(client), state)
    }

    pub fn with_context(ctx: ReconcileContext, state: StateSnapshot) -> Self {
        Self {
            ctx,
            state,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> &StateSnapshot {
        &self.state
    }

    pub fn into_state(self) -> StateSnapshot {
        self.state
    }

    /// Flag that stops the controller before its next remote call. Calls
    /// already in flight finish; whatever they return is recorded.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// True, and marks the report, once cancellation was requested
    fn stop(&self, report: &mut Report) -> bool {
        if self.is_cancelled() && !report.cancelled {
            warn!("Cancelled; no further calls will be made");
            report.cancelled = true;
        }
        report.cancelled
    }

    // ------------------------------------------------------------------
    // Phases
    // ------------------------------------------------------------------

    /// Apply every entity of one kind concurrently
    async fn apply_phase<D: ManagedKind>(&self, desired: Vec<(String, Result<D, ReconcileError>)>) -> Vec<(String, Applied<D::State>)> {
        let entries = D::entries(&self.state);
        let tasks = desired.into_iter().map(|(label, desired)| async move {
            let prior = entries.get(&label);
            let applied = match desired {
                Ok(desired) => apply(&self.ctx, &label, &desired, prior).await,
                Err(e) => unresolved(&label, prior, e),
            };
            (label, applied)
        });
        join_all(tasks).await
    }

    /// Apply allocations: one sequential run per parent block, blocks in
    /// parallel
    async fn apply_allocations(&self, desired: &BTreeMap<String, AllocationSpec>) -> Vec<(String, Applied<AllocationState>)> {
        let mut groups: BTreeMap<&str, Vec<(&String, &AllocationSpec)>> = BTreeMap::new();
        for (label, spec) in desired {
            groups.entry(spec.block.as_str()).or_default().push((label, spec));
        }

        let entries = &self.state.allocations;
        let tasks = groups.into_values().map(|group| async move {
            let mut results = Vec::with_capacity(group.len());
            for (label, spec) in group {
                if self.is_cancelled() {
                    break;
                }
                let applied = apply(&self.ctx, label, spec, entries.get(label)).await;
                results.push((label.clone(), applied));
            }
            results
        });
        join_all(tasks).await.into_iter().flatten().collect()
    }

    /// Delete every recorded entity of one kind that `keep` rejects
    async fn delete_phase<D: ManagedKind>(&self, keep: &dyn Fn(&str) -> bool) -> Vec<(String, Applied<D::State>)> {
        let tasks = D::entries(&self.state)
            .iter()
            .filter(|(label, _)| !keep(label.as_str()))
            .map(|(label, entry)| async move { (label.clone(), destroy::<D>(&self.ctx, label, entry).await) });
        join_all(tasks).await
    }

    async fn refresh_phase<D: ManagedKind>(&self) -> Vec<(String, Applied<D::State>)> {
        let tasks = D::entries(&self.state)
            .iter()
            .map(|(label, entry)| async move { (label.clone(), refresh::<D>(&self.ctx, label, entry).await) });
        join_all(tasks).await
    }

    /// Fold phase results into state and the report
    fn record<D: ManagedKind>(&mut self, results: Vec<(String, Applied<D::State>)>, report: &mut Report) {
        for (label, applied) in results {
            let Applied { action, entry, result } = applied;
            let entries = D::entries_mut(&mut self.state);
            let lifecycle = match entry {
                Some(entry) => {
                    let lifecycle = entry.lifecycle;
                    entries.insert(label.clone(), entry);
                    lifecycle
                }
                None => {
                    entries.remove(&label);
                    Lifecycle::Destroyed
                }
            };
            report.push(ReportEntry::new(D::KIND, label, action, result.map(|()| lifecycle)));
        }
    }

    /// Deletion phases, children first
    async fn delete_where(&mut self, keep: &dyn Fn(ResourceKind, &str) -> bool, report: &mut Report) {
        if self.stop(report) {
            return;
        }
        let keep_allocation = |label: &str| keep(ResourceKind::Allocation, label);
        let keep_reserved = |label: &str| keep(ResourceKind::ReservedBlock, label);
        let (allocations, reserved) = futures::join!(
            self.delete_phase::<AllocationSpec>(&keep_allocation),
            self.delete_phase::<ReservedBlockSpec>(&keep_reserved),
        );
        self.record::<AllocationSpec>(allocations, report);
        self.record::<ReservedBlockSpec>(reserved, report);

        if self.stop(report) {
            return;
        }
        let blocks = self.delete_phase::<BlockSpec>(&|label: &str| keep(ResourceKind::Block, label)).await;
        self.record::<BlockSpec>(blocks, report);

        if self.stop(report) {
            return;
        }
        let pools = self.delete_phase::<PoolSpec>(&|label: &str| keep(ResourceKind::Pool, label)).await;
        self.record::<PoolSpec>(pools, report);

        if self.stop(report) {
            return;
        }
        let environments = self
            .delete_phase::<EnvironmentSpec>(&|label: &str| keep(ResourceKind::Environment, label))
            .await;
        self.record::<EnvironmentSpec>(environments, report);
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// What `apply` would do. Makes no remote calls.
    pub fn plan(&self, desired: &DesiredState) -> Report {
        Planner::new(&self.state).plan(desired)
    }

    /// Bring the service in line with `desired`
    pub async fn apply(&mut self, desired: &DesiredState) -> Report {
        let mut report = Report::default();
        info!(
            "Applying {} environments, {} pools, {} blocks, {} allocations, {} reserved blocks",
            desired.environments.len(),
            desired.pools.len(),
            desired.blocks.len(),
            desired.allocations.len(),
            desired.reserved_blocks.len()
        );

        self.delete_where(&|kind: ResourceKind, label: &str| desired.contains(kind, label), &mut report)
            .await;

        if self.stop(&mut report) {
            return report;
        }
        let environments = desired
            .environments
            .iter()
            .map(|(label, spec)| (label.clone(), Ok(spec.clone())))
            .collect();
        let results = self.apply_phase::<EnvironmentSpec>(environments).await;
        self.record::<EnvironmentSpec>(results, &mut report);

        if self.stop(&mut report) {
            return report;
        }
        let planner = Planner::new(&self.state);
        let pools = desired
            .pools
            .iter()
            .map(|(label, doc)| (label.clone(), planner.pool_spec(label, doc, None)))
            .collect();
        let results = self.apply_phase::<PoolSpec>(pools).await;
        self.record::<PoolSpec>(results, &mut report);

        if self.stop(&mut report) {
            return report;
        }
        let reserved = desired
            .reserved_blocks
            .iter()
            .map(|(label, spec)| (label.clone(), Ok(spec.clone())))
            .collect();
        let results = self.apply_phase::<ReservedBlockSpec>(reserved).await;
        self.record::<ReservedBlockSpec>(results, &mut report);

        if self.stop(&mut report) {
            return report;
        }
        let planner = Planner::new(&self.state);
        let blocks = desired
            .blocks
            .iter()
            .map(|(label, doc)| (label.clone(), planner.block_spec(label, doc, None)))
            .collect();
        let results = self.apply_phase::<BlockSpec>(blocks).await;
        let renames = applied_renames(&self.state.blocks, &results);
        self.record::<BlockSpec>(results, &mut report);
        follow_block_renames(&mut self.state.allocations, &renames);

        if self.stop(&mut report) {
            return report;
        }
        let declared = desired.block_names();
        for (label, spec) in &desired.allocations {
            if !declared.contains(spec.block.as_str()) {
                debug!("Allocation {} targets block {}, which this document does not declare", label, spec.block);
            }
        }
        let results = self.apply_allocations(&desired.allocations).await;
        self.record::<AllocationSpec>(results, &mut report);
        // a group may have stopped part way through
        self.stop(&mut report);

        report
    }

    /// Read every recorded entity and fold drift back into state
    pub async fn refresh(&mut self) -> Report {
        let mut report = Report::default();
        if self.stop(&mut report) {
            return report;
        }
        let (environments, pools, reserved, blocks, allocations) = futures::join!(
            self.refresh_phase::<EnvironmentSpec>(),
            self.refresh_phase::<PoolSpec>(),
            self.refresh_phase::<ReservedBlockSpec>(),
            self.refresh_phase::<BlockSpec>(),
            self.refresh_phase::<AllocationSpec>(),
        );
        self.record::<EnvironmentSpec>(environments, &mut report);
        self.record::<PoolSpec>(pools, &mut report);
        self.record::<ReservedBlockSpec>(reserved, &mut report);
        self.record::<BlockSpec>(blocks, &mut report);
        self.record::<AllocationSpec>(allocations, &mut report);
        report
    }

    /// Delete every recorded entity
    pub async fn destroy(&mut self) -> Report {
        let mut report = Report::default();
        self.delete_where(&|_: ResourceKind, _: &str| false, &mut report).await;
        report
    }

    /// Adopt an existing entity under `label`. Returns a desired-state
    /// document declaring exactly what was imported.
    pub async fn import(&mut self, kind: ResourceKind, label: &str, id: &str) -> Result<String, ReconcileError> {
        if self.state.id_of(kind, label).is_some() {
            return Err(ReconcileError::InvalidConfig(format!(
                "{kind} {label:?} is already tracked; remove it from state before importing"
            )));
        }

        let mut document = DesiredState::default();
        match kind {
            ResourceKind::Environment => {
                let entry = self.import_into::<EnvironmentSpec>(label, id).await?;
                document.environments.insert(label.to_string(), EnvironmentSpec::from_observed(&entry));
            }
            ResourceKind::Pool => {
                let entry = self.import_into::<PoolSpec>(label, id).await?;
                let spec = PoolSpec::from_observed(&entry);
                document.pools.insert(
                    label.to_string(),
                    PoolDocument {
                        environment: IdRef::Id(spec.environment_id),
                        name: spec.name,
                        cidr: spec.cidr,
                    },
                );
            }
            ResourceKind::Block => {
                let entry = self.import_into::<BlockSpec>(label, id).await?;
                let spec = BlockSpec::from_observed(&entry);
                document.blocks.insert(
                    label.to_string(),
                    BlockDocument {
                        name: spec.name,
                        cidr: spec.cidr,
                        environment: spec.environment_id.map(IdRef::Id),
                        pool: spec.pool_id.map(IdRef::Id),
                    },
                );
            }
            ResourceKind::Allocation => {
                let entry = self.import_into::<AllocationSpec>(label, id).await?;
                document.allocations.insert(label.to_string(), AllocationSpec::from_observed(&entry));
            }
            ResourceKind::ReservedBlock => {
                let entry = self.import_into::<ReservedBlockSpec>(label, id).await?;
                document
                    .reserved_blocks
                    .insert(label.to_string(), ReservedBlockSpec::from_observed(&entry));
            }
        }
        Ok(document.to_yaml()?)
    }

    async fn import_into<D: ManagedKind>(&mut self, label: &str, id: &str) -> Result<D::State, ReconcileError> {
        let entry = import::<D>(&self.ctx, label, id).await?;
        let state = entry.state.clone();
        D::entries_mut(&mut self.state).insert(label.to_string(), entry);
        Ok(state)
    }
}

/// An entity whose declaration could not be built. Its recorded entry, if
/// any, is left as it was.
fn unresolved<S: Clone>(label: &str, prior: Option<&Managed<S>>, e: ReconcileError) -> Applied<S> {
    error!("Skipping {}: {}", label, e);
    Applied {
        action: if prior.is_some() { Action::Update } else { Action::Create },
        entry: prior.cloned(),
        result: Err(e),
    }
}

/// Old and new name of every block an update just renamed
fn applied_renames(
    prior: &BTreeMap<String, Managed<BlockState>>,
    results: &[(String, Applied<BlockState>)],
) -> BTreeMap<String, String> {
    results
        .iter()
        .filter(|(_, applied)| applied.action == Action::Update && applied.result.is_ok())
        .filter_map(|(label, applied)| {
            let before = &prior.get(label)?.state.name;
            let after = &applied.entry.as_ref()?.state.name;
            (before != after).then(|| (before.clone(), after.clone()))
        })
        .collect()
}
