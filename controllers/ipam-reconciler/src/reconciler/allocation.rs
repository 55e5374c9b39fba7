//! Allocation reconciliation
//!
//! Creates go through [`AllocationStrategy`] while holding the block's
//! lock. Reads resolve by ID and fall back to `(name, block_name)` when
//! the service claims the ID does not exist. Import is by ID only.

use super::{ManagedKind, ReconcileContext};
use crate::error::{Operation, ReconcileError};
use crate::lookup::{AllocationKey, resolve_allocation};
use crate::state::{Managed, StateSnapshot};
use crate::strategy::AllocationStrategy;
use ipam_client::{Allocation, UpdateAllocationRequest};
use ipam_declarations::{AllocationSpec, AllocationState, BlockNameRef, ResourceKind};
use std::collections::BTreeMap;
use tracing::debug;

const KIND: ResourceKind = ResourceKind::Allocation;

/// Fold a response, keeping the creation-time prefix length
fn fold(allocation: Allocation, prefix_length: Option<u8>) -> AllocationState {
    AllocationState {
        id: allocation.id,
        name: allocation.name,
        block_name: BlockNameRef::new(allocation.block_name),
        cidr: allocation.cidr,
        prefix_length,
    }
}

#[async_trait::async_trait]
impl ManagedKind for AllocationSpec {
    async fn create(&self, ctx: &ReconcileContext, label: &str) -> Result<AllocationState, ReconcileError> {
        let strategy = AllocationStrategy::select(self, label)?;
        let allocation = {
            let _guard = ctx.locks().acquire(&self.block).await;
            debug!("Holding block {} for allocation {}", self.block, label);
            strategy.submit(ctx.client(), self, label).await?
        };
        strategy.pin(allocation, label)
    }

    async fn read(ctx: &ReconcileContext, prior: &AllocationState) -> Result<AllocationState, ReconcileError> {
        let key = AllocationKey {
            name: &prior.name,
            block_name: prior.block_name.as_str(),
        };
        let allocation = resolve_allocation(ctx.client(), Some(&prior.id), Some(key), Operation::Read).await?;
        Ok(fold(allocation, prior.prefix_length))
    }

    async fn read_by_id(ctx: &ReconcileContext, id: &str) -> Result<AllocationState, ReconcileError> {
        let allocation = resolve_allocation(ctx.client(), Some(id), None, Operation::Import).await?;
        Ok(fold(allocation, None))
    }

    async fn update(&self, ctx: &ReconcileContext, prior: &AllocationState) -> Result<AllocationState, ReconcileError> {
        let allocation = ctx
            .client()
            .update_allocation(&prior.id, &UpdateAllocationRequest { name: self.name.clone() })
            .await
            .map_err(|e| ReconcileError::from_client(Operation::Update, KIND, &prior.id, e))?;
        Ok(fold(allocation, prior.prefix_length))
    }

    async fn delete(ctx: &ReconcileContext, state: &AllocationState) -> Result<(), ReconcileError> {
        ctx.client()
            .delete_allocation(&state.id)
            .await
            .map_err(|e| ReconcileError::from_client(Operation::Delete, KIND, &state.id, e))
    }

    fn entries(snapshot: &StateSnapshot) -> &BTreeMap<String, Managed<AllocationState>> {
        &snapshot.allocations
    }

    fn entries_mut(snapshot: &mut StateSnapshot) -> &mut BTreeMap<String, Managed<AllocationState>> {
        &mut snapshot.allocations
    }
}
