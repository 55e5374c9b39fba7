//! Block reconciliation

use super::{ManagedKind, ReconcileContext};
use crate::error::{Operation, ReconcileError};
use crate::state::{Managed, StateSnapshot};
use ipam_client::{Block, CreateBlockRequest, UpdateBlockRequest};
use ipam_declarations::{BlockSpec, BlockState, IpCount, ResourceKind};
use std::collections::BTreeMap;
use tracing::warn;

const KIND: ResourceKind = ResourceKind::Block;

/// Fold a block response into state, counts included
fn fold(block: Block) -> BlockState {
    let state = BlockState {
        id: block.id,
        name: block.name,
        cidr: block.cidr,
        environment_id: block.environment_id,
        pool_id: block.pool_id,
        total_ips: IpCount::new(block.total_ips),
        used_ips: IpCount::new(block.used_ips),
        available_ips: IpCount::new(block.available_ips),
    };
    if !state.accounting_holds() {
        warn!(
            "Block {} reports total {} != used {} + available {}",
            state.id, state.total_ips, state.used_ips, state.available_ips
        );
    }
    state
}

async fn get_block(ctx: &ReconcileContext, id: &str, operation: Operation) -> Result<BlockState, ReconcileError> {
    ctx.client()
        .get_block(id)
        .await
        .map(fold)
        .map_err(|e| ReconcileError::from_client(operation, KIND, id, e))
}

#[async_trait::async_trait]
impl ManagedKind for BlockSpec {
    async fn create(&self, ctx: &ReconcileContext, label: &str) -> Result<BlockState, ReconcileError> {
        let request = CreateBlockRequest {
            name: self.name.clone(),
            cidr: self.cidr.trim().to_string(),
            environment_id: self.environment_id.clone(),
            pool_id: self.pool_id.clone(),
        };
        ctx.client()
            .create_block(&request)
            .await
            .map(fold)
            .map_err(|e| ReconcileError::from_client(Operation::Create, KIND, label, e))
    }

    async fn read(ctx: &ReconcileContext, prior: &BlockState) -> Result<BlockState, ReconcileError> {
        get_block(ctx, &prior.id, Operation::Read).await
    }

    async fn read_by_id(ctx: &ReconcileContext, id: &str) -> Result<BlockState, ReconcileError> {
        get_block(ctx, id, Operation::Import).await
    }

    async fn update(&self, ctx: &ReconcileContext, prior: &BlockState) -> Result<BlockState, ReconcileError> {
        let request = UpdateBlockRequest {
            name: self.name.clone(),
            environment_id: self.environment_id.clone(),
            pool_id: self.pool_id.clone(),
        };
        ctx.client()
            .update_block(&prior.id, &request)
            .await
            .map(fold)
            .map_err(|e| ReconcileError::from_client(Operation::Update, KIND, &prior.id, e))
    }

    async fn delete(ctx: &ReconcileContext, state: &BlockState) -> Result<(), ReconcileError> {
        ctx.client()
            .delete_block(&state.id)
            .await
            .map_err(|e| ReconcileError::from_client(Operation::Delete, KIND, &state.id, e))
    }

    fn entries(snapshot: &StateSnapshot) -> &BTreeMap<String, Managed<BlockState>> {
        &snapshot.blocks
    }

    fn entries_mut(snapshot: &mut StateSnapshot) -> &mut BTreeMap<String, Managed<BlockState>> {
        &mut snapshot.blocks
    }
}
