//! Reserved block reconciliation
//!
//! Reads list every reserved block and match the ID. Only the name can be
//! updated; `reason` is create-only and a change to it never reaches here.

use super::{ManagedKind, ReconcileContext};
use crate::error::{Operation, ReconcileError};
use crate::lookup::find_reserved_block;
use crate::state::{Managed, StateSnapshot};
use ipam_client::{CreateReservedBlockRequest, ReservedBlock, UpdateReservedBlockRequest};
use ipam_declarations::{ReservedBlockSpec, ReservedBlockState, ResourceKind};
use std::collections::BTreeMap;

const KIND: ResourceKind = ResourceKind::ReservedBlock;

fn fold(reserved: ReservedBlock) -> ReservedBlockState {
    ReservedBlockState {
        id: reserved.id,
        name: reserved.name,
        cidr: reserved.cidr,
        reason: reserved.reason,
        created_at: reserved.created_at,
    }
}

#[async_trait::async_trait]
impl ManagedKind for ReservedBlockSpec {
    async fn create(&self, ctx: &ReconcileContext, label: &str) -> Result<ReservedBlockState, ReconcileError> {
        let request = CreateReservedBlockRequest {
            name: self.name.clone(),
            cidr: self.cidr.trim().to_string(),
            reason: self.reason.clone(),
        };
        ctx.client()
            .create_reserved_block(&request)
            .await
            .map(fold)
            .map_err(|e| ReconcileError::from_client(Operation::Create, KIND, label, e))
    }

    async fn read(ctx: &ReconcileContext, prior: &ReservedBlockState) -> Result<ReservedBlockState, ReconcileError> {
        find_reserved_block(ctx.client(), &prior.id, Operation::Read).await.map(fold)
    }

    async fn read_by_id(ctx: &ReconcileContext, id: &str) -> Result<ReservedBlockState, ReconcileError> {
        find_reserved_block(ctx.client(), id, Operation::Import).await.map(fold)
    }

    async fn update(&self, ctx: &ReconcileContext, prior: &ReservedBlockState) -> Result<ReservedBlockState, ReconcileError> {
        // name is OptionalComputed: an update only happens when it is set
        let name = self.name.clone().or_else(|| prior.name.clone()).unwrap_or_default();
        ctx.client()
            .update_reserved_block(&prior.id, &UpdateReservedBlockRequest { name })
            .await
            .map(fold)
            .map_err(|e| ReconcileError::from_client(Operation::Update, KIND, &prior.id, e))
    }

    async fn delete(ctx: &ReconcileContext, state: &ReservedBlockState) -> Result<(), ReconcileError> {
        ctx.client()
            .delete_reserved_block(&state.id)
            .await
            .map_err(|e| ReconcileError::from_client(Operation::Delete, KIND, &state.id, e))
    }

    fn entries(snapshot: &StateSnapshot) -> &BTreeMap<String, Managed<ReservedBlockState>> {
        &snapshot.reserved_blocks
    }

    fn entries_mut(snapshot: &mut StateSnapshot) -> &mut BTreeMap<String, Managed<ReservedBlockState>> {
        &mut snapshot.reserved_blocks
    }
}
