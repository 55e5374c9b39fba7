//! Environment reconciliation
//!
//! An environment is created with its seed pools in one call. A rename
//! response carries no `pool_ids`, so they are copied forward from prior
//! state. A read lists the environment's pools to refresh both `pools`
//! and `pool_ids`.

use super::{ManagedKind, ReconcileContext};
use crate::error::{Operation, ReconcileError};
use crate::lookup::environment_pools;
use crate::state::{Managed, StateSnapshot};
use ipam_client::{CreateEnvironmentRequest, PoolInput, UpdateEnvironmentRequest};
use ipam_declarations::{EnvironmentSpec, EnvironmentState, PoolSeed, ResourceKind};
use std::collections::BTreeMap;
use tracing::debug;

const KIND: ResourceKind = ResourceKind::Environment;

async fn read_environment(ctx: &ReconcileContext, id: &str, operation: Operation) -> Result<EnvironmentState, ReconcileError> {
    let detail = ctx
        .client()
        .get_environment(id)
        .await
        .map_err(|e| ReconcileError::from_client(operation, KIND, id, e))?;
    let pools = environment_pools(ctx.client(), id, operation).await?;
    debug!("Environment {} has {} pools and {} blocks", id, pools.len(), detail.blocks.len());

    Ok(EnvironmentState {
        id: detail.id,
        name: detail.name,
        pool_ids: pools.iter().map(|p| p.id.clone()).collect(),
        pools: pools
            .into_iter()
            .map(|p| PoolSeed {
                name: p.name,
                cidr: p.cidr,
            })
            .collect(),
    })
}

#[async_trait::async_trait]
impl ManagedKind for EnvironmentSpec {
    async fn create(&self, ctx: &ReconcileContext, label: &str) -> Result<EnvironmentState, ReconcileError> {
        let request = CreateEnvironmentRequest {
            name: self.name.clone(),
            pools: self
                .pools
                .iter()
                .map(|p| PoolInput {
                    name: p.name.clone(),
                    cidr: p.cidr.trim().to_string(),
                })
                .collect(),
        };
        let env = ctx
            .client()
            .create_environment(&request)
            .await
            .map_err(|e| ReconcileError::from_client(Operation::Create, KIND, label, e))?;

        Ok(EnvironmentState {
            id: env.id,
            name: env.name,
            pools: self.pools.clone(),
            pool_ids: env.pool_ids,
        })
    }

    async fn read(ctx: &ReconcileContext, prior: &EnvironmentState) -> Result<EnvironmentState, ReconcileError> {
        read_environment(ctx, &prior.id, Operation::Read).await
    }

    async fn read_by_id(ctx: &ReconcileContext, id: &str) -> Result<EnvironmentState, ReconcileError> {
        read_environment(ctx, id, Operation::Import).await
    }

    async fn update(&self, ctx: &ReconcileContext, prior: &EnvironmentState) -> Result<EnvironmentState, ReconcileError> {
        let env = ctx
            .client()
            .update_environment(&prior.id, &UpdateEnvironmentRequest { name: self.name.clone() })
            .await
            .map_err(|e| ReconcileError::from_client(Operation::Update, KIND, &prior.id, e))?;

        // The response carries pool_ids only on some deployments
        let pool_ids = if env.pool_ids.is_empty() {
            prior.pool_ids.clone()
        } else {
            env.pool_ids
        };
        Ok(EnvironmentState {
            id: env.id,
            name: env.name,
            pools: prior.pools.clone(),
            pool_ids,
        })
    }

    async fn delete(ctx: &ReconcileContext, state: &EnvironmentState) -> Result<(), ReconcileError> {
        ctx.client()
            .delete_environment(&state.id)
            .await
            .map_err(|e| ReconcileError::from_client(Operation::Delete, KIND, &state.id, e))
    }

    fn entries(snapshot: &StateSnapshot) -> &BTreeMap<String, Managed<EnvironmentState>> {
        &snapshot.environments
    }

    fn entries_mut(snapshot: &mut StateSnapshot) -> &mut BTreeMap<String, Managed<EnvironmentState>> {
        &mut snapshot.environments
    }
}
