//! Pool reconciliation

use super::{ManagedKind, ReconcileContext};
use crate::error::{Operation, ReconcileError};
use crate::state::{Managed, StateSnapshot};
use ipam_client::{CreatePoolRequest, Pool, UpdatePoolRequest};
use ipam_declarations::{PoolSpec, PoolState, ResourceKind};
use std::collections::BTreeMap;

const KIND: ResourceKind = ResourceKind::Pool;

fn fold(pool: Pool) -> PoolState {
    PoolState {
        id: pool.id,
        environment_id: pool.environment_id,
        name: pool.name,
        cidr: pool.cidr,
    }
}

async fn get_pool(ctx: &ReconcileContext, id: &str, operation: Operation) -> Result<PoolState, ReconcileError> {
    ctx.client()
        .get_pool(id)
        .await
        .map(fold)
        .map_err(|e| ReconcileError::from_client(operation, KIND, id, e))
}

#[async_trait::async_trait]
impl ManagedKind for PoolSpec {
    async fn create(&self, ctx: &ReconcileContext, label: &str) -> Result<PoolState, ReconcileError> {
        let request = CreatePoolRequest {
            environment_id: self.environment_id.clone(),
            name: self.name.clone(),
            cidr: self.cidr.trim().to_string(),
        };
        ctx.client()
            .create_pool(&request)
            .await
            .map(fold)
            .map_err(|e| ReconcileError::from_client(Operation::Create, KIND, label, e))
    }

    async fn read(ctx: &ReconcileContext, prior: &PoolState) -> Result<PoolState, ReconcileError> {
        get_pool(ctx, &prior.id, Operation::Read).await
    }

    async fn read_by_id(ctx: &ReconcileContext, id: &str) -> Result<PoolState, ReconcileError> {
        get_pool(ctx, id, Operation::Import).await
    }

    async fn update(&self, ctx: &ReconcileContext, prior: &PoolState) -> Result<PoolState, ReconcileError> {
        let request = UpdatePoolRequest {
            name: self.name.clone(),
            cidr: self.cidr.trim().to_string(),
        };
        ctx.client()
            .update_pool(&prior.id, &request)
            .await
            .map(fold)
            .map_err(|e| ReconcileError::from_client(Operation::Update, KIND, &prior.id, e))
    }

    async fn delete(ctx: &ReconcileContext, state: &PoolState) -> Result<(), ReconcileError> {
        ctx.client()
            .delete_pool(&state.id)
            .await
            .map_err(|e| ReconcileError::from_client(Operation::Delete, KIND, &state.id, e))
    }

    fn entries(snapshot: &StateSnapshot) -> &BTreeMap<String, Managed<PoolState>> {
        &snapshot.pools
    }

    fn entries_mut(snapshot: &mut StateSnapshot) -> &mut BTreeMap<String, Managed<PoolState>> {
        &mut snapshot.pools
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::{Action, apply};
    use crate::test_utils::{env_spec, mock_context};
    use ipam_client::mock::{Resource, Verb};

    #[tokio::test]
    async fn test_pool_cidr_change_is_in_place() {
        let (mock, ctx) = mock_context();
        let env = apply(&ctx, "env", &env_spec("acc-env"), None).await.entry.unwrap();

        let mut spec = PoolSpec {
            environment_id: env.id().to_string(),
            name: "extra".to_string(),
            cidr: "172.20.0.0/16".to_string(),
        };
        let created = apply(&ctx, "extra", &spec, None).await.entry.unwrap();

        spec.cidr = "172.20.0.0/15".to_string();
        mock.clear_calls();
        let updated = apply(&ctx, "extra", &spec, Some(&created)).await;
        assert_eq!(updated.action, Action::Update);
        let updated = updated.entry.unwrap();
        assert_eq!(updated.id(), created.id());
        assert_eq!(updated.state.cidr, "172.20.0.0/15");
        assert_eq!(mock.call_count(Resource::Pool, Verb::Update), 1);
        assert_eq!(mock.write_count(), 1);
    }

    #[tokio::test]
    async fn test_pool_environment_change_replaces() {
        let (mock, ctx) = mock_context();
        let first = apply(&ctx, "a", &env_spec("env-a"), None).await.entry.unwrap();
        let second = apply(&ctx, "b", &env_spec("env-b"), None).await.entry.unwrap();

        let mut spec = PoolSpec {
            environment_id: first.id().to_string(),
            name: "extra".to_string(),
            cidr: "172.20.0.0/16".to_string(),
        };
        let created = apply(&ctx, "extra", &spec, None).await.entry.unwrap();

        spec.environment_id = second.id().to_string();
        mock.clear_calls();
        let replaced = apply(&ctx, "extra", &spec, Some(&created)).await;
        assert_eq!(replaced.action, Action::Replace);
        assert_ne!(replaced.entry.unwrap().id(), created.id());
        assert_eq!(mock.call_count(Resource::Pool, Verb::Delete), 1);
        assert_eq!(mock.call_count(Resource::Pool, Verb::Create), 1);
        assert_eq!(mock.call_count(Resource::Pool, Verb::Update), 0);
    }
}
