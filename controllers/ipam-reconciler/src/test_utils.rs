//! Test utilities for unit testing reconcilers
//!
//! Builders for declarations and a context wired to an in-memory service.

use crate::reconciler::{ReconcileContext, apply};
use crate::state::Managed;
use ipam_client::MockIpamClient;
use ipam_declarations::{
    AllocationSpec, BlockNameRef, BlockSpec, BlockState, EnvironmentSpec, EnvironmentState, PoolSeed,
};
use std::sync::Arc;

/// A mock service and a context that talks to it. Both share one store.
pub fn mock_context() -> (MockIpamClient, ReconcileContext) {
    let mock = MockIpamClient::new("http://test-ipam");
    let ctx = ReconcileContext::new(Arc::new(mock.clone()));
    (mock, ctx)
}

/// Environment with a single `acc-pool` seed of 10.0.0.0/8
pub fn env_spec(name: &str) -> EnvironmentSpec {
    EnvironmentSpec {
        name: name.to_string(),
        pools: vec![PoolSeed {
            name: "acc-pool".to_string(),
            cidr: "10.0.0.0/8".to_string(),
        }],
    }
}

pub fn block_spec(name: &str, cidr: &str, environment_id: Option<&str>, pool_id: Option<&str>) -> BlockSpec {
    BlockSpec {
        name: name.to_string(),
        cidr: cidr.to_string(),
        environment_id: environment_id.map(str::to_string),
        pool_id: pool_id.map(str::to_string),
    }
}

pub fn explicit_allocation(name: &str, block: &str, cidr: &str) -> AllocationSpec {
    AllocationSpec {
        name: name.to_string(),
        block: BlockNameRef::new(block),
        cidr: Some(cidr.to_string()),
        prefix_length: None,
    }
}

pub fn auto_allocation(name: &str, block: &str, prefix_length: u8) -> AllocationSpec {
    AllocationSpec {
        name: name.to_string(),
        block: BlockNameRef::new(block),
        cidr: None,
        prefix_length: Some(prefix_length),
    }
}

/// Create `acc-env` and an `acc-block` of 10.1.100.0/24 in its seed pool
pub async fn seed_block(ctx: &ReconcileContext) -> (Managed<EnvironmentState>, Managed<BlockState>) {
    let env = apply(ctx, "acc-env", &env_spec("acc-env"), None)
        .await
        .entry
        .expect("environment created");
    let spec = block_spec(
        "acc-block",
        "10.1.100.0/24",
        Some(env.id()),
        env.state.pool_ids.first().map(String::as_str),
    );
    let block = apply(ctx, "acc-block", &spec, None)
        .await
        .entry
        .expect("block created");
    (env, block)
}
