//! Environment operations for MockIpamClient

use super::helpers::{bad_request, new_id, not_found, paginate, parse_cidr};
use super::{MockIpamClient, Resource, Verb, blocks, lock};
use crate::error::IpamError;
use crate::models::*;

const R: Resource = Resource::Environment;

pub(super) fn list(client: &MockIpamClient, filter: &EnvironmentFilter, options: ListOptions) -> Result<EnvironmentList, IpamError> {
    client.record(R, Verb::List, None)?;
    let matching: Vec<Environment> = lock(&client.environments)
        .iter()
        .filter(|e| filter.name.as_ref().is_none_or(|n| e.name.contains(n.as_str())))
        .cloned()
        .collect();
    let (environments, total) = paginate(&matching, options);
    Ok(EnvironmentList { environments, total })
}

pub(super) fn get(client: &MockIpamClient, id: &str) -> Result<EnvironmentDetail, IpamError> {
    client.record(R, Verb::Get, Some(id))?;
    let env = client
        .environment(id)
        .ok_or_else(|| not_found(Verb::Get, R, id, "environment"))?;
    let block_ids: Vec<String> = lock(&client.blocks)
        .iter()
        .filter(|b| b.environment_id.as_deref() == Some(id))
        .map(|b| b.id.clone())
        .collect();
    let blocks = block_ids.iter().filter_map(|b| blocks::snapshot(client, b)).collect();
    Ok(EnvironmentDetail {
        id: env.id,
        name: env.name,
        blocks,
    })
}

pub(super) fn create(client: &MockIpamClient, request: &CreateEnvironmentRequest) -> Result<Environment, IpamError> {
    client.record(R, Verb::Create, None)?;
    if request.name.trim().is_empty() {
        return Err(bad_request(Verb::Create, R, "name is required"));
    }
    if request.pools.is_empty() {
        return Err(bad_request(Verb::Create, R, "at least one pool is required"));
    }
    for pool in &request.pools {
        if pool.name.trim().is_empty() || parse_cidr(&pool.cidr).is_none() {
            return Err(bad_request(
                Verb::Create,
                R,
                &format!("invalid pool {:?} with cidr {:?}", pool.name, pool.cidr),
            ));
        }
    }

    let id = new_id();
    let pools: Vec<Pool> = request
        .pools
        .iter()
        .map(|p| Pool {
            id: new_id(),
            organization_id: None,
            environment_id: id.clone(),
            name: p.name.clone(),
            cidr: p.cidr.trim().to_string(),
        })
        .collect();
    let pool_ids: Vec<String> = pools.iter().map(|p| p.id.clone()).collect();

    let env = Environment {
        id,
        name: request.name.clone(),
        initial_pool_id: pool_ids.first().cloned(),
        pool_ids,
    };
    lock(&client.pools).extend(pools);
    lock(&client.environments).push(env.clone());
    Ok(env)
}

/// Rename. Like the service, the response leaves out `pool_ids`.
pub(super) fn update(client: &MockIpamClient, id: &str, request: &UpdateEnvironmentRequest) -> Result<Environment, IpamError> {
    client.record(R, Verb::Update, Some(id))?;
    let mut environments = lock(&client.environments);
    let env = environments
        .iter_mut()
        .find(|e| e.id == id)
        .ok_or_else(|| not_found(Verb::Update, R, id, "environment"))?;
    env.name = request.name.clone();
    Ok(Environment {
        id: env.id.clone(),
        name: env.name.clone(),
        initial_pool_id: None,
        pool_ids: Vec::new(),
    })
}

/// Delete the environment and the pools it owns
pub(super) fn delete(client: &MockIpamClient, id: &str) -> Result<(), IpamError> {
    client.record(R, Verb::Delete, Some(id))?;
    let mut environments = lock(&client.environments);
    let before = environments.len();
    environments.retain(|e| e.id != id);
    if environments.len() == before {
        return Err(not_found(Verb::Delete, R, id, "environment"));
    }
    drop(environments);
    lock(&client.pools).retain(|p| p.environment_id != id);
    Ok(())
}
