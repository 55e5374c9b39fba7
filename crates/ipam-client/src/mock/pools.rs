//! Pool operations for MockIpamClient

use super::helpers::{bad_request, new_id, not_found, paginate, parse_cidr};
use super::{MockIpamClient, Resource, Verb, lock};
use crate::error::IpamError;
use crate::models::*;

const R: Resource = Resource::Pool;

pub(super) fn list(client: &MockIpamClient, filter: &PoolFilter, options: ListOptions) -> Result<PoolList, IpamError> {
    client.record(R, Verb::List, None)?;
    let matching: Vec<Pool> = lock(&client.pools)
        .iter()
        .filter(|p| {
            filter
                .environment_id
                .as_ref()
                .is_none_or(|env| &p.environment_id == env)
        })
        .cloned()
        .collect();
    let (pools, total) = paginate(&matching, options);
    Ok(PoolList { pools, total })
}

pub(super) fn get(client: &MockIpamClient, id: &str) -> Result<Pool, IpamError> {
    client.record(R, Verb::Get, Some(id))?;
    lock(&client.pools)
        .iter()
        .find(|p| p.id == id)
        .cloned()
        .ok_or_else(|| not_found(Verb::Get, R, id, "pool"))
}

pub(super) fn create(client: &MockIpamClient, request: &CreatePoolRequest) -> Result<Pool, IpamError> {
    client.record(R, Verb::Create, None)?;
    if parse_cidr(&request.cidr).is_none() {
        return Err(bad_request(Verb::Create, R, &format!("invalid cidr {:?}", request.cidr)));
    }
    let mut environments = lock(&client.environments);
    let env = environments
        .iter_mut()
        .find(|e| e.id == request.environment_id)
        .ok_or_else(|| bad_request(Verb::Create, R, "environment not found"))?;

    let pool = Pool {
        id: new_id(),
        organization_id: None,
        environment_id: request.environment_id.clone(),
        name: request.name.clone(),
        cidr: request.cidr.trim().to_string(),
    };
    env.pool_ids.push(pool.id.clone());
    drop(environments);
    lock(&client.pools).push(pool.clone());
    Ok(pool)
}

pub(super) fn update(client: &MockIpamClient, id: &str, request: &UpdatePoolRequest) -> Result<Pool, IpamError> {
    client.record(R, Verb::Update, Some(id))?;
    if parse_cidr(&request.cidr).is_none() {
        return Err(bad_request(Verb::Update, R, &format!("invalid cidr {:?}", request.cidr)));
    }
    let mut pools = lock(&client.pools);
    let pool = pools
        .iter_mut()
        .find(|p| p.id == id)
        .ok_or_else(|| not_found(Verb::Update, R, id, "pool"))?;
    pool.name = request.name.clone();
    pool.cidr = request.cidr.trim().to_string();
    Ok(pool.clone())
}

pub(super) fn delete(client: &MockIpamClient, id: &str) -> Result<(), IpamError> {
    client.record(R, Verb::Delete, Some(id))?;
    let mut pools = lock(&client.pools);
    let before = pools.len();
    pools.retain(|p| p.id != id);
    if pools.len() == before {
        return Err(not_found(Verb::Delete, R, id, "pool"));
    }
    drop(pools);
    for env in lock(&client.environments).iter_mut() {
        env.pool_ids.retain(|p| p != id);
    }
    Ok(())
}
