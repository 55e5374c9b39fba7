//! Block operations for MockIpamClient
//!
//! IP counts are never stored; they are recomputed from the block CIDR and
//! its allocations every time a block leaves the mock.

use super::helpers::{
    address_count, bad_request, conflict, ip_counts, new_id, not_found, overlaps, paginate, parse_cidr,
};
use super::{MockIpamClient, Resource, Verb, lock};
use crate::error::IpamError;
use crate::models::*;

const R: Resource = Resource::Block;

/// Fill in `total_ips`/`used_ips`/`available_ips` from current allocations
fn with_counts(client: &MockIpamClient, mut block: Block) -> Block {
    let Some(net) = parse_cidr(&block.cidr) else {
        return block;
    };
    let used: u128 = lock(&client.allocations)
        .iter()
        .filter(|a| a.block_name == block.name)
        .filter_map(|a| parse_cidr(&a.cidr))
        .filter_map(|a| address_count(&a))
        .fold(0u128, u128::saturating_add);
    let (total, used, available) = ip_counts(&net, used);
    block.total_ips = total;
    block.used_ips = used;
    block.available_ips = available;
    block
}

pub(super) fn snapshot(client: &MockIpamClient, id: &str) -> Option<Block> {
    let block = lock(&client.blocks).iter().find(|b| b.id == id).cloned()?;
    Some(with_counts(client, block))
}

pub(super) fn find_by_name(client: &MockIpamClient, name: &str) -> Option<Block> {
    lock(&client.blocks).iter().find(|b| b.name == name).cloned()
}

/// Check the pool/environment attachment of a block
fn check_parents(
    client: &MockIpamClient,
    verb: Verb,
    cidr: &str,
    environment_id: Option<&String>,
    pool_id: Option<&String>,
) -> Result<(), IpamError> {
    let net = parse_cidr(cidr).ok_or_else(|| bad_request(verb, R, &format!("invalid cidr {:?}", cidr)))?;

    if let Some(env_id) = environment_id {
        if client.environment(env_id).is_none() {
            return Err(bad_request(verb, R, "environment not found"));
        }
    }

    if let Some(pool_id) = pool_id {
        let pool = lock(&client.pools)
            .iter()
            .find(|p| &p.id == pool_id)
            .cloned()
            .ok_or_else(|| bad_request(verb, R, "pool not found"))?;
        if environment_id.is_some_and(|env| env != &pool.environment_id) {
            return Err(bad_request(verb, R, "pool does not belong to environment"));
        }
        let within = parse_cidr(&pool.cidr).is_some_and(|p| p.contains(&net));
        if !within {
            return Err(bad_request(verb, R, "block CIDR must be within pool CIDR"));
        }
    }
    Ok(())
}

pub(super) fn list(client: &MockIpamClient, filter: &BlockFilter, options: ListOptions) -> Result<BlockList, IpamError> {
    client.record(R, Verb::List, None)?;
    let matching: Vec<Block> = lock(&client.blocks)
        .iter()
        .filter(|b| filter.name.as_ref().is_none_or(|n| b.name.contains(n.as_str())))
        .filter(|b| {
            filter
                .environment_id
                .as_ref()
                .is_none_or(|env| b.environment_id.as_ref() == Some(env))
        })
        .filter(|b| !filter.orphaned_only.unwrap_or(false) || b.environment_id.is_none())
        .cloned()
        .collect();
    let (page, total) = paginate(&matching, options);
    let blocks = page.into_iter().map(|b| with_counts(client, b)).collect();
    Ok(BlockList { blocks, total })
}

pub(super) fn get(client: &MockIpamClient, id: &str) -> Result<Block, IpamError> {
    client.record(R, Verb::Get, Some(id))?;
    snapshot(client, id).ok_or_else(|| not_found(Verb::Get, R, id, "block"))
}

pub(super) fn create(client: &MockIpamClient, request: &CreateBlockRequest) -> Result<Block, IpamError> {
    client.record(R, Verb::Create, None)?;
    if request.name.trim().is_empty() {
        return Err(bad_request(Verb::Create, R, "name is required"));
    }
    check_parents(
        client,
        Verb::Create,
        &request.cidr,
        request.environment_id.as_ref(),
        request.pool_id.as_ref(),
    )?;
    let net = parse_cidr(&request.cidr).ok_or_else(|| bad_request(Verb::Create, R, "invalid cidr"))?;

    let reserved = lock(&client.reserved_blocks)
        .iter()
        .any(|r| parse_cidr(&r.cidr).is_some_and(|r| overlaps(&r, &net)));
    if reserved {
        return Err(bad_request(Verb::Create, R, "block CIDR overlaps a reserved block"));
    }
    if find_by_name(client, &request.name).is_some() {
        return Err(conflict(Verb::Create, R, &format!("block {:?} already exists", request.name)));
    }

    let block = Block {
        id: new_id(),
        name: request.name.clone(),
        cidr: request.cidr.trim().to_string(),
        total_ips: String::new(),
        used_ips: String::new(),
        available_ips: String::new(),
        environment_id: request.environment_id.clone(),
        organization_id: None,
        pool_id: request.pool_id.clone(),
    };
    lock(&client.blocks).push(block.clone());
    Ok(with_counts(client, block))
}

pub(super) fn update(client: &MockIpamClient, id: &str, request: &UpdateBlockRequest) -> Result<Block, IpamError> {
    client.record(R, Verb::Update, Some(id))?;
    let current = lock(&client.blocks)
        .iter()
        .find(|b| b.id == id)
        .cloned()
        .ok_or_else(|| not_found(Verb::Update, R, id, "block"))?;
    check_parents(
        client,
        Verb::Update,
        &current.cidr,
        request.environment_id.as_ref(),
        request.pool_id.as_ref(),
    )?;

    let updated = {
        let mut blocks = lock(&client.blocks);
        let block = blocks
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| not_found(Verb::Update, R, id, "block"))?;
        block.name = request.name.clone();
        block.environment_id = request.environment_id.clone();
        block.pool_id = request.pool_id.clone();
        block.clone()
    };
    // Allocations follow their block by name
    if current.name != updated.name {
        for allocation in lock(&client.allocations)
            .iter_mut()
            .filter(|a| a.block_name == current.name)
        {
            allocation.block_name = updated.name.clone();
        }
    }
    Ok(with_counts(client, updated))
}

/// Refuses to delete a block that still holds allocations
pub(super) fn delete(client: &MockIpamClient, id: &str) -> Result<(), IpamError> {
    client.record(R, Verb::Delete, Some(id))?;
    let block = lock(&client.blocks)
        .iter()
        .find(|b| b.id == id)
        .cloned()
        .ok_or_else(|| not_found(Verb::Delete, R, id, "block"))?;
    let in_use = lock(&client.allocations).iter().any(|a| a.block_name == block.name);
    if in_use {
        return Err(conflict(Verb::Delete, R, "block has allocations"));
    }
    lock(&client.blocks).retain(|b| b.id != id);
    Ok(())
}
