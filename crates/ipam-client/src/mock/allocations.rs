//! Allocation operations for MockIpamClient
//!
//! Explicit allocations are checked for containment and overlap; auto
//! allocations take the first free subnet of the requested size.

use super::blocks::find_by_name;
use super::helpers::{bad_request, conflict, new_id, not_found, overlaps, paginate, parse_cidr};
use super::{MockIpamClient, Resource, Verb, lock};
use crate::error::IpamError;
use crate::models::*;
use ipnet::IpNet;

const R: Resource = Resource::Allocation;

/// Networks already taken inside `block_name`, plus every reserved range
fn occupied(client: &MockIpamClient, block_name: &str) -> Vec<IpNet> {
    let mut taken: Vec<IpNet> = lock(&client.allocations)
        .iter()
        .filter(|a| a.block_name == block_name)
        .filter_map(|a| parse_cidr(&a.cidr))
        .collect();
    taken.extend(lock(&client.reserved_blocks).iter().filter_map(|r| parse_cidr(&r.cidr)));
    taken
}

/// Resolve the parent block and reject duplicate names within it
fn parent_net(client: &MockIpamClient, verb: Verb, name: &str, block_name: &str) -> Result<IpNet, IpamError> {
    let block = find_by_name(client, block_name)
        .ok_or_else(|| bad_request(verb, R, &format!("block {:?} not found", block_name)))?;
    let duplicate = lock(&client.allocations)
        .iter()
        .any(|a| a.block_name == block_name && a.name == name);
    if duplicate {
        return Err(conflict(
            verb,
            R,
            &format!("allocation {:?} already exists in block {:?}", name, block_name),
        ));
    }
    parse_cidr(&block.cidr).ok_or_else(|| bad_request(verb, R, "block has an invalid cidr"))
}

fn store(client: &MockIpamClient, name: &str, block_name: &str, cidr: String) -> Allocation {
    let allocation = Allocation {
        id: new_id(),
        name: name.to_string(),
        block_name: block_name.to_string(),
        cidr,
    };
    lock(&client.allocations).push(allocation.clone());
    allocation
}

pub(super) fn list(client: &MockIpamClient, filter: &AllocationFilter, options: ListOptions) -> Result<AllocationList, IpamError> {
    client.record(R, Verb::List, None)?;
    let matching: Vec<Allocation> = lock(&client.allocations)
        .iter()
        .filter(|a| filter.name.as_ref().is_none_or(|n| a.name.contains(n.as_str())))
        .filter(|a| filter.block_name.as_ref().is_none_or(|b| &a.block_name == b))
        .cloned()
        .collect();
    let (allocations, total) = paginate(&matching, options);
    Ok(AllocationList { allocations, total })
}

pub(super) fn get(client: &MockIpamClient, id: &str) -> Result<Allocation, IpamError> {
    client.record(R, Verb::Get, Some(id))?;
    if client.behaviour().allocation_get_not_found {
        return Err(not_found(Verb::Get, R, id, "allocation"));
    }
    client
        .allocation(id)
        .ok_or_else(|| not_found(Verb::Get, R, id, "allocation"))
}

pub(super) fn create(client: &MockIpamClient, request: &CreateAllocationRequest) -> Result<Allocation, IpamError> {
    client.record(R, Verb::Create, None)?;
    let block_net = parent_net(client, Verb::Create, &request.name, &request.block_name)?;
    let net = parse_cidr(&request.cidr)
        .ok_or_else(|| bad_request(Verb::Create, R, &format!("invalid cidr {:?}", request.cidr)))?;
    if !block_net.contains(&net) {
        return Err(bad_request(Verb::Create, R, "allocation CIDR must be within block CIDR"));
    }
    if occupied(client, &request.block_name).iter().any(|t| overlaps(t, &net)) {
        return Err(conflict(Verb::Create, R, "allocation CIDR overlaps an existing allocation"));
    }

    let cidr = client
        .behaviour()
        .rewrite_allocation_cidr
        .unwrap_or_else(|| request.cidr.trim().to_string());
    Ok(store(client, &request.name, &request.block_name, cidr))
}

/// First fit: walk the block's subnets of the requested size in address
/// order and take the first one that overlaps nothing.
pub(super) fn auto_allocate(client: &MockIpamClient, request: &AutoAllocateRequest) -> Result<Allocation, IpamError> {
    client.record(R, Verb::AutoAllocate, None)?;
    let block_net = parent_net(client, Verb::AutoAllocate, &request.name, &request.block_name)?;
    if request.prefix_length < block_net.prefix_len() || request.prefix_length > block_net.max_prefix_len() {
        return Err(bad_request(
            Verb::AutoAllocate,
            R,
            &format!("prefix length /{} does not fit in block {}", request.prefix_length, block_net),
        ));
    }

    let taken = occupied(client, &request.block_name);
    let subnets = block_net
        .trunc()
        .subnets(request.prefix_length)
        .map_err(|e| bad_request(Verb::AutoAllocate, R, &e.to_string()))?;
    let free = subnets
        .into_iter()
        .find(|candidate| !taken.iter().any(|t| overlaps(t, candidate)))
        .ok_or_else(|| {
            conflict(
                Verb::AutoAllocate,
                R,
                &format!("no available /{} in block {:?}", request.prefix_length, request.block_name),
            )
        })?;
    Ok(store(client, &request.name, &request.block_name, free.to_string()))
}

pub(super) fn update(client: &MockIpamClient, id: &str, request: &UpdateAllocationRequest) -> Result<Allocation, IpamError> {
    client.record(R, Verb::Update, Some(id))?;
    let mut allocations = lock(&client.allocations);
    let allocation = allocations
        .iter_mut()
        .find(|a| a.id == id)
        .ok_or_else(|| not_found(Verb::Update, R, id, "allocation"))?;
    allocation.name = request.name.clone();
    Ok(allocation.clone())
}

pub(super) fn delete(client: &MockIpamClient, id: &str) -> Result<(), IpamError> {
    client.record(R, Verb::Delete, Some(id))?;
    let mut allocations = lock(&client.allocations);
    let before = allocations.len();
    allocations.retain(|a| a.id != id);
    if allocations.len() == before {
        return Err(not_found(Verb::Delete, R, id, "allocation"));
    }
    Ok(())
}
