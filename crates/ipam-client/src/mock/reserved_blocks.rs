//! Reserved block operations for MockIpamClient

use super::helpers::{bad_request, new_id, not_found, paginate, parse_cidr};
use super::{MockIpamClient, Resource, Verb, lock};
use crate::error::IpamError;
use crate::models::*;

const R: Resource = Resource::ReservedBlock;

pub(super) fn list(client: &MockIpamClient, filter: &ReservedBlockFilter, options: ListOptions) -> Result<ReservedBlockList, IpamError> {
    client.record(R, Verb::List, None)?;
    let matching: Vec<ReservedBlock> = lock(&client.reserved_blocks)
        .iter()
        .filter(|r| {
            filter
                .name
                .as_ref()
                .is_none_or(|n| r.name.as_ref().is_some_and(|name| name.contains(n.as_str())))
        })
        .cloned()
        .collect();
    let (reserved_blocks, total) = paginate(&matching, options);
    Ok(ReservedBlockList { reserved_blocks, total })
}

pub(super) fn get(client: &MockIpamClient, id: &str) -> Result<ReservedBlock, IpamError> {
    client.record(R, Verb::Get, Some(id))?;
    lock(&client.reserved_blocks)
        .iter()
        .find(|r| r.id == id)
        .cloned()
        .ok_or_else(|| not_found(Verb::Get, R, id, "reserved block"))
}

pub(super) fn create(client: &MockIpamClient, request: &CreateReservedBlockRequest) -> Result<ReservedBlock, IpamError> {
    client.record(R, Verb::Create, None)?;
    if parse_cidr(&request.cidr).is_none() {
        return Err(bad_request(Verb::Create, R, &format!("invalid cidr {:?}", request.cidr)));
    }
    let reserved = ReservedBlock {
        id: new_id(),
        name: request.name.clone().filter(|n| !n.is_empty()),
        cidr: request.cidr.trim().to_string(),
        reason: request.reason.clone().filter(|r| !r.is_empty()),
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    lock(&client.reserved_blocks).push(reserved.clone());
    Ok(reserved)
}

/// Name only; `cidr`, `reason` and `created_at` stay as they were
pub(super) fn update(client: &MockIpamClient, id: &str, request: &UpdateReservedBlockRequest) -> Result<ReservedBlock, IpamError> {
    client.record(R, Verb::Update, Some(id))?;
    let mut reserved = lock(&client.reserved_blocks);
    let entry = reserved
        .iter_mut()
        .find(|r| r.id == id)
        .ok_or_else(|| not_found(Verb::Update, R, id, "reserved block"))?;
    entry.name = Some(request.name.clone()).filter(|n| !n.is_empty());
    Ok(entry.clone())
}

pub(super) fn delete(client: &MockIpamClient, id: &str) -> Result<(), IpamError> {
    client.record(R, Verb::Delete, Some(id))?;
    let mut reserved = lock(&client.reserved_blocks);
    let before = reserved.len();
    reserved.retain(|r| r.id != id);
    if reserved.len() == before {
        return Err(not_found(Verb::Delete, R, id, "reserved block"));
    }
    Ok(())
}
