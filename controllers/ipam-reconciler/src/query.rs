//! Read-only lookups
//!
//! Fetch one entity, or list entities with the service's filters, without
//! reading or writing recorded state. Lists are walked to the last page.

use crate::error::{Operation, ReconcileError};
use crate::lookup::{AllocationKey, collect_all, find_reserved_block, resolve_allocation};
use ipam_client::{
    Allocation, AllocationFilter, Block, BlockFilter, Environment, EnvironmentDetail, EnvironmentFilter, IpamClientTrait,
    IpamError, Pool, PoolFilter, ReservedBlock, ReservedBlockFilter,
};
use ipam_declarations::ResourceKind;
use serde::Serialize;

/// How to find a single entity. Every kind takes an ID; allocations also
/// take their `(name, block_name)` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lookup {
    pub id: Option<String>,
    pub name: Option<String>,
    pub block_name: Option<String>,
}

/// List filters. Each kind accepts a subset:
///
/// | kind | filters |
/// |---|---|
/// | environment | name |
/// | pool | environment_id |
/// | block | name, environment_id, orphaned_only |
/// | allocation | name, block_name |
/// | reserved block | name |
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub name: Option<String>,
    pub environment_id: Option<String>,
    pub block_name: Option<String>,
    pub orphaned_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Found {
    Environment(EnvironmentDetail),
    Pool(Pool),
    Block(Block),
    Allocation(Allocation),
    ReservedBlock(ReservedBlock),
}

/// A listing, keyed the way the service keys its list responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Listed {
    Environments(Vec<Environment>),
    Pools(Vec<Pool>),
    Blocks(Vec<Block>),
    Allocations(Vec<Allocation>),
    ReservedBlocks(Vec<ReservedBlock>),
}

impl Listed {
    pub fn len(&self) -> usize {
        match self {
            Listed::Environments(v) => v.len(),
            Listed::Pools(v) => v.len(),
            Listed::Blocks(v) => v.len(),
            Listed::Allocations(v) => v.len(),
            Listed::ReservedBlocks(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fetch one entity
pub async fn get(client: &dyn IpamClientTrait, kind: ResourceKind, lookup: &Lookup) -> Result<Found, ReconcileError> {
    let found = match kind {
        ResourceKind::Environment => {
            let id = id_only(kind, lookup)?;
            Found::Environment(client.get_environment(id).await.map_err(|e| read_error(kind, id, e))?)
        }
        ResourceKind::Pool => {
            let id = id_only(kind, lookup)?;
            Found::Pool(client.get_pool(id).await.map_err(|e| read_error(kind, id, e))?)
        }
        ResourceKind::Block => {
            let id = id_only(kind, lookup)?;
            Found::Block(client.get_block(id).await.map_err(|e| read_error(kind, id, e))?)
        }
        ResourceKind::ReservedBlock => {
            let id = id_only(kind, lookup)?;
            Found::ReservedBlock(find_reserved_block(client, id, Operation::Read).await?)
        }
        ResourceKind::Allocation => Found::Allocation(allocation(client, lookup).await?),
    };
    Ok(found)
}

/// By ID, falling back to the name pair on not-found; or by the name pair
/// alone
async fn allocation(client: &dyn IpamClientTrait, lookup: &Lookup) -> Result<Allocation, ReconcileError> {
    // allocation IDs are lowercase UUIDs
    let id = non_empty(&lookup.id).map(str::to_ascii_lowercase);
    let key = match (non_empty(&lookup.name), non_empty(&lookup.block_name)) {
        (Some(name), Some(block_name)) => Some(AllocationKey { name, block_name }),
        _ => None,
    };
    if id.is_none() && key.is_none() {
        return Err(ReconcileError::InvalidConfig(
            "allocation lookups need --id or both --name and --block-name".to_string(),
        ));
    }
    resolve_allocation(client, id.as_deref(), key, Operation::Read).await
}

/// List entities of one kind
pub async fn list(client: &dyn IpamClientTrait, kind: ResourceKind, filter: &ListFilter) -> Result<Listed, ReconcileError> {
    check_filters(kind, filter)?;

    let listed = match kind {
        ResourceKind::Environment => {
            let query = EnvironmentFilter {
                name: filter.name.clone(),
            };
            let query = &query;
            Listed::Environments(
                collect_all(|options| async move {
                    let page = client.list_environments(query, options).await?;
                    Ok((page.environments, page.total))
                })
                .await
                .map_err(|e| read_error(kind, "list", e))?,
            )
        }
        ResourceKind::Pool => {
            let query = PoolFilter {
                environment_id: filter.environment_id.clone(),
            };
            let query = &query;
            Listed::Pools(
                collect_all(|options| async move {
                    let page = client.list_pools(query, options).await?;
                    Ok((page.pools, page.total))
                })
                .await
                .map_err(|e| read_error(kind, "list", e))?,
            )
        }
        ResourceKind::Block => {
            let query = BlockFilter {
                name: filter.name.clone(),
                environment_id: filter.environment_id.clone(),
                orphaned_only: filter.orphaned_only.then_some(true),
            };
            let query = &query;
            Listed::Blocks(
                collect_all(|options| async move {
                    let page = client.list_blocks(query, options).await?;
                    Ok((page.blocks, page.total))
                })
                .await
                .map_err(|e| read_error(kind, "list", e))?,
            )
        }
        ResourceKind::Allocation => {
            let query = AllocationFilter {
                name: filter.name.clone(),
                block_name: filter.block_name.clone(),
            };
            let query = &query;
            Listed::Allocations(
                collect_all(|options| async move {
                    let page = client.list_allocations(query, options).await?;
                    Ok((page.allocations, page.total))
                })
                .await
                .map_err(|e| read_error(kind, "list", e))?,
            )
        }
        ResourceKind::ReservedBlock => {
            let query = ReservedBlockFilter {
                name: filter.name.clone(),
            };
            let query = &query;
            Listed::ReservedBlocks(
                collect_all(|options| async move {
                    let page = client.list_reserved_blocks(query, options).await?;
                    Ok((page.reserved_blocks, page.total))
                })
                .await
                .map_err(|e| read_error(kind, "list", e))?,
            )
        }
    };
    Ok(listed)
}

/// Refuse filters the kind's list endpoint does not take, rather than
/// silently ignoring them
fn check_filters(kind: ResourceKind, filter: &ListFilter) -> Result<(), ReconcileError> {
    let given = [
        ("--name", filter.name.is_some()),
        ("--environment-id", filter.environment_id.is_some()),
        ("--block-name", filter.block_name.is_some()),
        ("--orphaned-only", filter.orphaned_only),
    ];
    let accepted: &[&str] = match kind {
        ResourceKind::Environment | ResourceKind::ReservedBlock => &["--name"],
        ResourceKind::Pool => &["--environment-id"],
        ResourceKind::Block => &["--name", "--environment-id", "--orphaned-only"],
        ResourceKind::Allocation => &["--name", "--block-name"],
    };
    match given.iter().find(|(flag, set)| *set && !accepted.contains(flag)) {
        Some((flag, _)) => Err(ReconcileError::InvalidConfig(format!("{kind} lists do not take {flag}"))),
        None => Ok(()),
    }
}

fn id_only(kind: ResourceKind, lookup: &Lookup) -> Result<&str, ReconcileError> {
    if lookup.name.is_some() || lookup.block_name.is_some() {
        return Err(ReconcileError::InvalidConfig(format!("{kind} lookups take --id only")));
    }
    non_empty(&lookup.id).ok_or_else(|| ReconcileError::InvalidConfig(format!("--id is required for {kind}")))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn read_error(kind: ResourceKind, target: &str, e: IpamError) -> ReconcileError {
    ReconcileError::from_client(Operation::Read, kind, target, e)
}
