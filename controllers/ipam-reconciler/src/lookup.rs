//! Lookups that need more than a get-by-ID
//!
//! Some deployments answer 404 to an allocation get-by-ID even right after
//! creating it, and reserved blocks are read by listing. Both go through a
//! paginated list and insist on exactly one match.

use crate::error::{Operation, ReconcileError};
use ipam_client::{
    Allocation, AllocationFilter, IpamClientTrait, IpamError, ListOptions, PoolFilter, Pool, ReservedBlock,
    ReservedBlockFilter,
};
use ipam_declarations::ResourceKind;
use std::future::Future;
use tracing::{debug, warn};

/// Page size used when walking a list
pub const PAGE_SIZE: u32 = 500;

/// Upper bound on pages fetched by one walk
const MAX_PAGES: u32 = 1_000;

/// Fetch every page of a list. `fetch` returns one page and the total the
/// service reported (0 when it did not say).
pub async fn collect_all<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, IpamError>
where
    F: FnMut(ListOptions) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, u64), IpamError>>,
{
    let mut items = Vec::new();
    for page in 0..MAX_PAGES {
        let (batch, total) = fetch(ListOptions::page(PAGE_SIZE, page * PAGE_SIZE)).await?;
        let short = batch.len() < PAGE_SIZE as usize;
        items.extend(batch);
        if short || (total > 0 && items.len() as u64 >= total) {
            return Ok(items);
        }
    }
    warn!("List still had more results after {} pages, stopping", MAX_PAGES);
    Ok(items)
}

/// Exactly one element, or an ambiguous-lookup error
fn exactly_one<T>(mut matches: Vec<T>, operation: Operation, kind: ResourceKind, target: &str) -> Result<T, ReconcileError> {
    if matches.len() == 1 {
        if let Some(only) = matches.pop() {
            return Ok(only);
        }
    }
    Err(ReconcileError::AmbiguousLookup {
        operation,
        kind,
        target: target.to_string(),
        matches: matches.len(),
    })
}

/// Natural key of an allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationKey<'a> {
    pub name: &'a str,
    pub block_name: &'a str,
}

impl std::fmt::Display for AllocationKey<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.block_name, self.name)
    }
}

/// Find an allocation by its `(name, block_name)` pair.
///
/// The service's `name` filter is a substring match, so the page is
/// narrowed to exact matches before counting.
pub async fn find_allocation(
    client: &dyn IpamClientTrait,
    key: AllocationKey<'_>,
    operation: Operation,
) -> Result<Allocation, ReconcileError> {
    let filter = AllocationFilter {
        name: Some(key.name.to_string()),
        block_name: Some(key.block_name.to_string()),
    };
    let filter = &filter;
    let listed = collect_all(|options| async move {
        let page = client.list_allocations(filter, options).await?;
        Ok((page.allocations, page.total))
    })
    .await
    .map_err(|e| ReconcileError::from_client(operation, ResourceKind::Allocation, key.to_string(), e))?;

    let matches: Vec<Allocation> = listed
        .into_iter()
        .filter(|a| a.name == key.name && a.block_name == key.block_name)
        .collect();
    exactly_one(matches, operation, ResourceKind::Allocation, &key.to_string())
}

/// Resolve an allocation by ID, falling back to its natural key when the
/// service answers not-found and the key is known.
pub async fn resolve_allocation(
    client: &dyn IpamClientTrait,
    id: Option<&str>,
    key: Option<AllocationKey<'_>>,
    operation: Operation,
) -> Result<Allocation, ReconcileError> {
    let Some(id) = id else {
        return match key {
            Some(key) => find_allocation(client, key, operation).await,
            None => Err(ReconcileError::AmbiguousLookup {
                operation,
                kind: ResourceKind::Allocation,
                target: "<no id or name>".to_string(),
                matches: 0,
            }),
        };
    };

    match client.get_allocation(id).await {
        Ok(allocation) => Ok(allocation),
        Err(e) if e.is_not_found() => match key {
            Some(key) => {
                debug!("Allocation {} not found by ID, looking up {}", id, key);
                let found = find_allocation(client, key, operation).await?;
                if found.id != id {
                    warn!("Allocation {} resolved by name to a different ID {}", id, found.id);
                }
                Ok(found)
            }
            None => Err(ReconcileError::from_client(operation, ResourceKind::Allocation, id, e)),
        },
        Err(e) => Err(ReconcileError::from_client(operation, ResourceKind::Allocation, id, e)),
    }
}

/// Read a reserved block by listing them all and matching the ID
pub async fn find_reserved_block(
    client: &dyn IpamClientTrait,
    id: &str,
    operation: Operation,
) -> Result<ReservedBlock, ReconcileError> {
    let filter = ReservedBlockFilter::default();
    let filter = &filter;
    let listed = collect_all(|options| async move {
        let page = client.list_reserved_blocks(filter, options).await?;
        Ok((page.reserved_blocks, page.total))
    })
    .await
    .map_err(|e| ReconcileError::from_client(operation, ResourceKind::ReservedBlock, id, e))?;

    let matches: Vec<ReservedBlock> = listed.into_iter().filter(|r| r.id == id).collect();
    if matches.is_empty() {
        let missing = IpamError::NotFound {
            method: "GET".to_string(),
            path: "/api/reserved-blocks".to_string(),
            message: format!("reserved block {} not found", id),
        };
        return Err(ReconcileError::from_client(operation, ResourceKind::ReservedBlock, id, missing));
    }
    exactly_one(matches, operation, ResourceKind::ReservedBlock, id)
}

/// Every pool of an environment, in service order
pub async fn environment_pools(
    client: &dyn IpamClientTrait,
    environment_id: &str,
    operation: Operation,
) -> Result<Vec<Pool>, ReconcileError> {
    let filter = PoolFilter {
        environment_id: Some(environment_id.to_string()),
    };
    let filter = &filter;
    collect_all(|options| async move {
        let page = client.list_pools(filter, options).await?;
        Ok((page.pools, page.total))
    })
    .await
    .map_err(|e| ReconcileError::from_client(operation, ResourceKind::Environment, environment_id, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipam_client::mock::{MockBehaviour, Resource, Verb};
    use ipam_client::MockIpamClient;

    fn allocation(id: &str, name: &str, block_name: &str, cidr: &str) -> Allocation {
        Allocation {
            id: id.to_string(),
            name: name.to_string(),
            block_name: block_name.to_string(),
            cidr: cidr.to_string(),
        }
    }

    const KEY: AllocationKey<'static> = AllocationKey {
        name: "web",
        block_name: "edge",
    };

    #[tokio::test]
    async fn test_collect_all_walks_pages() {
        let pages = std::sync::Mutex::new(Vec::new());
        let items = collect_all(|options| {
            pages.lock().unwrap().push(options);
            let offset = options.offset.unwrap_or(0);
            async move {
                let len = if offset == 0 { PAGE_SIZE as usize } else { 3 };
                Ok((vec![0u8; len], 0))
            }
        })
        .await
        .unwrap();
        assert_eq!(items.len(), PAGE_SIZE as usize + 3);
        assert_eq!(
            *pages.lock().unwrap(),
            vec![ListOptions::page(PAGE_SIZE, 0), ListOptions::page(PAGE_SIZE, PAGE_SIZE)]
        );
    }

    #[tokio::test]
    async fn test_collect_all_stops_at_reported_total() {
        let items = collect_all(|_| async { Ok((vec![1u8; PAGE_SIZE as usize], u64::from(PAGE_SIZE))) })
            .await
            .unwrap();
        assert_eq!(items.len(), PAGE_SIZE as usize);
    }

    #[tokio::test]
    async fn test_resolve_by_id() {
        let mock = MockIpamClient::default();
        mock.add_allocation(allocation("a-1", "web", "edge", "10.0.0.0/26"));
        let found = resolve_allocation(&mock, Some("a-1"), Some(KEY), Operation::Read).await.unwrap();
        assert_eq!(found.id, "a-1");
        assert_eq!(mock.call_count(Resource::Allocation, Verb::List), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_natural_key_on_not_found() {
        let mock = MockIpamClient::default();
        mock.add_allocation(allocation("a-1", "web", "edge", "10.0.0.0/26"));
        // substring match on name, must not count
        mock.add_allocation(allocation("a-2", "web-2", "edge", "10.0.0.64/26"));
        mock.set_behaviour(MockBehaviour {
            allocation_get_not_found: true,
            ..MockBehaviour::default()
        });

        let found = resolve_allocation(&mock, Some("a-1"), Some(KEY), Operation::Read).await.unwrap();
        assert_eq!(found.cidr, "10.0.0.0/26");
        assert_eq!(mock.call_count(Resource::Allocation, Verb::Get), 1);
        assert_eq!(mock.call_count(Resource::Allocation, Verb::List), 1);
    }

    #[tokio::test]
    async fn test_no_fallback_without_key() {
        let mock = MockIpamClient::default();
        let err = resolve_allocation(&mock, Some("a-404"), None, Operation::Import).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(mock.call_count(Resource::Allocation, Verb::List), 0);
    }

    #[tokio::test]
    async fn test_zero_matches_is_ambiguous() {
        let mock = MockIpamClient::default();
        let err = resolve_allocation(&mock, None, Some(KEY), Operation::Read).await.unwrap_err();
        assert!(matches!(err, ReconcileError::AmbiguousLookup { matches: 0, .. }));
    }

    #[tokio::test]
    async fn test_two_matches_is_ambiguous() {
        let mock = MockIpamClient::default();
        mock.add_allocation(allocation("a-1", "web", "edge", "10.0.0.0/26"));
        mock.add_allocation(allocation("a-2", "web", "edge", "10.0.0.64/26"));
        let err = find_allocation(&mock, KEY, Operation::Read).await.unwrap_err();
        assert!(matches!(err, ReconcileError::AmbiguousLookup { matches: 2, .. }));
    }

    #[tokio::test]
    async fn test_other_errors_do_not_fall_back() {
        let mock = MockIpamClient::default();
        mock.fail_next(Resource::Allocation, Verb::Get, 500, "boom");
        let err = resolve_allocation(&mock, Some("a-1"), Some(KEY), Operation::Read).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Transport { .. }));
        assert_eq!(mock.call_count(Resource::Allocation, Verb::List), 0);
    }

    #[tokio::test]
    async fn test_reserved_block_missing_is_not_found() {
        let mock = MockIpamClient::default();
        let err = find_reserved_block(&mock, "r-1", Operation::Read).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
