//! IPAM API models
//!
//! These models match the JSON bodies of the IPAM REST API. Response types
//! carry every field the service returns, including computed ones; request
//! types carry only what the service accepts on write.

use serde::{Deserialize, Deserializer, Serialize};

/// Treat `""` the same as an absent value. The service reports orphaned
/// blocks with an empty `environment_id` rather than omitting it.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// Pagination options for list endpoints. Unset values are not sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListOptions {
    /// A single page starting at `offset`.
    #[must_use]
    pub fn page(limit: u32, offset: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: (offset > 0).then_some(offset),
        }
    }
}

// ---------------------------------------------------------------------------
// Environments
// ---------------------------------------------------------------------------

/// Environment as returned by create, update and list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Environment {
    pub id: String,
    pub name: String,
    /// Only present on create; update responses omit it.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub initial_pool_id: Option<String>,
    /// Pool IDs in the order the pools were supplied at creation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pool_ids: Vec<String>,
}

/// Environment detail returned by `GET /api/environments/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvironmentDetail {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvironmentList {
    pub environments: Vec<Environment>,
    #[serde(default)]
    pub total: u64,
}

/// One pool supplied when creating an environment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolInput {
    pub name: String,
    pub cidr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateEnvironmentRequest {
    pub name: String,
    pub pools: Vec<PoolInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateEnvironmentRequest {
    pub name: String,
}

/// Filters for `GET /api/environments`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentFilter {
    /// Substring match on name
    pub name: Option<String>,
}

// ---------------------------------------------------------------------------
// Pools
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pool {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub organization_id: Option<String>,
    pub environment_id: String,
    pub name: String,
    pub cidr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolList {
    pub pools: Vec<Pool>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatePoolRequest {
    pub environment_id: String,
    pub name: String,
    pub cidr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdatePoolRequest {
    pub name: String,
    pub cidr: String,
}

/// Filters for `GET /api/pools`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolFilter {
    pub environment_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// Network block. IP counts are decimal strings: an IPv6 block can hold more
/// addresses than fit in a 64-bit integer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    pub id: String,
    pub name: String,
    pub cidr: String,
    pub total_ips: String,
    pub used_ips: String,
    pub available_ips: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub environment_id: Option<String>,
    /// Set for orphaned blocks
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub pool_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockList {
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateBlockRequest {
    pub name: String,
    pub cidr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_id: Option<String>,
}

/// Block update; the CIDR cannot be changed in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateBlockRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_id: Option<String>,
}

/// Filters for `GET /api/blocks`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockFilter {
    /// Substring match on name
    pub name: Option<String>,
    pub environment_id: Option<String>,
    pub orphaned_only: Option<bool>,
}

// ---------------------------------------------------------------------------
// Allocations
// ---------------------------------------------------------------------------

/// Allocation (subnet within a block). The parent block is referenced by name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Allocation {
    pub id: String,
    pub name: String,
    pub block_name: String,
    pub cidr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllocationList {
    pub allocations: Vec<Allocation>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateAllocationRequest {
    pub name: String,
    pub block_name: String,
    pub cidr: String,
}

/// Body of `POST /api/allocations/auto`: the service picks the next free
/// range of `prefix_length` inside the block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutoAllocateRequest {
    pub name: String,
    pub block_name: String,
    pub prefix_length: u8,
}

/// Allocation update (name only)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateAllocationRequest {
    pub name: String,
}

/// Filters for `GET /api/allocations`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationFilter {
    /// Substring match on name
    pub name: Option<String>,
    pub block_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Reserved blocks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservedBlock {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub name: Option<String>,
    pub cidr: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub reason: Option<String>,
    /// RFC 3339 creation time
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservedBlockList {
    pub reserved_blocks: Vec<ReservedBlock>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateReservedBlockRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub cidr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Reserved block update (name only; `cidr` and `reason` are create-only)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateReservedBlockRequest {
    pub name: String,
}

/// Filters for `GET /api/reserved-blocks`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservedBlockFilter {
    pub name: Option<String>,
}
