//! IpamClient trait for mocking
//!
//! This trait abstracts the IpamClient so the reconciler can take the client
//! as an injected dependency. The concrete IpamClient implements it, and tests
//! use the in-memory `MockIpamClient` (feature `test-util`).

use crate::error::IpamError;
use crate::models::*;

/// Trait for IPAM API client operations
///
/// One method per resource kind and verb. All async methods must be `Send` to
/// work with Tokio's work-stealing runtime. No method retries.
#[async_trait::async_trait]
pub trait IpamClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    /// Check connectivity and credentials with a minimal authenticated request
    async fn validate_token(&self) -> Result<(), IpamError>;

    // Environments
    async fn list_environments(&self, filter: &EnvironmentFilter, options: ListOptions) -> Result<EnvironmentList, IpamError>;
    async fn get_environment(&self, id: &str) -> Result<EnvironmentDetail, IpamError>;
    async fn create_environment(&self, request: &CreateEnvironmentRequest) -> Result<Environment, IpamError>;
    async fn update_environment(&self, id: &str, request: &UpdateEnvironmentRequest) -> Result<Environment, IpamError>;
    async fn delete_environment(&self, id: &str) -> Result<(), IpamError>;

    // Pools
    async fn list_pools(&self, filter: &PoolFilter, options: ListOptions) -> Result<PoolList, IpamError>;
    async fn get_pool(&self, id: &str) -> Result<Pool, IpamError>;
    async fn create_pool(&self, request: &CreatePoolRequest) -> Result<Pool, IpamError>;
    async fn update_pool(&self, id: &str, request: &UpdatePoolRequest) -> Result<Pool, IpamError>;
    async fn delete_pool(&self, id: &str) -> Result<(), IpamError>;

    // Blocks
    async fn list_blocks(&self, filter: &BlockFilter, options: ListOptions) -> Result<BlockList, IpamError>;
    async fn get_block(&self, id: &str) -> Result<Block, IpamError>;
    async fn create_block(&self, request: &CreateBlockRequest) -> Result<Block, IpamError>;
    async fn update_block(&self, id: &str, request: &UpdateBlockRequest) -> Result<Block, IpamError>;
    async fn delete_block(&self, id: &str) -> Result<(), IpamError>;

    // Allocations
    async fn list_allocations(&self, filter: &AllocationFilter, options: ListOptions) -> Result<AllocationList, IpamError>;
    async fn get_allocation(&self, id: &str) -> Result<Allocation, IpamError>;
    async fn create_allocation(&self, request: &CreateAllocationRequest) -> Result<Allocation, IpamError>;
    async fn auto_allocate(&self, request: &AutoAllocateRequest) -> Result<Allocation, IpamError>;
    async fn update_allocation(&self, id: &str, request: &UpdateAllocationRequest) -> Result<Allocation, IpamError>;
    async fn delete_allocation(&self, id: &str) -> Result<(), IpamError>;

    // Reserved blocks
    async fn list_reserved_blocks(&self, filter: &ReservedBlockFilter, options: ListOptions) -> Result<ReservedBlockList, IpamError>;
    async fn get_reserved_block(&self, id: &str) -> Result<ReservedBlock, IpamError>;
    async fn create_reserved_block(&self, request: &CreateReservedBlockRequest) -> Result<ReservedBlock, IpamError>;
    async fn update_reserved_block(&self, id: &str, request: &UpdateReservedBlockRequest) -> Result<ReservedBlock, IpamError>;
    async fn delete_reserved_block(&self, id: &str) -> Result<(), IpamError>;
}
