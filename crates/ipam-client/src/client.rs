//! IPAM API client
//!
//! Implements the IPAM REST API client. Routes live under `/api`:
//! `/api/environments`, `/api/pools`, `/api/blocks`, `/api/allocations`
//! (plus `/api/allocations/auto`) and `/api/reserved-blocks`.

use crate::common::query::list_query;
use crate::common::{HttpClient, path_segment};
use crate::error::IpamError;
use crate::ipam_trait::IpamClientTrait;
use crate::models::*;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// IPAM API client
#[derive(Debug, Clone)]
pub struct IpamClient {
    http: HttpClient,
}

impl IpamClient {
    /// Create a new IPAM client
    ///
    /// # Arguments
    /// * `base_url` - IPAM service base URL (e.g., "http://ipam:8080")
    /// * `token` - Bearer token for authentication
    pub fn new(base_url: String, token: String) -> Result<Self, IpamError> {
        Self::with_timeout(base_url, token, DEFAULT_TIMEOUT)
    }

    /// Create a new IPAM client with a custom request timeout
    pub fn with_timeout(base_url: String, token: String, timeout: Duration) -> Result<Self, IpamError> {
        let client = Client::builder().timeout(timeout).build().map_err(IpamError::Http)?;
        Self::with_http_client(client, base_url, token)
    }

    /// Create a client around an existing `reqwest::Client`
    pub fn with_http_client(client: Client, base_url: String, token: String) -> Result<Self, IpamError> {
        if base_url.trim().is_empty() {
            return Err(IpamError::InvalidRequest("IPAM endpoint must not be empty".to_string()));
        }
        if token.trim().is_empty() {
            return Err(IpamError::InvalidRequest("IPAM token must not be empty".to_string()));
        }

        Ok(Self {
            http: HttpClient::new(client, base_url, token),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// Validate the API token by making a simple authenticated request.
    ///
    /// Lists at most one environment; any non-2xx answer (401/403 in
    /// particular) is returned as an error.
    pub async fn validate_token(&self) -> Result<(), IpamError> {
        debug!("Validating IPAM token and connectivity");
        let path = HttpClient::with_query("/api/environments", &[("limit", "1".to_string())]);
        let _: EnvironmentList = self.http.get(&path).await?;
        debug!("Token validated successfully");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Environments
    // -----------------------------------------------------------------------

    /// List environments
    pub async fn list_environments(&self, filter: &EnvironmentFilter, options: ListOptions) -> Result<EnvironmentList, IpamError> {
        let path = HttpClient::with_query("/api/environments", &list_query(filter, options));
        self.http.get(&path).await
    }

    /// Get an environment with its blocks
    pub async fn get_environment(&self, id: &str) -> Result<EnvironmentDetail, IpamError> {
        debug!("Fetching environment {} from IPAM", id);
        self.http.get(&format!("/api/environments/{}", path_segment(id))).await
    }

    /// Create an environment together with its initial pools
    pub async fn create_environment(&self, request: &CreateEnvironmentRequest) -> Result<Environment, IpamError> {
        if request.pools.is_empty() {
            return Err(IpamError::InvalidRequest("environment requires at least one pool".to_string()));
        }
        self.http.post("/api/environments", request).await
    }

    /// Rename an environment. The response does not include `pool_ids`.
    pub async fn update_environment(&self, id: &str, request: &UpdateEnvironmentRequest) -> Result<Environment, IpamError> {
        self.http.put(&format!("/api/environments/{}", path_segment(id)), request).await
    }

    pub async fn delete_environment(&self, id: &str) -> Result<(), IpamError> {
        self.http.delete(&format!("/api/environments/{}", path_segment(id))).await
    }

    // -----------------------------------------------------------------------
    // Pools
    // -----------------------------------------------------------------------

    pub async fn list_pools(&self, filter: &PoolFilter, options: ListOptions) -> Result<PoolList, IpamError> {
        let path = HttpClient::with_query("/api/pools", &list_query(filter, options));
        self.http.get(&path).await
    }

    pub async fn get_pool(&self, id: &str) -> Result<Pool, IpamError> {
        debug!("Fetching pool {} from IPAM", id);
        self.http.get(&format!("/api/pools/{}", path_segment(id))).await
    }

    pub async fn create_pool(&self, request: &CreatePoolRequest) -> Result<Pool, IpamError> {
        self.http.post("/api/pools", request).await
    }

    pub async fn update_pool(&self, id: &str, request: &UpdatePoolRequest) -> Result<Pool, IpamError> {
        self.http.put(&format!("/api/pools/{}", path_segment(id)), request).await
    }

    pub async fn delete_pool(&self, id: &str) -> Result<(), IpamError> {
        self.http.delete(&format!("/api/pools/{}", path_segment(id))).await
    }

    // -----------------------------------------------------------------------
    // Blocks
    // -----------------------------------------------------------------------

    pub async fn list_blocks(&self, filter: &BlockFilter, options: ListOptions) -> Result<BlockList, IpamError> {
        let path = HttpClient::with_query("/api/blocks", &list_query(filter, options));
        self.http.get(&path).await
    }

    pub async fn get_block(&self, id: &str) -> Result<Block, IpamError> {
        debug!("Fetching block {} from IPAM", id);
        self.http.get(&format!("/api/blocks/{}", path_segment(id))).await
    }

    pub async fn create_block(&self, request: &CreateBlockRequest) -> Result<Block, IpamError> {
        self.http.post("/api/blocks", request).await
    }

    pub async fn update_block(&self, id: &str, request: &UpdateBlockRequest) -> Result<Block, IpamError> {
        self.http.put(&format!("/api/blocks/{}", path_segment(id)), request).await
    }

    pub async fn delete_block(&self, id: &str) -> Result<(), IpamError> {
        self.http.delete(&format!("/api/blocks/{}", path_segment(id))).await
    }

    // -----------------------------------------------------------------------
    // Allocations
    // -----------------------------------------------------------------------

    pub async fn list_allocations(&self, filter: &AllocationFilter, options: ListOptions) -> Result<AllocationList, IpamError> {
        let path = HttpClient::with_query("/api/allocations", &list_query(filter, options));
        self.http.get(&path).await
    }

    pub async fn get_allocation(&self, id: &str) -> Result<Allocation, IpamError> {
        debug!("Fetching allocation {} from IPAM", id);
        self.http.get(&format!("/api/allocations/{}", path_segment(id))).await
    }

    /// Create an allocation with an explicit CIDR
    pub async fn create_allocation(&self, request: &CreateAllocationRequest) -> Result<Allocation, IpamError> {
        self.http.post("/api/allocations", request).await
    }

    /// Ask the service for the next free range of `prefix_length` in the block
    pub async fn auto_allocate(&self, request: &AutoAllocateRequest) -> Result<Allocation, IpamError> {
        self.http.post("/api/allocations/auto", request).await
    }

    pub async fn update_allocation(&self, id: &str, request: &UpdateAllocationRequest) -> Result<Allocation, IpamError> {
        self.http.put(&format!("/api/allocations/{}", path_segment(id)), request).await
    }

    pub async fn delete_allocation(&self, id: &str) -> Result<(), IpamError> {
        self.http.delete(&format!("/api/allocations/{}", path_segment(id))).await
    }

    // -----------------------------------------------------------------------
    // Reserved blocks
    // -----------------------------------------------------------------------

    pub async fn list_reserved_blocks(&self, filter: &ReservedBlockFilter, options: ListOptions) -> Result<ReservedBlockList, IpamError> {
        let path = HttpClient::with_query("/api/reserved-blocks", &list_query(filter, options));
        self.http.get(&path).await
    }

    pub async fn get_reserved_block(&self, id: &str) -> Result<ReservedBlock, IpamError> {
        self.http.get(&format!("/api/reserved-blocks/{}", path_segment(id))).await
    }

    pub async fn create_reserved_block(&self, request: &CreateReservedBlockRequest) -> Result<ReservedBlock, IpamError> {
        self.http.post("/api/reserved-blocks", request).await
    }

    /// Rename a reserved block; `cidr` and `reason` cannot be changed
    pub async fn update_reserved_block(&self, id: &str, request: &UpdateReservedBlockRequest) -> Result<ReservedBlock, IpamError> {
        self.http.put(&format!("/api/reserved-blocks/{}", path_segment(id)), request).await
    }

    pub async fn delete_reserved_block(&self, id: &str) -> Result<(), IpamError> {
        self.http.delete(&format!("/api/reserved-blocks/{}", path_segment(id))).await
    }
}

#[async_trait::async_trait]
impl IpamClientTrait for IpamClient {
    fn base_url(&self) -> &str {
        self.base_url()
    }

    async fn validate_token(&self) -> Result<(), IpamError> {
        self.validate_token().await
    }

    async fn list_environments(&self, filter: &EnvironmentFilter, options: ListOptions) -> Result<EnvironmentList, IpamError> {
        self.list_environments(filter, options).await
    }

    async fn get_environment(&self, id: &str) -> Result<EnvironmentDetail, IpamError> {
        self.get_environment(id).await
    }

    async fn create_environment(&self, request: &CreateEnvironmentRequest) -> Result<Environment, IpamError> {
        self.create_environment(request).await
    }

    async fn update_environment(&self, id: &str, request: &UpdateEnvironmentRequest) -> Result<Environment, IpamError> {
        self.update_environment(id, request).await
    }

    async fn delete_environment(&self, id: &str) -> Result<(), IpamError> {
        self.delete_environment(id).await
    }

    async fn list_pools(&self, filter: &PoolFilter, options: ListOptions) -> Result<PoolList, IpamError> {
        self.list_pools(filter, options).await
    }

    async fn get_pool(&self, id: &str) -> Result<Pool, IpamError> {
        self.get_pool(id).await
    }

    async fn create_pool(&self, request: &CreatePoolRequest) -> Result<Pool, IpamError> {
        self.create_pool(request).await
    }

    async fn update_pool(&self, id: &str, request: &UpdatePoolRequest) -> Result<Pool, IpamError> {
        self.update_pool(id, request).await
    }

    async fn delete_pool(&self, id: &str) -> Result<(), IpamError> {
        self.delete_pool(id).await
    }

    async fn list_blocks(&self, filter: &BlockFilter, options: ListOptions) -> Result<BlockList, IpamError> {
        self.list_blocks(filter, options).await
    }

    async fn get_block(&self, id: &str) -> Result<Block, IpamError> {
        self.get_block(id).await
    }

    async fn create_block(&self, request: &CreateBlockRequest) -> Result<Block, IpamError> {
        self.create_block(request).await
    }

    async fn update_block(&self, id: &str, request: &UpdateBlockRequest) -> Result<Block, IpamError> {
        self.update_block(id, request).await
    }

    async fn delete_block(&self, id: &str) -> Result<(), IpamError> {
        self.delete_block(id).await
    }

    async fn list_allocations(&self, filter: &AllocationFilter, options: ListOptions) -> Result<AllocationList, IpamError> {
        self.list_allocations(filter, options).await
    }

    async fn get_allocation(&self, id: &str) -> Result<Allocation, IpamError> {
        self.get_allocation(id).await
    }

    async fn create_allocation(&self, request: &CreateAllocationRequest) -> Result<Allocation, IpamError> {
        self.create_allocation(request).await
    }

    async fn auto_allocate(&self, request: &AutoAllocateRequest) -> Result<Allocation, IpamError> {
        self.auto_allocate(request).await
    }

    async fn update_allocation(&self, id: &str, request: &UpdateAllocationRequest) -> Result<Allocation, IpamError> {
        self.update_allocation(id, request).await
    }

    async fn delete_allocation(&self, id: &str) -> Result<(), IpamError> {
        self.delete_allocation(id).await
    }

    async fn list_reserved_blocks(&self, filter: &ReservedBlockFilter, options: ListOptions) -> Result<ReservedBlockList, IpamError> {
        self.list_reserved_blocks(filter, options).await
    }

    async fn get_reserved_block(&self, id: &str) -> Result<ReservedBlock, IpamError> {
        self.get_reserved_block(id).await
    }

    async fn create_reserved_block(&self, request: &CreateReservedBlockRequest) -> Result<ReservedBlock, IpamError> {
        self.create_reserved_block(request).await
    }

    async fn update_reserved_block(&self, id: &str, request: &UpdateReservedBlockRequest) -> Result<ReservedBlock, IpamError> {
        self.update_reserved_block(id, request).await
    }

    async fn delete_reserved_block(&self, id: &str) -> Result<(), IpamError> {
        self.delete_reserved_block(id).await
    }
}
