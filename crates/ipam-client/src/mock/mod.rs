//! Mock IpamClient for unit testing
//!
//! This module provides an in-memory implementation of `IpamClientTrait` that
//! behaves like the IPAM service closely enough for reconciler tests: it
//! assigns IDs, validates containment and overlap, computes block IP counts
//! and performs first-fit auto-allocation.
//!
//! The mock is organized into resource-specific modules:
//! - `environments.rs` - environments (and their seed pools)
//! - `pools.rs` - pools
//! - `blocks.rs` - blocks and IP accounting
//! - `allocations.rs` - explicit and auto allocations
//! - `reserved_blocks.rs` - reserved blocks
//! - `helpers.rs` - CIDR arithmetic, pagination and error construction
//!
//! Every call is recorded so tests can assert exactly which remote
//! operations a reconciliation issued.

mod allocations;
mod blocks;
mod environments;
mod helpers;
mod pools;
mod reserved_blocks;

use crate::error::IpamError;
use crate::ipam_trait::IpamClientTrait;
use crate::models::*;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Resource family a recorded call touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Environment,
    Pool,
    Block,
    Allocation,
    ReservedBlock,
}

/// Operation a recorded call performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    List,
    Get,
    Create,
    /// `POST /api/allocations/auto`
    AutoAllocate,
    Update,
    Delete,
}

/// One call made against the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub resource: Resource,
    pub verb: Verb,
    /// Target ID for get/update/delete
    pub id: Option<String>,
}

/// Knobs that make the mock imitate deployment-specific service behaviour
#[derive(Debug, Clone, Default)]
pub struct MockBehaviour {
    /// Answer 404 to every allocation get-by-ID, even for existing IDs
    pub allocation_get_not_found: bool,
    /// Store and return this CIDR instead of the one submitted on explicit
    /// allocation create
    pub rewrite_allocation_cidr: Option<String>,
}

/// Mock IpamClient for testing
///
/// Clones share the same store, so a test can keep one handle for
/// assertions while the reconciler owns another.
#[derive(Debug, Clone)]
pub struct MockIpamClient {
    pub(crate) base_url: String,
    // In-memory storage, in insertion order
    pub(crate) environments: Arc<Mutex<Vec<Environment>>>,
    pub(crate) pools: Arc<Mutex<Vec<Pool>>>,
    pub(crate) blocks: Arc<Mutex<Vec<Block>>>,
    pub(crate) allocations: Arc<Mutex<Vec<Allocation>>>,
    pub(crate) reserved_blocks: Arc<Mutex<Vec<ReservedBlock>>>,
    pub(crate) calls: Arc<Mutex<Vec<RecordedCall>>>,
    pub(crate) faults: Arc<Mutex<HashMap<(Resource, Verb), VecDeque<(u16, String)>>>>,
    pub(crate) behaviour: Arc<Mutex<MockBehaviour>>,
}

/// Lock a store, recovering the data if a panicking test poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockIpamClient {
    /// Create a new, empty mock service
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            environments: Arc::new(Mutex::new(Vec::new())),
            pools: Arc::new(Mutex::new(Vec::new())),
            blocks: Arc::new(Mutex::new(Vec::new())),
            allocations: Arc::new(Mutex::new(Vec::new())),
            reserved_blocks: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            faults: Arc::new(Mutex::new(HashMap::new())),
            behaviour: Arc::new(Mutex::new(MockBehaviour::default())),
        }
    }

    /// Replace the behaviour knobs
    pub fn set_behaviour(&self, behaviour: MockBehaviour) {
        *lock(&self.behaviour) = behaviour;
    }

    pub(crate) fn behaviour(&self) -> MockBehaviour {
        lock(&self.behaviour).clone()
    }

    /// Make the next `verb` on `resource` fail with `status` and `message`.
    /// Faults queue up and are consumed one per call.
    pub fn fail_next(&self, resource: Resource, verb: Verb, status: u16, message: impl Into<String>) {
        lock(&self.faults)
            .entry((resource, verb))
            .or_default()
            .push_back((status, message.into()));
    }

    /// Every call made so far, oldest first
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Number of calls made for `resource` and `verb`
    pub fn call_count(&self, resource: Resource, verb: Verb) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.resource == resource && c.verb == verb)
            .count()
    }

    /// Number of calls that changed remote state
    pub fn write_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| !matches!(c.verb, Verb::List | Verb::Get))
            .count()
    }

    /// Forget recorded calls (stored resources are kept)
    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Record a call, then fail it if a fault was queued for it
    pub(crate) fn record(&self, resource: Resource, verb: Verb, id: Option<&str>) -> Result<(), IpamError> {
        lock(&self.calls).push(RecordedCall {
            resource,
            verb,
            id: id.map(str::to_string),
        });

        let fault = lock(&self.faults)
            .get_mut(&(resource, verb))
            .and_then(VecDeque::pop_front);
        match fault {
            Some((status, message)) => Err(helpers::api_error(verb, resource, id, status, &message)),
            None => Ok(()),
        }
    }

    // Direct store access for test setup and assertions. These bypass the
    // call log and fault injection.

    /// Insert a block as if it had been created out of band
    pub fn add_block(&self, block: Block) {
        lock(&self.blocks).push(block);
    }

    /// Insert an allocation as if it had been created out of band
    pub fn add_allocation(&self, allocation: Allocation) {
        lock(&self.allocations).push(allocation);
    }

    /// Rename a block behind the reconciler's back
    pub fn rename_block_out_of_band(&self, id: &str, name: &str) -> bool {
        let old = {
            let mut blocks = lock(&self.blocks);
            let Some(block) = blocks.iter_mut().find(|b| b.id == id) else {
                return false;
            };
            std::mem::replace(&mut block.name, name.to_string())
        };
        for allocation in lock(&self.allocations).iter_mut().filter(|a| a.block_name == old) {
            allocation.block_name = name.to_string();
        }
        true
    }

    /// Stored allocation, if any
    pub fn allocation(&self, id: &str) -> Option<Allocation> {
        lock(&self.allocations).iter().find(|a| a.id == id).cloned()
    }

    /// Stored block with freshly computed IP counts, if any
    pub fn block(&self, id: &str) -> Option<Block> {
        blocks::snapshot(self, id)
    }

    /// Stored environment, including `pool_ids`
    pub fn environment(&self, id: &str) -> Option<Environment> {
        lock(&self.environments).iter().find(|e| e.id == id).cloned()
    }

    /// Number of stored resources of each kind, in
    /// environment/pool/block/allocation/reserved order
    pub fn counts(&self) -> [usize; 5] {
        [
            lock(&self.environments).len(),
            lock(&self.pools).len(),
            lock(&self.blocks).len(),
            lock(&self.allocations).len(),
            lock(&self.reserved_blocks).len(),
        ]
    }
}

impl Default for MockIpamClient {
    fn default() -> Self {
        Self::new("http://mock-ipam")
    }
}

#[async_trait::async_trait]
impl IpamClientTrait for MockIpamClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn validate_token(&self) -> Result<(), IpamError> {
        self.record(Resource::Environment, Verb::List, None)
    }

    // Environments - delegated to environments module
    async fn list_environments(&self, filter: &EnvironmentFilter, options: ListOptions) -> Result<EnvironmentList, IpamError> {
        environments::list(self, filter, options)
    }

    async fn get_environment(&self, id: &str) -> Result<EnvironmentDetail, IpamError> {
        environments::get(self, id)
    }

    async fn create_environment(&self, request: &CreateEnvironmentRequest) -> Result<Environment, IpamError> {
        environments::create(self, request)
    }

    async fn update_environment(&self, id: &str, request: &UpdateEnvironmentRequest) -> Result<Environment, IpamError> {
        environments::update(self, id, request)
    }

    async fn delete_environment(&self, id: &str) -> Result<(), IpamError> {
        environments::delete(self, id)
    }

    // Pools - delegated to pools module
    async fn list_pools(&self, filter: &PoolFilter, options: ListOptions) -> Result<PoolList, IpamError> {
        pools::list(self, filter, options)
    }

    async fn get_pool(&self, id: &str) -> Result<Pool, IpamError> {
        pools::get(self, id)
    }

    async fn create_pool(&self, request: &CreatePoolRequest) -> Result<Pool, IpamError> {
        pools::create(self, request)
    }

    async fn update_pool(&self, id: &str, request: &UpdatePoolRequest) -> Result<Pool, IpamError> {
        pools::update(self, id, request)
    }

    async fn delete_pool(&self, id: &str) -> Result<(), IpamError> {
        pools::delete(self, id)
    }

    // Blocks - delegated to blocks module
    async fn list_blocks(&self, filter: &BlockFilter, options: ListOptions) -> Result<BlockList, IpamError> {
        blocks::list(self, filter, options)
    }

    async fn get_block(&self, id: &str) -> Result<Block, IpamError> {
        blocks::get(self, id)
    }

    async fn create_block(&self, request: &CreateBlockRequest) -> Result<Block, IpamError> {
        blocks::create(self, request)
    }

    async fn update_block(&self, id: &str, request: &UpdateBlockRequest) -> Result<Block, IpamError> {
        blocks::update(self, id, request)
    }

    async fn delete_block(&self, id: &str) -> Result<(), IpamError> {
        blocks::delete(self, id)
    }

    // Allocations - delegated to allocations module
    async fn list_allocations(&self, filter: &AllocationFilter, options: ListOptions) -> Result<AllocationList, IpamError> {
        allocations::list(self, filter, options)
    }

    async fn get_allocation(&self, id: &str) -> Result<Allocation, IpamError> {
        allocations::get(self, id)
    }

    async fn create_allocation(&self, request: &CreateAllocationRequest) -> Result<Allocation, IpamError> {
        allocations::create(self, request)
    }

    async fn auto_allocate(&self, request: &AutoAllocateRequest) -> Result<Allocation, IpamError> {
        allocations::auto_allocate(self, request)
    }

    async fn update_allocation(&self, id: &str, request: &UpdateAllocationRequest) -> Result<Allocation, IpamError> {
        allocations::update(self, id, request)
    }

    async fn delete_allocation(&self, id: &str) -> Result<(), IpamError> {
        allocations::delete(self, id)
    }

    // Reserved blocks - delegated to reserved_blocks module
    async fn list_reserved_blocks(&self, filter: &ReservedBlockFilter, options: ListOptions) -> Result<ReservedBlockList, IpamError> {
        reserved_blocks::list(self, filter, options)
    }

    async fn get_reserved_block(&self, id: &str) -> Result<ReservedBlock, IpamError> {
        reserved_blocks::get(self, id)
    }

    async fn create_reserved_block(&self, request: &CreateReservedBlockRequest) -> Result<ReservedBlock, IpamError> {
        reserved_blocks::create(self, request)
    }

    async fn update_reserved_block(&self, id: &str, request: &UpdateReservedBlockRequest) -> Result<ReservedBlock, IpamError> {
        reserved_blocks::update(self, id, request)
    }

    async fn delete_reserved_block(&self, id: &str) -> Result<(), IpamError> {
        reserved_blocks::delete(self, id)
    }
}
