//! Allocation creation strategy
//!
//! An allocation is created either from an explicit CIDR or by asking the
//! service for the next free range of a prefix length. [`BlockLocks`]
//! serialises creates that target the same block.

use crate::error::{Operation, ReconcileError};
use ipam_client::{Allocation, AutoAllocateRequest, CreateAllocationRequest, IpamClientTrait};
use ipam_declarations::{
    AllocationMode, AllocationSpec, AllocationState, BlockNameRef, ResourceKind, cidr::same_cidr,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

/// How one allocation gets its CIDR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationStrategy<'a> {
    /// Submit this CIDR verbatim; the answer must match it
    Explicit { cidr: &'a str },
    /// Let the service pick; whatever comes back is pinned
    Auto { prefix_length: u8 },
}

impl<'a> AllocationStrategy<'a> {
    /// Pick the strategy for a declaration. Fails when both or neither of
    /// `cidr` and `prefix_length` are set.
    pub fn select(spec: &'a AllocationSpec, label: &str) -> Result<Self, ReconcileError> {
        match spec.mode() {
            Ok(AllocationMode::Explicit(cidr)) => Ok(Self::Explicit { cidr }),
            Ok(AllocationMode::Auto(prefix_length)) => Ok(Self::Auto { prefix_length }),
            Err(e) => Err(ReconcileError::validation(Operation::Create, ResourceKind::Allocation, label, e)),
        }
    }

    /// Issue the create call
    pub async fn submit(&self, client: &dyn IpamClientTrait, spec: &AllocationSpec, label: &str) -> Result<Allocation, ReconcileError> {
        let result = match *self {
            Self::Explicit { cidr } => {
                debug!("Creating allocation {} in {} with explicit CIDR {}", spec.name, spec.block, cidr);
                client
                    .create_allocation(&CreateAllocationRequest {
                        name: spec.name.clone(),
                        block_name: spec.block.to_string(),
                        cidr: cidr.trim().to_string(),
                    })
                    .await
            }
            Self::Auto { prefix_length } => {
                debug!("Auto-allocating /{} for {} in {}", prefix_length, spec.name, spec.block);
                client
                    .auto_allocate(&AutoAllocateRequest {
                        name: spec.name.clone(),
                        block_name: spec.block.to_string(),
                        prefix_length,
                    })
                    .await
            }
        };
        result.map_err(|e| ReconcileError::from_client(Operation::Create, ResourceKind::Allocation, label, e))
    }

    /// Turn the service's answer into recorded state.
    ///
    /// Explicit mode refuses an answer whose CIDR differs from the request.
    /// Auto mode pins the returned CIDR and keeps the prefix length only as
    /// a replace trigger.
    pub fn pin(&self, allocation: Allocation, label: &str) -> Result<AllocationState, ReconcileError> {
        let prefix_length = match *self {
            Self::Explicit { cidr } => {
                if !same_cidr(cidr, &allocation.cidr) {
                    return Err(ReconcileError::Inconsistent {
                        operation: Operation::Create,
                        kind: ResourceKind::Allocation,
                        target: label.to_string(),
                        id: allocation.id,
                        requested: cidr.to_string(),
                        returned: allocation.cidr,
                    });
                }
                None
            }
            Self::Auto { prefix_length } => {
                info!("Allocation {} pinned to {}", allocation.name, allocation.cidr);
                Some(prefix_length)
            }
        };
        Ok(AllocationState {
            id: allocation.id,
            name: allocation.name,
            block_name: BlockNameRef::new(allocation.block_name),
            cidr: allocation.cidr,
            prefix_length,
        })
    }
}

/// One async lock per block name.
///
/// Allocation creates against the same block run one at a time; creates
/// against different blocks do not wait on each other. Locks nobody holds or
/// waits on are dropped on the next acquire.
#[derive(Debug, Default)]
pub struct BlockLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl BlockLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `block_name`
    pub async fn acquire(&self, block_name: &BlockNameRef) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(block_name.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
