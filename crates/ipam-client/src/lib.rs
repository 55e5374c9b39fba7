//! IPAM REST API Client
//!
//! A Rust client library for the IPAM service. Provides typed models and one
//! method per resource kind and verb for environments, pools, blocks,
//! allocations and reserved blocks.
//!
//! # Example
//!
//! ```no_run
//! use ipam_client::{AutoAllocateRequest, BlockFilter, IpamClient, ListOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = IpamClient::new(
//!     "http://ipam:8080".to_string(),
//!     "your-api-token".to_string(),
//! )?;
//!
//! // Orphaned blocks, first page
//! let filter = BlockFilter {
//!     orphaned_only: Some(true),
//!     ..BlockFilter::default()
//! };
//! let blocks = client.list_blocks(&filter, ListOptions::page(50, 0)).await?;
//!
//! // Let the service pick the next free /26 in a block
//! let allocation = client
//!     .auto_allocate(&AutoAllocateRequest {
//!         name: "web".to_string(),
//!         block_name: "edge".to_string(),
//!         prefix_length: 26,
//!     })
//!     .await?;
//! println!("{} blocks, allocated {}", blocks.total, allocation.cidr);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Typed errors**: non-2xx responses carry the status and the service's
//!   `{"error": ...}` message
//! - **Mocking**: `IpamClientTrait` plus an in-memory `MockIpamClient`
//!   behind the `test-util` feature
//!
//! The client never retries; that policy belongs to the caller.

pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod ipam_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::IpamClient;
pub use common::HttpClient;
pub use error::{IpamError, StatusClass};
pub use models::*;
pub use ipam_trait::IpamClientTrait;
#[cfg(feature = "test-util")]
pub use mock::MockIpamClient;
