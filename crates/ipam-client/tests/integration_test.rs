//! Integration tests for the IPAM client
//!
//! These tests require a running IPAM service.
//! Set IPAM_ENDPOINT and IPAM_TOKEN environment variables and run with
//! `--ignored` to opt in.

use ipam_client::{
    BlockFilter, CreateAllocationRequest, CreateBlockRequest, CreateEnvironmentRequest, IpamClient,
    ListOptions, PoolInput, UpdateAllocationRequest,
};

fn live_client() -> IpamClient {
    let url = std::env::var("IPAM_ENDPOINT").expect("IPAM_ENDPOINT environment variable must be set");
    let token = std::env::var("IPAM_TOKEN").expect("IPAM_TOKEN environment variable must be set");
    IpamClient::new(url, token).expect("Failed to create client")
}

fn unique(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    format!("{}-{}", prefix, nanos)
}

#[tokio::test]
#[ignore] // Requires running IPAM service
async fn test_validate_token() {
    let client = live_client();
    client.validate_token().await.expect("token rejected");
}

#[tokio::test]
#[ignore]
async fn test_list_blocks_with_pagination() {
    let client = live_client();
    let page = client
        .list_blocks(&BlockFilter::default(), ListOptions::page(5, 0))
        .await
        .expect("Failed to list blocks");
    assert!(page.blocks.len() <= 5);
    println!("Found {} blocks", page.total);
}

#[tokio::test]
#[ignore]
async fn test_environment_block_allocation_lifecycle() {
    let client = live_client();
    let env_name = unique("acc-env");
    let block_name = unique("acc-block");

    let env = client
        .create_environment(&CreateEnvironmentRequest {
            name: env_name,
            pools: vec![PoolInput {
                name: "acc-pool".to_string(),
                cidr: "10.0.0.0/8".to_string(),
            }],
        })
        .await
        .expect("Failed to create environment");
    assert_eq!(env.pool_ids.len(), 1);

    let block = client
        .create_block(&CreateBlockRequest {
            name: block_name.clone(),
            cidr: "10.1.100.0/24".to_string(),
            environment_id: Some(env.id.clone()),
            pool_id: env.pool_ids.first().cloned(),
        })
        .await
        .expect("Failed to create block");
    assert_eq!(block.total_ips, "256");
    assert_eq!(block.used_ips, "0");
    assert_eq!(block.available_ips, "256");

    let allocation = client
        .create_allocation(&CreateAllocationRequest {
            name: "acc-alloc".to_string(),
            block_name: block_name.clone(),
            cidr: "10.1.100.0/26".to_string(),
        })
        .await
        .expect("Failed to create allocation");
    assert_eq!(allocation.cidr, "10.1.100.0/26");

    let renamed = client
        .update_allocation(&allocation.id, &UpdateAllocationRequest {
            name: "acc-alloc-renamed".to_string(),
        })
        .await
        .expect("Failed to rename allocation");
    assert_eq!(renamed.id, allocation.id);
    assert_eq!(renamed.cidr, allocation.cidr);

    client.delete_allocation(&allocation.id).await.expect("Failed to delete allocation");
    client.delete_block(&block.id).await.expect("Failed to delete block");
    client.delete_environment(&env.id).await.expect("Failed to delete environment");
}
