//! Unit tests for the block reconciler

#[cfg(test)]
mod tests {
    use crate::reconciler::{Action, apply, destroy, import, refresh};
    use crate::state::Lifecycle;
    use crate::test_utils::*;
    use ipam_client::Block;
    use ipam_client::mock::{Resource, Verb};
    use ipam_declarations::{BlockSpec, IpCount};

    #[tokio::test]
    async fn test_create_populates_counts() {
        let (_mock, ctx) = mock_context();
        let (env, block) = seed_block(&ctx).await;

        assert_eq!(block.lifecycle, Lifecycle::Created);
        assert_eq!(block.state.environment_id.as_deref(), Some(env.id()));
        assert_eq!(block.state.total_ips, IpCount::new("256"));
        assert_eq!(block.state.used_ips, IpCount::new("0"));
        assert_eq!(block.state.available_ips, IpCount::new("256"));
        assert!(block.state.accounting_holds());
    }

    #[tokio::test]
    async fn test_rename_is_one_update() {
        let (mock, ctx) = mock_context();
        let (env, block) = seed_block(&ctx).await;
        let mut spec = BlockSpec {
            name: "acc-block-renamed".to_string(),
            cidr: block.state.cidr.clone(),
            environment_id: Some(env.id().to_string()),
            pool_id: block.state.pool_id.clone(),
        };

        mock.clear_calls();
        let applied = apply(&ctx, "acc-block", &spec, Some(&block)).await;
        assert_eq!(applied.action, Action::Update);
        let renamed = applied.entry.unwrap();
        assert_eq!(renamed.id(), block.id());
        assert_eq!(renamed.state.name, "acc-block-renamed");
        assert_eq!(mock.call_count(Resource::Block, Verb::Update), 1);
        assert_eq!(mock.write_count(), 1);

        // applying the same declaration again is a no-op
        spec.cidr = " 10.1.100.0/24 ".to_string();
        mock.clear_calls();
        let again = apply(&ctx, "acc-block", &spec, Some(&renamed)).await;
        assert_eq!(again.action, Action::NoOp);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cidr_change_deletes_then_creates() {
        let (mock, ctx) = mock_context();
        let (env, block) = seed_block(&ctx).await;
        let spec = block_spec(
            "acc-block",
            "10.1.101.0/24",
            Some(env.id()),
            block.state.pool_id.as_deref(),
        );

        mock.clear_calls();
        let applied = apply(&ctx, "acc-block", &spec, Some(&block)).await;
        assert_eq!(applied.action, Action::Replace);
        let replaced = applied.entry.unwrap();
        assert_ne!(replaced.id(), block.id());
        assert_eq!(replaced.state.cidr, "10.1.101.0/24");

        let verbs: Vec<Verb> = mock.calls().into_iter().map(|c| c.verb).collect();
        assert_eq!(verbs, vec![Verb::Delete, Verb::Create]);
        assert_eq!(mock.call_count(Resource::Block, Verb::Update), 0);
    }

    #[tokio::test]
    async fn test_failed_replace_delete_keeps_prior_entry() {
        let (mock, ctx) = mock_context();
        let (env, block) = seed_block(&ctx).await;
        mock.fail_next(Resource::Block, Verb::Delete, 409, "block has allocations");
        mock.clear_calls();

        let spec = block_spec("acc-block", "10.1.101.0/24", Some(env.id()), None);
        let applied = apply(&ctx, "acc-block", &spec, Some(&block)).await;
        assert!(applied.result.is_err());
        assert_eq!(applied.entry.unwrap(), block);
        assert_eq!(mock.call_count(Resource::Block, Verb::Create), 0);
    }

    #[tokio::test]
    async fn test_orphaning_is_an_update() {
        let (mock, ctx) = mock_context();
        let (_env, block) = seed_block(&ctx).await;
        let spec = block_spec("acc-block", "10.1.100.0/24", None, None);

        mock.clear_calls();
        let applied = apply(&ctx, "acc-block", &spec, Some(&block)).await;
        assert_eq!(applied.action, Action::Update);
        let orphan = applied.entry.unwrap();
        assert_eq!(orphan.state.environment_id, None);
        assert_eq!(orphan.state.pool_id, None);
        assert_eq!(mock.write_count(), 1);
    }

    #[tokio::test]
    async fn test_ipv6_counts_beyond_64_bits() {
        let (_mock, ctx) = mock_context();
        let spec = block_spec("v6", "fd00:10::/64", None, None);
        let block = apply(&ctx, "v6", &spec, None).await.entry.unwrap();

        assert_eq!(block.state.total_ips.as_str(), "18446744073709551616");
        assert_eq!(block.state.used_ips.as_str(), "0");
        assert!(block.state.accounting_holds());

        let alloc = auto_allocation("svc", "v6", 120);
        apply(&ctx, "svc", &alloc, None).await.entry.unwrap();
        let read = refresh::<BlockSpec>(&ctx, "v6", &block).await.entry.unwrap();
        assert_eq!(read.state.used_ips.as_str(), "256");
        assert_eq!(read.state.available_ips.as_str(), "18446744073709551360");
        assert!(read.state.accounting_holds());
    }

    #[tokio::test]
    async fn test_import_by_id_then_read_is_identical() {
        let (mock, ctx) = mock_context();
        mock.add_block(Block {
            id: "b-1".to_string(),
            name: "legacy".to_string(),
            cidr: "192.168.50.0/24".to_string(),
            total_ips: String::new(),
            used_ips: String::new(),
            available_ips: String::new(),
            environment_id: None,
            organization_id: None,
            pool_id: None,
        });

        let imported = import::<BlockSpec>(&ctx, "legacy", "b-1").await.unwrap();
        assert_eq!(imported.lifecycle, Lifecycle::Created);
        assert_eq!(imported.state.total_ips.as_str(), "256");

        let read = refresh::<BlockSpec>(&ctx, "legacy", &imported).await;
        assert_eq!(read.action, Action::Read);
        assert_eq!(read.entry.unwrap(), imported);
    }

    #[tokio::test]
    async fn test_out_of_band_rename_is_folded_back() {
        let (mock, ctx) = mock_context();
        let (_env, block) = seed_block(&ctx).await;
        assert!(mock.rename_block_out_of_band(block.id(), "someone-else"));

        let read = refresh::<BlockSpec>(&ctx, "acc-block", &block).await.entry.unwrap();
        assert_eq!(read.lifecycle, Lifecycle::Reconciled);
        assert_eq!(read.state.name, "someone-else");

        // the declaration still says acc-block, so the next apply renames it back
        let spec = BlockSpec {
            name: "acc-block".to_string(),
            cidr: read.state.cidr.clone(),
            environment_id: read.state.environment_id.clone(),
            pool_id: read.state.pool_id.clone(),
        };
        let applied = apply(&ctx, "acc-block", &spec, Some(&read)).await;
        assert_eq!(applied.action, Action::Update);
        assert_eq!(mock.block(block.id()).unwrap().name, "acc-block");
    }

    #[tokio::test]
    async fn test_destroy_missing_block_is_an_error() {
        let (mock, ctx) = mock_context();
        let (_env, block) = seed_block(&ctx).await;

        let gone = destroy::<BlockSpec>(&ctx, "acc-block", &block).await;
        assert!(gone.result.is_ok());
        assert_eq!(gone.lifecycle(), Some(Lifecycle::Destroyed));
        assert!(mock.block(block.id()).is_none());

        let again = destroy::<BlockSpec>(&ctx, "acc-block", &block).await;
        assert!(again.result.unwrap_err().is_not_found());
        assert_eq!(again.entry.unwrap(), block);
    }
}
