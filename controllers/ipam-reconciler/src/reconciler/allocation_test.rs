//! Unit tests for the allocation reconciler

#[cfg(test)]
mod tests {
    use crate::error::ReconcileError;
    use crate::reconciler::{Action, apply, import, refresh};
    use crate::state::Lifecycle;
    use crate::test_utils::*;
    use futures::future::join_all;
    use ipam_client::mock::{MockBehaviour, Resource, Verb};
    use ipam_declarations::{AllocationSpec, BlockNameRef, BlockSpec};

    #[tokio::test]
    async fn test_both_modes_fail_locally() {
        let (mock, ctx) = mock_context();
        let mut spec = explicit_allocation("acc-alloc", "acc-block", "10.0.0.0/26");
        spec.prefix_length = Some(26);

        let applied = apply(&ctx, "acc-alloc", &spec, None).await;
        assert!(matches!(applied.result, Err(ReconcileError::Validation { .. })));
        assert!(applied.entry.is_none());
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_neither_mode_fails_locally() {
        let (mock, ctx) = mock_context();
        let spec = AllocationSpec {
            name: "acc-alloc".to_string(),
            block: BlockNameRef::new("acc-block"),
            cidr: None,
            prefix_length: None,
        };

        let applied = apply(&ctx, "acc-alloc", &spec, None).await;
        assert!(matches!(applied.result, Err(ReconcileError::Validation { .. })));
        assert_eq!(mock.write_count(), 0);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_auto_allocation_pins_returned_cidr() {
        let (mock, ctx) = mock_context();
        apply(&ctx, "blk", &block_spec("acc-block", "10.3.0.0/16", None, None), None)
            .await
            .entry
            .unwrap();

        let spec = auto_allocation("acc-alloc", "acc-block", 24);
        let created = apply(&ctx, "acc-alloc", &spec, None).await.entry.unwrap();
        assert_eq!(created.state.cidr, "10.3.0.0/24");
        assert_eq!(created.state.prefix_length, Some(24));
        assert_eq!(mock.call_count(Resource::Allocation, Verb::AutoAllocate), 1);

        // the pinned CIDR satisfies the same declaration from now on
        mock.clear_calls();
        let again = apply(&ctx, "acc-alloc", &spec, Some(&created)).await;
        assert_eq!(again.action, Action::NoOp);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_prefix_length_change_replaces() {
        let (mock, ctx) = mock_context();
        apply(&ctx, "blk", &block_spec("acc-block", "10.3.0.0/16", None, None), None)
            .await
            .entry
            .unwrap();
        let created = apply(&ctx, "a", &auto_allocation("acc-alloc", "acc-block", 24), None)
            .await
            .entry
            .unwrap();

        mock.clear_calls();
        let applied = apply(&ctx, "a", &auto_allocation("acc-alloc", "acc-block", 25), Some(&created)).await;
        assert_eq!(applied.action, Action::Replace);
        let replaced = applied.entry.unwrap();
        assert_ne!(replaced.id(), created.id());
        assert_eq!(replaced.state.prefix_length, Some(25));
        assert_eq!(mock.call_count(Resource::Allocation, Verb::Delete), 1);
        assert_eq!(mock.call_count(Resource::Allocation, Verb::AutoAllocate), 1);
        assert_eq!(mock.call_count(Resource::Allocation, Verb::Update), 0);
    }

    #[tokio::test]
    async fn test_rename_keeps_id_and_cidr() {
        let (mock, ctx) = mock_context();
        seed_block(&ctx).await;
        let created = apply(&ctx, "a", &explicit_allocation("acc-alloc", "acc-block", "10.1.100.0/26"), None)
            .await
            .entry
            .unwrap();
        assert_eq!(created.state.cidr, "10.1.100.0/26");

        mock.clear_calls();
        let spec = explicit_allocation("acc-alloc-renamed", "acc-block", "10.1.100.0/26");
        let renamed = apply(&ctx, "a", &spec, Some(&created)).await;
        assert_eq!(renamed.action, Action::Update);
        let renamed = renamed.entry.unwrap();
        assert_eq!(renamed.id(), created.id());
        assert_eq!(renamed.state.cidr, "10.1.100.0/26");
        assert_eq!(renamed.state.name, "acc-alloc-renamed");
        assert_eq!(mock.call_count(Resource::Allocation, Verb::Update), 1);
        assert_eq!(mock.call_count(Resource::Allocation, Verb::Delete), 0);
        assert_eq!(mock.call_count(Resource::Allocation, Verb::Create), 0);
    }

    #[tokio::test]
    async fn test_block_change_replaces() {
        let (mock, ctx) = mock_context();
        apply(&ctx, "a", &block_spec("blk-a", "10.3.0.0/24", None, None), None).await.entry.unwrap();
        apply(&ctx, "b", &block_spec("blk-b", "10.4.0.0/24", None, None), None).await.entry.unwrap();
        let created = apply(&ctx, "x", &auto_allocation("x", "blk-a", 26), None).await.entry.unwrap();

        mock.clear_calls();
        let moved = apply(&ctx, "x", &auto_allocation("x", "blk-b", 26), Some(&created)).await;
        assert_eq!(moved.action, Action::Replace);
        assert_eq!(moved.entry.unwrap().state.cidr, "10.4.0.0/26");
    }

    #[tokio::test]
    async fn test_explicit_mismatch_is_surfaced() {
        let (mock, ctx) = mock_context();
        seed_block(&ctx).await;
        mock.set_behaviour(MockBehaviour {
            rewrite_allocation_cidr: Some("10.1.100.64/26".to_string()),
            ..MockBehaviour::default()
        });

        let spec = explicit_allocation("acc-alloc", "acc-block", "10.1.100.0/26");
        let applied = apply(&ctx, "a", &spec, None).await;
        assert!(matches!(
            applied.result,
            Err(ReconcileError::Inconsistent { ref returned, .. }) if returned == "10.1.100.64/26"
        ));
        assert!(applied.entry.is_none());
    }

    #[tokio::test]
    async fn test_read_falls_back_to_name_when_get_is_not_found() {
        let (mock, ctx) = mock_context();
        seed_block(&ctx).await;
        let created = apply(&ctx, "a", &explicit_allocation("acc-alloc", "acc-block", "10.1.100.0/26"), None)
            .await
            .entry
            .unwrap();
        mock.set_behaviour(MockBehaviour {
            allocation_get_not_found: true,
            ..MockBehaviour::default()
        });

        mock.clear_calls();
        let read = refresh::<AllocationSpec>(&ctx, "a", &created).await;
        assert!(read.result.is_ok());
        assert_eq!(read.entry.unwrap(), created);
        assert_eq!(mock.call_count(Resource::Allocation, Verb::List), 1);
    }

    #[tokio::test]
    async fn test_import_is_by_id_only() {
        let (mock, ctx) = mock_context();
        seed_block(&ctx).await;
        let created = apply(&ctx, "a", &explicit_allocation("acc-alloc", "acc-block", "10.1.100.0/26"), None)
            .await
            .entry
            .unwrap();

        let imported = import::<AllocationSpec>(&ctx, "a", created.id()).await.unwrap();
        assert_eq!(imported.state, created.state);

        // no name to fall back on
        mock.set_behaviour(MockBehaviour {
            allocation_get_not_found: true,
            ..MockBehaviour::default()
        });
        mock.clear_calls();
        let err = import::<AllocationSpec>(&ctx, "a", created.id()).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(mock.call_count(Resource::Allocation, Verb::List), 0);
    }

    #[tokio::test]
    async fn test_concurrent_creates_in_one_block_get_distinct_ranges() {
        let (mock, ctx) = mock_context();
        let block = apply(&ctx, "blk", &block_spec("acc-block", "10.3.0.0/24", None, None), None)
            .await
            .entry
            .unwrap();

        let specs: Vec<AllocationSpec> = (0..4).map(|i| auto_allocation(&format!("a{i}"), "acc-block", 26)).collect();
        let results = join_all(specs.iter().map(|spec| apply(&ctx, &spec.name, spec, None))).await;

        let mut cidrs: Vec<String> = results
            .into_iter()
            .map(|applied| applied.entry.unwrap().state.cidr)
            .collect();
        cidrs.sort();
        assert_eq!(cidrs, vec!["10.3.0.0/26", "10.3.0.128/26", "10.3.0.192/26", "10.3.0.64/26"]);

        assert_eq!(mock.call_count(Resource::Allocation, Verb::AutoAllocate), 4);
        let read = refresh::<BlockSpec>(&ctx, "blk", &block).await.entry.unwrap();
        assert_eq!(read.state.available_ips.as_str(), "0");
    }

    #[tokio::test]
    async fn test_refresh_follows_block_rename() {
        let (mock, ctx) = mock_context();
        let (_env, block) = seed_block(&ctx).await;
        let created = apply(&ctx, "a", &explicit_allocation("acc-alloc", "acc-block", "10.1.100.0/26"), None)
            .await
            .entry
            .unwrap();
        mock.rename_block_out_of_band(block.id(), "edge");

        let read = refresh::<AllocationSpec>(&ctx, "a", &created).await.entry.unwrap();
        assert_eq!(read.lifecycle, Lifecycle::Reconciled);
        assert_eq!(read.state.block_name.as_str(), "edge");
        assert_eq!(read.id(), created.id());
    }
}
