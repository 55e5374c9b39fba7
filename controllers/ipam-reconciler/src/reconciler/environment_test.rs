//! Unit tests for the environment reconciler

#[cfg(test)]
mod tests {
    use crate::error::ReconcileError;
    use crate::reconciler::{Action, apply, import, refresh};
    use crate::state::Lifecycle;
    use crate::test_utils::*;
    use ipam_client::mock::{Resource, Verb};
    use ipam_declarations::{EnvironmentSpec, PoolSeed, PoolSpec};

    #[tokio::test]
    async fn test_create_records_pool_ids() {
        let (mock, ctx) = mock_context();
        let applied = apply(&ctx, "acc-env", &env_spec("acc-env"), None).await;

        assert_eq!(applied.action, Action::Create);
        assert!(applied.result.is_ok());
        let env = applied.entry.unwrap();
        assert_eq!(env.lifecycle, Lifecycle::Created);
        assert!(!env.id().is_empty());
        assert_eq!(env.state.pool_ids.len(), 1);
        assert_eq!(
            mock.environment(env.id()).unwrap().pool_ids,
            env.state.pool_ids
        );
    }

    #[tokio::test]
    async fn test_rename_preserves_pool_ids() {
        let (mock, ctx) = mock_context();
        let created = apply(&ctx, "acc-env", &env_spec("acc-env"), None).await.entry.unwrap();
        let before = created.state.pool_ids.clone();

        mock.clear_calls();
        let renamed = apply(&ctx, "acc-env", &env_spec("acc-env-renamed"), Some(&created)).await;

        assert_eq!(renamed.action, Action::Update);
        let renamed = renamed.entry.unwrap();
        assert_eq!(renamed.state.name, "acc-env-renamed");
        assert_eq!(renamed.id(), created.id());
        assert_eq!(renamed.state.pool_ids, before);
        assert_eq!(mock.call_count(Resource::Environment, Verb::Update), 1);
        assert_eq!(mock.call_count(Resource::Environment, Verb::Create), 0);
        assert_eq!(mock.call_count(Resource::Environment, Verb::Delete), 0);
    }

    #[tokio::test]
    async fn test_empty_pools_fail_before_any_call() {
        let (mock, ctx) = mock_context();
        let spec = EnvironmentSpec {
            name: "acc-env".to_string(),
            pools: Vec::new(),
        };
        let applied = apply(&ctx, "acc-env", &spec, None).await;

        assert!(matches!(applied.result, Err(ReconcileError::Validation { .. })));
        assert!(applied.entry.is_none());
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_seed_edits_are_ignored() {
        let (mock, ctx) = mock_context();
        let created = apply(&ctx, "acc-env", &env_spec("acc-env"), None).await.entry.unwrap();

        let mut spec = env_spec("acc-env");
        spec.pools.push(PoolSeed {
            name: "late".to_string(),
            cidr: "192.168.0.0/16".to_string(),
        });
        mock.clear_calls();
        let applied = apply(&ctx, "acc-env", &spec, Some(&created)).await;

        assert_eq!(applied.action, Action::NoOp);
        assert_eq!(applied.entry.unwrap(), created);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_read_picks_up_pools_added_later() {
        let (_mock, ctx) = mock_context();
        let env = apply(&ctx, "acc-env", &env_spec("acc-env"), None).await.entry.unwrap();
        let pool = PoolSpec {
            environment_id: env.id().to_string(),
            name: "extra".to_string(),
            cidr: "172.20.0.0/16".to_string(),
        };
        let pool = apply(&ctx, "extra", &pool, None).await.entry.unwrap();

        let refreshed = refresh::<EnvironmentSpec>(&ctx, "acc-env", &env).await;
        let refreshed = refreshed.entry.unwrap();
        assert_eq!(refreshed.lifecycle, Lifecycle::Reconciled);
        assert_eq!(refreshed.state.pool_ids.len(), 2);
        assert_eq!(refreshed.state.pool_ids[0], env.state.pool_ids[0]);
        assert_eq!(refreshed.state.pool_ids[1], pool.id());
        assert_eq!(refreshed.state.pools[1].name, "extra");
    }

    #[tokio::test]
    async fn test_import_then_read_is_stable() {
        let (mock, ctx) = mock_context();
        let created = apply(&ctx, "acc-env", &env_spec("acc-env"), None).await.entry.unwrap();

        let imported = import::<EnvironmentSpec>(&ctx, "again", created.id()).await.unwrap();
        assert_eq!(imported.state, created.state);

        mock.clear_calls();
        let read = refresh::<EnvironmentSpec>(&ctx, "again", &imported).await;
        assert_eq!(read.entry.unwrap(), imported);
        assert_eq!(mock.write_count(), 0);
    }
}
